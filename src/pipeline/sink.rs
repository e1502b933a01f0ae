//! Observability sinks for non-fatal, per-item errors.

use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::PipelineError;

/// Receives per-item errors (unreadable entries, processing failures) without halting the run.
/// Called concurrently from the walk thread and every worker.
pub trait ErrorSink: Send + Sync {
    fn report(&self, err: &PipelineError);
}

/// Default sink: one warning per error.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&self, err: &PipelineError) {
        log::warn!("{}", err);
    }
}

/// What kind of item was skipped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipKind {
    Traversal,
    Processing,
    Other,
}

/// One skipped item recorded by [`CollectingSink`].
#[derive(Clone, Debug)]
pub struct SkippedItem {
    pub kind: SkipKind,
    pub path: Option<PathBuf>,
    pub message: String,
}

/// Records every reported error so the caller can inspect or summarize them after the run.
#[derive(Debug, Default)]
pub struct CollectingSink {
    skipped: Mutex<Vec<SkippedItem>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far.
    pub fn skipped(&self) -> Vec<SkippedItem> {
        self.lock().clone()
    }

    pub fn count(&self, kind: SkipKind) -> usize {
        self.lock().iter().filter(|s| s.kind == kind).count()
    }

    pub fn traversal_errors(&self) -> usize {
        self.count(SkipKind::Traversal)
    }

    pub fn processing_errors(&self) -> usize {
        self.count(SkipKind::Processing)
    }

    /// Warn with the number of skipped items; list each one when `verbose`.
    /// Call after the run has returned.
    pub fn log_summary(&self, verbose: bool) {
        let skipped = self.lock();
        if skipped.is_empty() {
            return;
        }
        let traversal = skipped
            .iter()
            .filter(|s| s.kind == SkipKind::Traversal)
            .count();
        log::warn!(
            "Skipped {} entries due to permission errors or access issues, {} files failed processing",
            traversal,
            skipped.len() - traversal
        );
        if verbose {
            for s in skipped.iter() {
                let path = s
                    .path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "<no path>".to_string());
                eprintln!("  skipped: {} ({})", path, s.message);
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SkippedItem>> {
        self.skipped.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl ErrorSink for CollectingSink {
    fn report(&self, err: &PipelineError) {
        let kind = match err {
            PipelineError::Traversal { .. } => SkipKind::Traversal,
            PipelineError::Processing { .. } => SkipKind::Processing,
            _ => SkipKind::Other,
        };
        let message = match err {
            PipelineError::Traversal { source, .. } => source.to_string(),
            PipelineError::Processing { message, .. } => message.clone(),
            other => other.to_string(),
        };
        self.lock().push(SkippedItem {
            kind,
            path: err.path().map(PathBuf::from),
            message,
        });
    }
}
