//! Public types for the filepipe API and pipeline.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::config::PipelineLimits;

/// Lifecycle state of a [`Pipeline`](crate::pipeline::Pipeline).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineState {
    Stopped,
    Starting,
    Running,
    /// Graceful stop requested: no further recursion, queue drains to empty.
    Stopping,
    /// Abort requested: walk cancelled, queued items are abandoned.
    Aborting,
}

impl PipelineState {
    /// True while a stop or abort is in flight.
    pub fn is_terminating(self) -> bool {
        matches!(self, PipelineState::Stopping | PipelineState::Aborting)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Stopped => "stopped",
            PipelineState::Starting => "starting",
            PipelineState::Running => "running",
            PipelineState::Stopping => "stopping",
            PipelineState::Aborting => "aborting",
        };
        f.write_str(s)
    }
}

/// One discovered regular file flowing through the pipeline.
///
/// Created once by the walker, consumed once by a worker. No identity beyond the path;
/// the same physical file reachable twice (hard links) yields two items.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkItem {
    path: PathBuf,
}

impl WorkItem {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Absolute path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

/// Unvalidated options for building a [`PipelineConfig`](crate::pipeline::PipelineConfig).
///
/// Field names follow the `start` command's flags: `sbs` is `read_buffer_size`, `pcs` is
/// `queue_capacity`, `pcc` is `worker_count`.
#[derive(Clone, Debug)]
pub struct PipelineOpts {
    /// Directory to walk.
    pub root: PathBuf,
    /// Capacity of the path queue between walker and workers.
    pub queue_capacity: usize,
    /// Number of worker threads consuming the queue.
    pub worker_count: usize,
    /// Read buffer size in bytes. Advisory; the default processor reads files in chunks of this size.
    pub read_buffer_size: usize,
}

impl Default for PipelineOpts {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            queue_capacity: PipelineLimits::DEFAULT_QUEUE_CAPACITY,
            worker_count: PipelineLimits::DEFAULT_WORKER_COUNT,
            read_buffer_size: PipelineLimits::DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl PipelineOpts {
    /// Defaults for everything except the root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RunOutcome {
    /// Whole tree walked and every discovered file processed.
    #[default]
    Completed,
    /// Ended by `stop`: queue drained, recursion cut short.
    Stopped,
    /// Ended by `abort`: walk cancelled, remaining queued items abandoned.
    Aborted,
}

/// Counters for one call to [`Pipeline::start`](crate::pipeline::Pipeline::start).
#[derive(Clone, Debug, Default)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    /// Regular files the walker registered with the completion barrier and enqueued.
    pub discovered: usize,
    /// Files the processor handled successfully.
    pub processed: usize,
    /// Files the processor failed on (errors and panics).
    pub failed: usize,
    /// Files dequeued after an abort and dropped without processing.
    pub abandoned: usize,
    /// Directory entries skipped because they could not be read.
    pub traversal_errors: usize,
    /// Highest number of buffered items observed in the queue.
    pub peak_queue_depth: usize,
    /// Highest number of workers inside the processor at the same time.
    pub peak_active_workers: usize,
    pub elapsed: Duration,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}: {} discovered, {} processed, {} failed, {} abandoned, {} unreadable entries in {:.2?}",
            self.outcome,
            self.discovered,
            self.processed,
            self.failed,
            self.abandoned,
            self.traversal_errors,
            self.elapsed
        )
    }
}

/// Full options for the CLI: pipeline options plus what the default processor and the
/// terminal output need. Use [`PipelineOpts`] for lib.
#[derive(Clone, Debug, Default)]
pub struct RunOpts {
    pub pipeline: PipelineOpts,
    /// Compute a blake3 hash of every file.
    pub with_hash: bool,
    /// Debug logging and a live file counter.
    pub verbose: bool,
}
