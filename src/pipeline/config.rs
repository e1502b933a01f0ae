//! Validated, immutable pipeline configuration.

use std::path::{Component, Path, PathBuf};

use crate::error::PipelineError;
use crate::types::PipelineOpts;
use crate::utils::config::PipelineLimits;

/// Configuration a [`Pipeline`](super::Pipeline) is built from. Only obtainable through
/// validation, so holding one means every ceiling has been checked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineConfig {
    root: PathBuf,
    queue_capacity: usize,
    worker_count: usize,
    read_buffer_size: usize,
}

impl PipelineConfig {
    /// Validate `opts`. Nothing is spawned here; a rejected config never reaches a thread.
    pub fn new(opts: PipelineOpts) -> Result<Self, PipelineError> {
        let root = normalize_root(&opts.root).ok_or_else(|| {
            PipelineError::config("there must be a path to the directory containing files to process")
        })?;
        check_ceiling(
            "queue capacity",
            opts.queue_capacity,
            PipelineLimits::MAX_QUEUE_CAPACITY,
        )?;
        check_ceiling(
            "worker count",
            opts.worker_count,
            PipelineLimits::MAX_WORKER_COUNT,
        )?;
        if opts.worker_count == 0 {
            return Err(PipelineError::config("the worker count must be at least 1"));
        }
        check_ceiling(
            "read buffer size",
            opts.read_buffer_size,
            PipelineLimits::MAX_READ_BUFFER_SIZE,
        )?;
        Ok(Self {
            root,
            queue_capacity: opts.queue_capacity,
            worker_count: opts.worker_count,
            read_buffer_size: opts.read_buffer_size,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }
}

impl TryFrom<PipelineOpts> for PipelineConfig {
    type Error = PipelineError;

    fn try_from(opts: PipelineOpts) -> Result<Self, Self::Error> {
        PipelineConfig::new(opts)
    }
}

fn check_ceiling(name: &str, value: usize, max: usize) -> Result<(), PipelineError> {
    if value > max {
        return Err(PipelineError::config(format!(
            "the {name} cannot exceed {max} (got {value})"
        )));
    }
    Ok(())
}

/// Trim surrounding whitespace and drop redundant separators and `.` components.
/// Returns `None` when nothing is left.
pub fn normalize_root(root: &Path) -> Option<PathBuf> {
    let trimmed = match root.to_str() {
        Some(s) => PathBuf::from(s.trim()),
        None => root.to_path_buf(),
    };
    let mut out = PathBuf::new();
    for comp in trimmed.components() {
        match comp {
            Component::CurDir if out.as_os_str().is_empty() => out.push("."),
            Component::CurDir => {}
            other => {
                if out.as_os_str() == "." {
                    out = PathBuf::new();
                }
                out.push(other.as_os_str());
            }
        }
    }
    (!out.as_os_str().is_empty()).then_some(out)
}
