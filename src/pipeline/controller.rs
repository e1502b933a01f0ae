//! Pipeline controller: owns the configuration and lifecycle state, wires walk thread, queue,
//! start gate, completion barrier and worker pool together for each run.

use std::sync::Arc;
use std::time::Instant;

use log::debug;

use crate::error::PipelineError;
use crate::types::{PipelineState, RunOutcome, RunSummary};

use super::config::PipelineConfig;
use super::context::{PipelineContext, RunChannels, RunCounters, create_run_channels};
use super::sink::{ErrorSink, LogSink};
use super::walk::{WalkHandle, spawn_walk_thread};
use super::workers::{FileProcessor, WorkerHandle, spawn_workers};

/// A bounded file-processing pipeline over one directory tree.
///
/// Constructed Stopped. [`start`](Self::start) runs the whole tree and returns when every
/// discovered file has been handled; [`abort`](Self::abort) and [`stop`](Self::stop) may be
/// called meanwhile from another thread, directly or through a [`PipelineHandle`].
pub struct Pipeline {
    shared: Arc<PipelineContext>,
}

/// Clonable handle for requesting termination from other threads (signal handlers, UIs).
#[derive(Clone)]
pub struct PipelineHandle {
    shared: Arc<PipelineContext>,
}

impl Pipeline {
    /// Pipeline reporting per-item errors to the log.
    pub fn new<P>(config: PipelineConfig, processor: P) -> Self
    where
        P: FileProcessor + 'static,
    {
        Self::with_sink(config, Arc::new(processor), Arc::new(LogSink))
    }

    /// Pipeline with an explicit processor and error sink. Keep your own clones of the `Arc`s
    /// to read processor or sink state after the run.
    pub fn with_sink(
        config: PipelineConfig,
        processor: Arc<dyn FileProcessor>,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            shared: Arc::new(PipelineContext::new(config, processor, sink)),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.shared.config
    }

    pub fn state(&self) -> PipelineState {
        self.shared.state()
    }

    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run the pipeline to completion (or until stopped/aborted).
    ///
    /// Fails with [`PipelineError::InvalidState`] unless Stopped. Per-item errors go to the
    /// sink; the returned error is reserved for fatal failures such as
    /// [`PipelineError::RootAccess`]. The pipeline is Stopped again when this returns.
    pub fn start(&self) -> Result<RunSummary, PipelineError> {
        self.shared
            .transition("start", &[PipelineState::Stopped], PipelineState::Starting)?;
        let started = Instant::now();
        let result = self.run();
        let last = self.shared.finish();

        let mut summary = result?;
        summary.outcome = match last {
            PipelineState::Aborting => RunOutcome::Aborted,
            PipelineState::Stopping => RunOutcome::Stopped,
            _ => RunOutcome::Completed,
        };
        summary.elapsed = started.elapsed();
        debug!("pipeline run finished: {}", summary);
        Ok(summary)
    }

    /// Stop as soon as possible: cancel the walk, let in-flight items finish, abandon the rest.
    /// Fails if Stopped; a no-op if already stopping or aborting.
    pub fn abort(&self) -> Result<(), PipelineError> {
        self.shared
            .request_termination("abort", PipelineState::Aborting)
    }

    /// Stop gracefully: no further recursion, drain the queue. Fails if Stopped; a no-op if
    /// already stopping or aborting.
    pub fn stop(&self) -> Result<(), PipelineError> {
        self.shared
            .request_termination("stop", PipelineState::Stopping)
    }

    /// Turn a graceful stop into an abort. Works from Starting, Running or Stopping; a no-op
    /// if already aborting, an error if Stopped. [`abort`](Self::abort) leaves a stop alone.
    pub fn escalate_abort(&self) -> Result<(), PipelineError> {
        self.shared.escalate_abort()
    }

    fn run(&self) -> Result<RunSummary, PipelineError> {
        let config = &self.shared.config;
        debug!(
            "pipeline: root {}, queue capacity {}, {} workers, read buffer {} bytes",
            config.root().display(),
            config.queue_capacity(),
            config.worker_count(),
            config.read_buffer_size()
        );

        let RunChannels {
            queue,
            barrier,
            counters,
            opener,
            walk_ctx,
        } = create_run_channels(&self.shared, config.root())?;

        // Workers first, so nothing is ever enqueued without a consumer.
        let workers = match spawn_workers(
            queue.receiver(),
            &self.shared,
            &barrier,
            &counters,
            config.worker_count(),
        ) {
            Ok(workers) => workers,
            Err(err) => {
                drop(walk_ctx);
                queue.close()?;
                return Err(err);
            }
        };

        let walk_handle = match spawn_walk_thread(walk_ctx) {
            Ok(handle) => handle,
            Err(err) => {
                queue.close()?;
                join_workers(workers)?;
                return Err(err);
            }
        };

        if let Err(err) =
            self.shared
                .transition("run", &[PipelineState::Starting], PipelineState::Running)
        {
            debug!("not entering running: {}", err);
        }
        opener.open();

        let walked = join_walk(walk_handle);
        queue.close()?;
        barrier.wait();
        let joined = join_workers(workers);

        let discovered = walked?;
        joined?;

        Ok(RunSummary {
            discovered,
            processed: RunCounters::get(&counters.processed),
            failed: RunCounters::get(&counters.failed),
            abandoned: RunCounters::get(&counters.abandoned),
            traversal_errors: RunCounters::get(&counters.traversal_errors),
            peak_queue_depth: RunCounters::get(&counters.peak_queue_depth),
            peak_active_workers: RunCounters::get(&counters.peak_active_workers),
            ..RunSummary::default()
        })
    }
}

impl PipelineHandle {
    pub fn state(&self) -> PipelineState {
        self.shared.state()
    }

    /// Same as [`Pipeline::abort`].
    pub fn abort(&self) -> Result<(), PipelineError> {
        self.shared
            .request_termination("abort", PipelineState::Aborting)
    }

    /// Same as [`Pipeline::stop`].
    pub fn stop(&self) -> Result<(), PipelineError> {
        self.shared
            .request_termination("stop", PipelineState::Stopping)
    }

    /// Same as [`Pipeline::escalate_abort`].
    pub fn escalate_abort(&self) -> Result<(), PipelineError> {
        self.shared.escalate_abort()
    }
}

fn join_walk(handle: WalkHandle) -> Result<usize, PipelineError> {
    handle
        .join()
        .map_err(|_| PipelineError::WorkerPanicked("walk".to_string()))?
}

/// Join every worker; the first error wins but all are joined.
fn join_workers(handles: Vec<WorkerHandle>) -> Result<(), PipelineError> {
    let mut first_err = None;
    for (id, h) in handles.into_iter().enumerate() {
        let res = h
            .join()
            .map_err(|_| PipelineError::WorkerPanicked(format!("worker {id}")))
            .and_then(|r| r);
        if let Err(err) = res {
            first_err.get_or_insert(err);
        }
    }
    first_err.map_or(Ok(()), Err)
}
