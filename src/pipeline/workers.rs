//! Worker pool: fixed number of threads pulling work items off the path queue and handing them
//! to the file processor.

use crossbeam_channel::Receiver;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};

use log::trace;

use crate::error::PipelineError;
use crate::types::{PipelineState, WorkItem};

use super::barrier::CompletionBarrier;
use super::context::{PipelineContext, RunCounters};

/// The per-file step each worker runs. Called concurrently from every worker, so it must be
/// `Send + Sync`. An `Err` (or a panic) is reported and counted; the worker keeps going.
pub trait FileProcessor: Send + Sync {
    fn process(&self, item: &WorkItem) -> anyhow::Result<()>;
}

impl<F> FileProcessor for F
where
    F: Fn(&WorkItem) -> anyhow::Result<()> + Send + Sync,
{
    fn process(&self, item: &WorkItem) -> anyhow::Result<()> {
        self(item)
    }
}

pub type WorkerHandle = JoinHandle<Result<(), PipelineError>>;

/// Single worker: receive until the queue is closed and drained. Every received item releases
/// exactly one barrier unit, whether processed, failed or abandoned.
fn worker_loop(
    path_rx: Receiver<WorkItem>,
    shared: Arc<PipelineContext>,
    barrier: Arc<CompletionBarrier>,
    counters: Arc<RunCounters>,
) -> Result<(), PipelineError> {
    while let Ok(item) = path_rx.recv() {
        if shared.state() == PipelineState::Aborting {
            trace!("abandoning {}", item.path().display());
            RunCounters::bump(&counters.abandoned);
        } else if catch_unwind(AssertUnwindSafe(|| run_one(&item, &shared, &counters))).is_err() {
            // A panicking sink must not leak the barrier unit.
            log::error!("error sink panicked while reporting {}", item.path().display());
        }
        barrier.done()?;
    }
    Ok(())
}

fn run_one(item: &WorkItem, shared: &PipelineContext, counters: &RunCounters) {
    let active = counters.active_workers.fetch_add(1, Ordering::SeqCst) + 1;
    RunCounters::record_peak(&counters.peak_active_workers, active);

    let result = catch_unwind(AssertUnwindSafe(|| shared.processor.process(item)));

    counters.active_workers.fetch_sub(1, Ordering::SeqCst);

    let message = match result {
        Ok(Ok(())) => {
            RunCounters::bump(&counters.processed);
            return;
        }
        Ok(Err(err)) => format!("{:#}", err),
        Err(panic) => panic_message(panic.as_ref()),
    };
    RunCounters::bump(&counters.failed);
    shared.sink.report(&PipelineError::Processing {
        path: item.path().to_path_buf(),
        message,
    });
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("processor panicked: {detail}")
}

/// Spawn `num_workers` workers on `path_rx`. The caller closes the queue after the walk so
/// workers exit once it is drained. If a spawn fails, already-running workers are left to
/// exit on their own when the queue closes.
pub fn spawn_workers(
    path_rx: Receiver<WorkItem>,
    shared: &Arc<PipelineContext>,
    barrier: &Arc<CompletionBarrier>,
    counters: &Arc<RunCounters>,
    num_workers: usize,
) -> Result<Vec<WorkerHandle>, PipelineError> {
    (0..num_workers)
        .map(|id| {
            let path_rx = path_rx.clone();
            let shared = Arc::clone(shared);
            let barrier = Arc::clone(barrier);
            let counters = Arc::clone(counters);
            thread::Builder::new()
                .name(format!("filepipe-worker-{id}"))
                .spawn(move || worker_loop(path_rx, shared, barrier, counters))
                .map_err(|source| PipelineError::ThreadSpawn {
                    name: format!("worker {id}"),
                    source,
                })
        })
        .collect()
}
