//! Pipeline context: state shared between the controller, its handles, the walk thread and the
//! workers, plus the per-run channels built by `create_run_channels`.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::error::PipelineError;
use crate::types::PipelineState;

use super::barrier::CompletionBarrier;
use super::config::PipelineConfig;
use super::gate::{GateOpener, GateWaiter, start_gate};
use super::queue::PathQueue;
use super::sink::ErrorSink;
use super::workers::FileProcessor;

/// Long-lived state owned by one pipeline. Every state transition goes through [`Self::transition`].
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub processor: Arc<dyn FileProcessor>,
    pub sink: Arc<dyn ErrorSink>,
    state: Mutex<PipelineState>,
    /// Dropped on abort to wake a walker blocked on a full queue. `None` outside a run.
    cancel_tx: Mutex<Option<Sender<()>>>,
}

impl PipelineContext {
    pub fn new(
        config: PipelineConfig,
        processor: Arc<dyn FileProcessor>,
        sink: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            config,
            processor,
            sink,
            state: Mutex::new(PipelineState::Stopped),
            cancel_tx: Mutex::new(None),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.lock_state()
    }

    /// Move from any of `from` to `to`. Fails with [`PipelineError::InvalidState`] otherwise.
    pub fn transition(
        &self,
        op: &'static str,
        from: &[PipelineState],
        to: PipelineState,
    ) -> Result<(), PipelineError> {
        let mut state = self.lock_state();
        if !from.contains(&state) {
            return Err(PipelineError::InvalidState { op, state: *state });
        }
        debug!("pipeline {} -> {}", *state, to);
        *state = to;
        Ok(())
    }

    /// Request termination (stop or abort). Stopped is an error; already terminating is a no-op.
    pub fn request_termination(
        &self,
        op: &'static str,
        to: PipelineState,
    ) -> Result<(), PipelineError> {
        let mut state = self.lock_state();
        match *state {
            PipelineState::Stopped => Err(PipelineError::InvalidState { op, state: *state }),
            s if s.is_terminating() => {
                debug!("pipeline already {}, {} ignored", s, op);
                Ok(())
            }
            s => {
                debug!("pipeline {} -> {}", s, to);
                *state = to;
                if to == PipelineState::Aborting {
                    self.disarm_cancel();
                }
                Ok(())
            }
        }
    }

    /// Abort even when a stop is already in progress. Unlike [`Self::request_termination`],
    /// Stopping is not terminal here: it moves on to Aborting. Stopped is an error; already
    /// Aborting is a no-op.
    pub fn escalate_abort(&self) -> Result<(), PipelineError> {
        let mut state = self.lock_state();
        match *state {
            PipelineState::Stopped => Err(PipelineError::InvalidState {
                op: "abort",
                state: *state,
            }),
            PipelineState::Aborting => Ok(()),
            s => {
                debug!("pipeline {} -> {}", s, PipelineState::Aborting);
                *state = PipelineState::Aborting;
                self.disarm_cancel();
                Ok(())
            }
        }
    }

    /// Drop the cancel sender. Callers hold the state lock, so the walker can't observe
    /// Aborting with the cancel channel still armed.
    fn disarm_cancel(&self) {
        self.cancel_tx.lock().unwrap_or_else(|p| p.into_inner()).take();
    }

    /// Unconditionally return to Stopped at the end of a run.
    pub fn finish(&self) -> PipelineState {
        let mut state = self.lock_state();
        let prev = *state;
        debug!("pipeline {} -> {}", prev, PipelineState::Stopped);
        *state = PipelineState::Stopped;
        self.disarm_cancel();
        prev
    }

    /// Store the run's cancel sender. If an abort already landed, drop it right away instead.
    fn arm_cancel(&self, tx: Sender<()>) {
        let state = self.lock_state();
        if *state != PipelineState::Aborting {
            *self.cancel_tx.lock().unwrap_or_else(|p| p.into_inner()) = Some(tx);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, PipelineState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Counters shared by the walk thread and the workers for one run.
#[derive(Debug, Default)]
pub struct RunCounters {
    pub discovered: AtomicUsize,
    pub processed: AtomicUsize,
    pub failed: AtomicUsize,
    pub abandoned: AtomicUsize,
    pub traversal_errors: AtomicUsize,
    pub peak_queue_depth: AtomicUsize,
    pub active_workers: AtomicUsize,
    pub peak_active_workers: AtomicUsize,
}

impl RunCounters {
    pub fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peak(peak: &AtomicUsize, value: usize) {
        peak.fetch_max(value, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }
}

/// Everything the walk thread needs for one run.
pub struct WalkContext {
    pub root: PathBuf,
    pub shared: Arc<PipelineContext>,
    pub tx: Sender<crate::types::WorkItem>,
    pub gate: GateWaiter,
    pub cancel_rx: Receiver<()>,
    pub barrier: Arc<CompletionBarrier>,
    pub counters: Arc<RunCounters>,
}

/// Per-run channels and shared state. The controller keeps the queue and the gate opener;
/// the walk context goes to the walk thread.
pub struct RunChannels {
    pub queue: Arc<PathQueue>,
    pub barrier: Arc<CompletionBarrier>,
    pub counters: Arc<RunCounters>,
    pub opener: GateOpener,
    pub walk_ctx: WalkContext,
}

/// Build the queue, start gate, completion barrier and cancel channel for one run, and arm
/// the cancel channel on `shared`.
pub fn create_run_channels(
    shared: &Arc<PipelineContext>,
    root: &Path,
) -> Result<RunChannels, PipelineError> {
    let queue = Arc::new(PathQueue::new(shared.config.queue_capacity()));
    let barrier = Arc::new(CompletionBarrier::new());
    let counters = Arc::new(RunCounters::default());
    let (opener, gate) = start_gate();
    let (cancel_tx, cancel_rx) = bounded::<()>(0);
    shared.arm_cancel(cancel_tx);

    let walk_ctx = WalkContext {
        root: root.to_path_buf(),
        shared: Arc::clone(shared),
        tx: queue.sender()?,
        gate,
        cancel_rx,
        barrier: Arc::clone(&barrier),
        counters: Arc::clone(&counters),
    };

    Ok(RunChannels {
        queue,
        barrier,
        counters,
        opener,
        walk_ctx,
    })
}
