//! Completion barrier: counts outstanding work items so the controller can wait for all of them.

use std::sync::{Condvar, Mutex, MutexGuard};

use crate::error::PipelineError;

/// Counter of in-flight work items. The walker calls [`add`](Self::add) before each enqueue, a
/// worker calls [`done`](Self::done) after finishing (or abandoning) the item.
#[derive(Debug, Default)]
pub struct CompletionBarrier {
    outstanding: Mutex<usize>,
    drained: Condvar,
}

impl CompletionBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one unit of work. Must happen before the item becomes visible to workers.
    pub fn add(&self) {
        *self.lock() += 1;
    }

    /// Release one unit. Releasing more units than were added is a bookkeeping bug and is
    /// returned as [`PipelineError::InvariantViolation`]; the count is left at zero.
    pub fn done(&self) -> Result<(), PipelineError> {
        let mut outstanding = self.lock();
        if *outstanding == 0 {
            return Err(PipelineError::InvariantViolation(
                "completion barrier released below zero".to_string(),
            ));
        }
        *outstanding -= 1;
        if *outstanding == 0 {
            self.drained.notify_all();
        }
        Ok(())
    }

    /// Current number of outstanding units.
    pub fn outstanding(&self) -> usize {
        *self.lock()
    }

    /// Block until the count reaches zero.
    pub fn wait(&self) {
        let mut outstanding = self.lock();
        while *outstanding > 0 {
            outstanding = self
                .drained
                .wait(outstanding)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    // The guarded value is a plain counter, always consistent, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.outstanding
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
