//! Bounded path queue between the walker and the worker pool.

use crossbeam_channel::{Receiver, Sender, bounded, select};
use std::sync::Mutex;

use crate::error::PipelineError;
use crate::types::WorkItem;

/// Fixed-capacity FIFO. Send blocks while full, receive blocks while empty and open.
///
/// The queue keeps the original sender; [`close`](Self::close) drops it. Once every clone
/// handed out by [`sender`](Self::sender) is gone too, receivers see the channel disconnect
/// after draining what is buffered.
pub struct PathQueue {
    tx: Mutex<Option<Sender<WorkItem>>>,
    rx: Receiver<WorkItem>,
}

/// Result of a cancellable send.
#[derive(Debug, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// The cancel channel fired before a slot freed up. The item was not enqueued.
    Cancelled,
    /// Every receiver is gone. The item was not enqueued.
    Disconnected,
}

impl PathQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded::<WorkItem>(capacity);
        Self {
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }

    /// Items currently buffered.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// A sending handle for the walker. Fails once the queue has been closed.
    pub fn sender(&self) -> Result<Sender<WorkItem>, PipelineError> {
        self.tx
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .cloned()
            .ok_or_else(|| {
                PipelineError::InvariantViolation("sender requested from a closed queue".into())
            })
    }

    /// A receiving handle for a worker.
    pub fn receiver(&self) -> Receiver<WorkItem> {
        self.rx.clone()
    }

    /// Drop the queue's own sender. Closing twice is an [`PipelineError::InvariantViolation`].
    pub fn close(&self) -> Result<(), PipelineError> {
        match self.tx.lock().unwrap_or_else(|p| p.into_inner()).take() {
            Some(tx) => {
                drop(tx);
                Ok(())
            }
            None => Err(PipelineError::InvariantViolation(
                "path queue closed twice".to_string(),
            )),
        }
    }
}

/// Send `item`, blocking while the queue is full, unless `cancel` fires first.
/// `cancel` fires when its sender is dropped; nothing is ever sent on it.
pub fn send_or_cancel(
    tx: &Sender<WorkItem>,
    item: WorkItem,
    cancel: &Receiver<()>,
) -> SendOutcome {
    select! {
        send(tx, item) -> res => match res {
            Ok(()) => SendOutcome::Sent,
            Err(_) => SendOutcome::Disconnected,
        },
        recv(cancel) -> _ => SendOutcome::Cancelled,
    }
}
