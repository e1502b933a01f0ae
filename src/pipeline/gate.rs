//! Start gate: one-shot signal holding the walker until the worker pool exists.

use crossbeam_channel::{Receiver, Sender, bounded};

/// Controller side. Consumed by [`open`](Self::open), so the gate can be opened at most once.
#[derive(Debug)]
pub struct GateOpener {
    tx: Sender<()>,
}

/// Walker side. Consumed by [`wait`](Self::wait).
#[derive(Debug)]
pub struct GateWaiter {
    rx: Receiver<()>,
}

/// Create a closed gate.
pub fn start_gate() -> (GateOpener, GateWaiter) {
    let (tx, rx) = bounded::<()>(1);
    (GateOpener { tx }, GateWaiter { rx })
}

impl GateOpener {
    /// Let the waiter through. Capacity is 1, so this never blocks.
    pub fn open(self) {
        let _ = self.tx.send(());
    }
}

impl GateWaiter {
    /// Block until the gate opens. Returns `false` if the opener was dropped without opening
    /// (startup failed); the waiter must then do nothing.
    pub fn wait(self) -> bool {
        self.rx.recv().is_ok()
    }
}
