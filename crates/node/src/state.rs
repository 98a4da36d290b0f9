//! Node lifecycle state and background-task accounting.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// The four lifecycle states of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeState {
    /// Gossiping, serving RPCs, advancing consensus.
    Babbling = 0,
    /// Soliciting a fast-forward to replace local state.
    CatchingUp = 1,
    /// Initial contact with a bootstrap peer.
    Joining = 2,
    /// Terminal. No further transitions occur.
    Shutdown = 3,
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeState::Babbling => "Babbling",
            NodeState::CatchingUp => "CatchingUp",
            NodeState::Joining => "Joining",
            NodeState::Shutdown => "Shutdown",
        };
        f.write_str(s)
    }
}

impl NodeState {
    fn from_u8(value: u8) -> NodeState {
        match value {
            0 => NodeState::Babbling,
            1 => NodeState::CatchingUp,
            2 => NodeState::Joining,
            _ => NodeState::Shutdown,
        }
    }
}

/// Atomic cell holding the current [`NodeState`].
///
/// Shutdown is absorbing: once observed, every later read returns Shutdown
/// and writes of any other state are refused.
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new(initial: NodeState) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    pub(crate) fn get(&self) -> NodeState {
        NodeState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Set the state. Returns false if the cell is already Shutdown.
    pub(crate) fn set(&self, state: NodeState) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if NodeState::from_u8(current) == NodeState::Shutdown {
                return false;
            }
            match self.0.compare_exchange_weak(
                current,
                state as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Enter Shutdown. Returns false if some other caller got there first.
    pub(crate) fn enter_shutdown(&self) -> bool {
        self.set(NodeState::Shutdown)
    }
}

/// Counts outstanding background tasks so quiescence points (fast-forward,
/// shutdown) can await them.
///
/// Unlike crossbeam's single-use wait group, this one is reusable: `wait`
/// takes `&self` and may be called any number of times.
#[derive(Debug, Clone, Default)]
pub struct WaitGroup {
    inner: Arc<WaitGroupInner>,
}

#[derive(Debug, Default)]
struct WaitGroupInner {
    count: Mutex<usize>,
    zero: Condvar,
}

impl WaitGroup {
    /// Create an empty wait group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one task; the returned guard deregisters it on drop.
    pub fn enter(&self) -> WaitGuard {
        *self.inner.count.lock() += 1;
        WaitGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Block until no registered tasks remain.
    pub fn wait(&self) {
        let mut count = self.inner.count.lock();
        while *count > 0 {
            self.inner.zero.wait(&mut count);
        }
    }

    /// Number of outstanding tasks.
    pub fn outstanding(&self) -> usize {
        *self.inner.count.lock()
    }
}

/// RAII registration in a [`WaitGroup`].
#[derive(Debug)]
pub struct WaitGuard {
    inner: Arc<WaitGroupInner>,
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        let mut count = self.inner.count.lock();
        *count -= 1;
        if *count == 0 {
            self.inner.zero.notify_all();
        }
    }
}

/// Broadcast shutdown signal.
///
/// Built on channel disconnection: triggering drops the sole sender, which
/// wakes every receiver blocked in a `select!` — the crossbeam analog of
/// closing a channel.
#[derive(Debug)]
pub(crate) struct ShutdownSignal {
    sender: Mutex<Option<crossbeam::channel::Sender<()>>>,
    receiver: crossbeam::channel::Receiver<()>,
}

impl ShutdownSignal {
    pub(crate) fn new() -> Self {
        let (tx, rx) = crossbeam::channel::bounded(0);
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: rx,
        }
    }

    /// A receiver that becomes ready once [`trigger`](Self::trigger) runs.
    pub(crate) fn listen(&self) -> crossbeam::channel::Receiver<()> {
        self.receiver.clone()
    }

    /// Broadcast shutdown. Idempotent.
    pub(crate) fn trigger(&self) {
        self.sender.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn shutdown_is_absorbing() {
        let cell = StateCell::new(NodeState::Babbling);
        assert!(cell.set(NodeState::CatchingUp));
        assert!(cell.enter_shutdown());
        assert!(!cell.set(NodeState::Babbling));
        assert!(!cell.enter_shutdown());
        assert_eq!(cell.get(), NodeState::Shutdown);
    }

    #[test]
    fn wait_group_blocks_until_guards_drop() {
        let wg = WaitGroup::new();
        let guard = wg.enter();
        assert_eq!(wg.outstanding(), 1);

        let waiter = {
            let wg = wg.clone();
            thread::spawn(move || wg.wait())
        };

        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.join().unwrap();
        assert_eq!(wg.outstanding(), 0);
    }

    #[test]
    fn wait_group_is_reusable() {
        let wg = WaitGroup::new();
        drop(wg.enter());
        wg.wait();
        drop(wg.enter());
        wg.wait();
    }

    #[test]
    fn shutdown_signal_wakes_listeners() {
        let signal = ShutdownSignal::new();
        let rx = signal.listen();
        // Not triggered yet: the channel is open but empty.
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(10)),
            Err(crossbeam::channel::RecvTimeoutError::Timeout)
        );

        signal.trigger();
        signal.trigger(); // idempotent

        // Disconnected receivers are always ready.
        assert!(rx.recv().is_err());
    }
}
