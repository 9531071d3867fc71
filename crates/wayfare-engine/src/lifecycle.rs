//! Shutdown signalling and task liveness tracking.
//!
//! Both are disconnect-only channels: nothing is ever sent on them.
//! Dropping the [`ShutdownTrigger`] disconnects every [`ShutdownSignal`]
//! at once, and the [`TaskTracker`] observes the moment the last
//! [`TaskToken`] is dropped.

use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

/// Owning side of the shutdown signal. Dropping it stops every task.
#[derive(Debug)]
pub struct ShutdownTrigger {
    _tx: Sender<()>,
}

/// Observing side of the shutdown signal, cloned into every task.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    rx: Receiver<()>,
}

/// Create a linked trigger and signal.
pub fn shutdown_pair() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = bounded(0);
    (ShutdownTrigger { _tx: tx }, ShutdownSignal { rx })
}

impl ShutdownSignal {
    /// Whether the trigger has been dropped.
    pub fn is_set(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep for `duration` unless shutdown arrives first.
    ///
    /// Returns `true` if the full duration elapsed, `false` on shutdown.
    pub fn sleep(&self, duration: Duration) -> bool {
        match self.rx.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => true,
            Err(RecvTimeoutError::Disconnected) | Ok(()) => false,
        }
    }

    /// The underlying receiver, for use in `select!`.
    pub(crate) fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}

/// Held by every running task; dropped when the task ends.
#[derive(Clone, Debug)]
pub struct TaskToken {
    _tx: Sender<()>,
}

/// Waits for every [`TaskToken`] to be dropped.
#[derive(Debug)]
pub struct TaskTracker {
    rx: Receiver<()>,
}

/// Create a tracker and the first token.
pub fn task_tracker() -> (TaskTracker, TaskToken) {
    let (tx, rx) = bounded(0);
    (TaskTracker { rx }, TaskToken { _tx: tx })
}

impl TaskTracker {
    /// Block until every token is gone.
    pub fn wait(&self) {
        // Only disconnection ever ends this receive.
        let _ = self.rx.recv();
    }

    /// Block until every token is gone or `timeout` passes.
    ///
    /// Returns whether every task finished.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.rx.recv_deadline(deadline) {
                Err(RecvTimeoutError::Disconnected) => return true,
                Err(RecvTimeoutError::Timeout) => return false,
                Ok(()) => continue,
            }
        }
    }

    /// Whether every token is gone, without blocking.
    pub fn is_idle(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }
}
