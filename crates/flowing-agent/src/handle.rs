//! A cloneable handle for poking a running workflow from external code.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// A cloneable handle onto a [`crate::Workflow`].
///
/// All fields are `Arc`-wrapped, so cloning is cheap. `abort()` terminates
/// the in-flight child process immediately and makes the run return a
/// cancelled outcome.
#[derive(Clone)]
pub struct WorkflowHandle {
    pub(crate) cancel: Arc<Mutex<CancellationToken>>,
    pub(crate) is_running: Arc<AtomicBool>,
}

impl WorkflowHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            is_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Abort the current run.
    pub fn abort(&self) {
        self.cancel.lock().cancel();
    }

    /// Whether a run is currently in flight.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// Token for the current run.
    pub(crate) fn current_token(&self) -> CancellationToken {
        self.cancel.lock().clone()
    }

    /// Install a fresh token at the start of a run.
    pub(crate) fn reset(&self) {
        *self.cancel.lock() = CancellationToken::new();
        self.is_running.store(true, Ordering::Release);
    }

    pub(crate) fn finish(&self) {
        self.is_running.store(false, Ordering::Release);
    }
}
