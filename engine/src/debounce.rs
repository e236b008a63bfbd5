//! Cancellable debounce for coalescing rapid partial-stream updates.
//!
//! One scheduled task at a time: scheduling again cancels the in-flight
//! timer and restarts the delay, so a burst of stream events collapses into
//! one pass instead of re-running per token. Cancellation goes through
//! `AbortHandle` so teardown can kill a pending timer without awaiting it.
//!
//! The debouncer only guarantees the *timer* is cancelled; a task that has
//! already fired may still deliver its effect. Callers guard against that
//! with a session epoch check at apply time (see [`crate::Session`]).

use std::future::Future;
use std::time::Duration;

use futures_util::future::{AbortHandle, Abortable};

#[derive(Debug, Default)]
pub struct Debouncer {
    handle: Option<AbortHandle>,
}

impl Debouncer {
    /// Delay tuned so per-token stream updates coalesce while a finished
    /// message still feels immediate.
    pub const DEFAULT_DELAY: Duration = Duration::from_millis(150);

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to run after `delay`, cancelling any pending one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&mut self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let (handle, registration) = AbortHandle::new_pair();
        tokio::spawn(async move {
            let timed = async move {
                tokio::time::sleep(delay).await;
                task.await;
            };
            let _ = Abortable::new(timed, registration).await;
        });
        self.handle = Some(handle);
    }

    /// Abort the pending task, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
