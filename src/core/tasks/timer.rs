// src/core/tasks/timer.rs

//! A single-shot timer that runs a callback once after a delay.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// A scheduled callback. Dropping the timer before it fires cancels it.
///
/// Each timer carries a unique token that is also passed to its callback, so the
/// callback can tell whether the timer it belongs to is still the one installed
/// by its owner.
pub struct OneShotTimer {
    token: u64,
    handle: Option<JoinHandle<()>>,
}

impl OneShotTimer {
    /// Runs `on_fire` once, `delay` from now. Must be called inside a Tokio runtime.
    pub fn schedule_after<F>(delay: Duration, on_fire: F) -> Self
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(token);
        });
        Self {
            token,
            handle: Some(handle),
        }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// Releases the timer without cancelling it. Used by a callback to clear its
    /// own slot while it is running.
    pub fn disarm(mut self) {
        self.handle.take();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }
}

impl Drop for OneShotTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl fmt::Debug for OneShotTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OneShotTimer")
            .field("token", &self.token)
            .field("armed", &self.handle.is_some())
            .finish()
    }
}
