//! Cancellable wall-clock waits

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Longest uninterrupted sleep; bounds cancellation latency
pub(crate) const SLEEP_SLICE: Duration = Duration::from_millis(5);

/// Shared flag that aborts a running session when set
pub type CancelFlag = Arc<AtomicBool>;

/// Sleeps against absolute deadlines, waking early when cancelled
#[derive(Debug, Clone, Default)]
pub struct Pacer {
    cancel: CancelFlag,
}

impl Pacer {
    pub fn new(cancel: CancelFlag) -> Self {
        Self { cancel }
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Sleep until `deadline`. Returns `false` if cancelled first.
    ///
    /// A deadline already in the past returns immediately.
    pub fn sleep_until(&self, deadline: Instant) -> bool {
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }

    /// Sleep for `duration`. Returns `false` if cancelled first.
    pub fn sleep(&self, duration: Duration) -> bool {
        self.sleep_until(Instant::now() + duration)
    }
}
