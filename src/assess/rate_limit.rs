use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;

/// Enforces a minimum interval between consecutive requests across all threads.
///
/// Callers block in [`RateLimiter::acquire`] until their slot opens. The lock
/// is held while waiting, so waiting callers are released one at a time.
/// A cancelled caller gives up its slot without consuming it.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next slot. Returns false if `cancel` fired first.
    pub fn acquire(&self, cancel: &CancelToken) -> bool {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if cancel.is_cancelled() {
            return false;
        }
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.interval {
                cancel.sleep(self.interval - elapsed);
                if cancel.is_cancelled() {
                    return false;
                }
            }
        }
        *last = Some(Instant::now());
        true
    }
}
