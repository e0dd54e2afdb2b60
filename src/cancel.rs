//! Cancellation handling for Ctrl+C and run timeouts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Shared cancellation flag with an optional deadline.
///
/// Clones observe the same flag. Once cancelled, a token stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel automatically once `timeout` has passed. A timeout too large
    /// to represent means no deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Instant::now().checked_add(timeout);
        self
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested or the deadline has passed.
    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::SeqCst) {
            return true;
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.flag.store(true, Ordering::SeqCst);
                true
            }
            _ => false,
        }
    }

    /// Sleep for `duration`, waking early if cancelled.
    pub fn sleep(&self, duration: Duration) {
        let start = Instant::now();
        while !self.is_cancelled() {
            let elapsed = start.elapsed();
            if elapsed >= duration {
                break;
            }
            thread::sleep((duration - elapsed).min(POLL_INTERVAL));
        }
    }

    /// Register the Ctrl+C handler.
    ///
    /// When Ctrl+C is pressed, this token is cancelled. Only one handler can
    /// be installed per process; later registrations are logged and ignored.
    pub fn register_ctrlc(&self) {
        let flag = Arc::clone(&self.flag);
        let result = ctrlc::set_handler(move || {
            if !flag.swap(true, Ordering::SeqCst) {
                info!("Interrupted; finishing in-flight AI requests");
            }
        });
        if let Err(e) = result {
            warn!("Could not install Ctrl+C handler: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn deadline_cancels() {
        let token = CancelToken::new().with_timeout(Duration::ZERO);
        assert!(token.is_cancelled());

        let token = CancelToken::new().with_timeout(Duration::from_secs(3600));
        assert!(!token.is_cancelled());

        let token = CancelToken::new().with_timeout(Duration::MAX);
        assert!(!token.is_cancelled());
    }

    #[test]
    fn sleep_returns_early_when_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let start = Instant::now();
        token.sleep(Duration::from_secs(30));
        assert!(start.elapsed() < Duration::from_secs(1));

        let token = CancelToken::new();
        let start = Instant::now();
        token.sleep(Duration::from_millis(30));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
