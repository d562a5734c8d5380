//! Cooperative cancellation for automation runs.
//!
//! Every potentially slow operation loops in small increments over the same
//! token so an external stop request is observed within ~50ms instead of
//! only between whole operations. Cancellation is cooperative only: an
//! in-flight OS input call cannot be interrupted, just the loop around it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::{AutomationError, AutomationResult};

/// Maximum interval between stop-flag checks while sleeping or waiting.
pub const CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Shared stop flag handed to every layer of a run.
///
/// Cloning is cheap; all clones observe the same flag. The worker clears it
/// at the start of each run, the caller sets it to request a stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a cooperative stop. Observed at the next check point.
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Re-arm the token for a fresh run.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// The single check-and-raise primitive: turns a pending stop request
    /// into a typed error that propagates up to the orchestrator.
    pub fn check(&self) -> AutomationResult<()> {
        if self.is_stopped() {
            Err(AutomationError::Stopped)
        } else {
            Ok(())
        }
    }

    /// Sleep that stays responsive to stop requests.
    pub fn sleep(&self, duration: Duration) -> AutomationResult<()> {
        let deadline = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep(CHECK_INTERVAL.min(deadline - now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_passes_checks() {
        let token = CancelToken::new();
        assert!(!token.is_stopped());
        assert!(token.check().is_ok());
    }

    #[test]
    fn stop_request_raises_on_check() {
        let token = CancelToken::new();
        token.request_stop();
        assert!(matches!(token.check(), Err(AutomationError::Stopped)));

        token.reset();
        assert!(token.check().is_ok());
    }

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.request_stop();
        assert!(token.is_stopped());
    }

    #[test]
    fn sleep_completes_when_not_stopped() {
        let token = CancelToken::new();
        let start = Instant::now();
        token.sleep(Duration::from_millis(20)).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn sleep_aborts_promptly_after_stop() {
        let token = CancelToken::new();
        let clone = token.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            clone.request_stop();
        });

        let start = Instant::now();
        let result = token.sleep(Duration::from_secs(10));
        handle.join().unwrap();

        assert!(matches!(result, Err(AutomationError::Stopped)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
