//! Cooperative cancellation with an optional deadline.
//!
//! Tokens are checked at the blocking boundaries of an operation: the
//! external decoder, file reads, and every index call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::ServiceError;

/// Shared cancellation flag plus an optional deadline.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that never expires on its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that trips once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Request cancellation. Clones of this token observe the flag.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// True when cancelled explicitly or past the deadline.
    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::Relaxed) {
            return true;
        }
        matches!(self.deadline, Some(deadline) if Instant::now() >= deadline)
    }

    /// Boundary check used by the orchestrator.
    pub fn check(&self) -> Result<(), ServiceError> {
        if self.is_cancelled() {
            Err(ServiceError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.check().unwrap();
    }

    #[test]
    fn explicit_cancellation_is_visible_through_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
        assert!(matches!(clone.check(), Err(ServiceError::Cancelled)));
    }

    #[test]
    fn expired_deadline_trips_the_token() {
        let token = CancelToken::with_timeout(Duration::from_millis(0));
        assert!(token.is_cancelled());
    }

    #[test]
    fn generous_deadline_does_not_trip_immediately() {
        let token = CancelToken::with_timeout(Duration::from_secs(3_600));
        assert!(!token.is_cancelled());
    }
}
