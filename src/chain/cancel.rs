//! Cancellation for the proof-of-work search.
//!
//! A `CancelToken` is a `CancellationToken` plus an optional deadline. Clones
//! share the cancellation state, so a token handed to another thread can stop a
//! search in progress. No async runtime is involved.

use crate::error::{Error, Result};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancellation_token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// Token that times out `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        CancelToken::new().child_with_timeout(timeout)
    }

    /// Child token with its own deadline. Cancelling `self` cancels the child,
    /// cancelling the child leaves `self` untouched.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        CancelToken {
            cancellation_token: self.cancellation_token.child_token(),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Signal every clone and child of this token. Sticky: there is no reset.
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `Err(MiningCancelled)` or `Err(MiningTimedOut)` once the search must stop.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::MiningCancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Error::MiningTimedOut),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_token_passes() {
        let token = CancelToken::new();
        assert!(token.check().is_ok());
        assert!(token.deadline().is_none());
    }

    #[test]
    fn test_cancel_reaches_clones_and_children() {
        let token = CancelToken::new();
        let clone = token.clone();
        let child = token.child_with_timeout(Duration::from_secs(3600));
        token.cancel();
        assert!(matches!(clone.check(), Err(Error::MiningCancelled)));
        assert!(matches!(child.check(), Err(Error::MiningCancelled)));
    }

    #[test]
    fn test_cancelling_child_leaves_parent_running() {
        let token = CancelToken::new();
        let child = token.child_with_timeout(Duration::from_secs(3600));
        child.cancel();
        assert!(child.is_cancelled());
        assert!(token.check().is_ok());
    }

    #[test]
    fn test_zero_timeout_expires() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert!(matches!(token.check(), Err(Error::MiningTimedOut)));
    }
}
