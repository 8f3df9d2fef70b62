//! Error type for the `ask` request/response pattern.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::util::ActorPath;

/// Failure modes for [`crate::ask::ask`] (spec.md §4.4, §7 `AskTimeout`).
///
/// Unlike `BehaviorException`, these errors *are* surfaced to the caller —
/// spec.md §7 singles out `AskTimeout` and `DuplicateName` as the two error
/// kinds that "block a user control path" and must not be silently consumed
/// by supervision.
#[derive(Debug, Error)]
pub enum AskError {
    /// No reply arrived before the deadline.
    #[error("ask to {target} timed out after {timeout:?}")]
    Timeout {
        /// The actor that was asked.
        target: ActorPath,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The target's mailbox was already closed when the request was sent.
    #[error("ask target {0} had already stopped")]
    TargetStopped(ActorPath),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = AskError::Timeout {
            target: ActorPath::root().child("worker"),
            timeout: Duration::from_secs(1),
        };
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_target_stopped_display() {
        let err = AskError::TargetStopped(ActorPath::root().child("worker"));
        assert!(err.to_string().contains("had already stopped"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AskError>();
    }
}
