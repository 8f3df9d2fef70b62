//! Error type for router dispatch.

// Layer 2: Third-party crate imports
use thiserror::Error;

/// Failure modes for [`crate::router::PoolRouter`]/[`crate::router::GroupRouter`]
/// (spec.md §4.6: "For an empty pool, messages are dead-lettered").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// No routee was available to receive the message; the caller is
    /// expected to dead-letter it rather than silently dropping it.
    #[error("router {0:?} has no routees available")]
    PoolEmpty(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_empty_display() {
        let err = RouterError::PoolEmpty("workers".to_string());
        assert!(err.to_string().contains("no routees"));
    }
}
