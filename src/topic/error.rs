//! Error type for topic operations.

// Layer 2: Third-party crate imports
use thiserror::Error;

/// Failure modes for [`crate::topic::Topic`]/[`crate::topic::TopicRegistry`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopicError {
    /// The topic has already stopped (its last subscriber left and
    /// `topic.stop_when_empty` was set).
    #[error("topic {0:?} has stopped")]
    Stopped(String),
}
