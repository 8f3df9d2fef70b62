//! Error type for receptionist operations.

// Layer 2: Third-party crate imports
use thiserror::Error;

/// Failure modes for [`crate::receptionist::Receptionist`] operations
/// (spec.md §4.5, §7).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReceptionistError {
    /// The receptionist has been shut down; no further registrations are
    /// accepted (spec.md §7 `ShutdownInProgress`).
    #[error("receptionist is shutting down, rejecting operations on key {0:?}")]
    ShutdownInProgress(String),
}
