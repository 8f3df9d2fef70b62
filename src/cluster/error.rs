//! Errors reported by a [`super::ClusterTransport`] implementation.

use thiserror::Error;

/// Errors a [`super::ClusterTransport`] implementation may report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    /// `node_id` isn't a known cluster member.
    #[error("unknown cluster node: {0}")]
    UnknownNode(String),

    /// The transport can't currently reach `node_id` (e.g. partitioned).
    #[error("node unreachable: {0}")]
    Unreachable(String),
}
