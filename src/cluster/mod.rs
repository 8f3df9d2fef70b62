//! Cluster transport interface (spec.md §6): the seam a real multi-node
//! deployment plugs network delivery into, kept separate from the
//! single-node core it's optional for.
//!
//! Grounded in spec.md §6's "Cluster transport interface (IN)" —
//! `send(node_id, envelope)`, `membership_events → stream`,
//! `local_node_id` — and in the receptionist's `tokio::sync::watch`
//! idiom for the membership stream. [`sharding::ShardRegion`](crate::sharding::ShardRegion)
//! is generic over this trait so a real cluster deployment can supply its
//! own implementation without the region itself changing; the single-node
//! core only ever plugs in [`NullTransport`].

mod error;
mod null;

pub use error::ClusterError;
pub use null::NullTransport;

use async_trait::async_trait;
use tokio::sync::watch;

/// Delivers pre-serialized envelopes to other nodes and reports cluster
/// membership. Message serialization itself is a separate concern (spec.md
/// §6's codec interface) — `send` takes already-encoded bytes.
#[async_trait]
pub trait ClusterTransport: Send + Sync + 'static {
    /// This node's identifier, as it appears in `membership_events`.
    fn local_node_id(&self) -> &str;

    /// Send a pre-serialized envelope to `node_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if `node_id` is unknown or currently unreachable.
    async fn send(&self, node_id: &str, envelope: Vec<u8>) -> Result<(), ClusterError>;

    /// Current cluster membership, updated as nodes join or leave.
    fn membership_events(&self) -> watch::Receiver<Vec<String>>;
}
