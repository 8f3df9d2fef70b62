//! [`NullTransport`]: the single-node core's stand-in `ClusterTransport`.

use async_trait::async_trait;
use tokio::sync::watch;

use super::{ClusterError, ClusterTransport};

/// A transport for a cluster of exactly one node.
///
/// `send` always fails with [`ClusterError::UnknownNode`] since there is
/// never a remote peer to reach; `membership_events` reports a fixed,
/// single-member view. This is what every `ShardRegion` uses unless a real
/// deployment supplies its own `ClusterTransport`.
pub struct NullTransport {
    local_node_id: String,
    membership_rx: watch::Receiver<Vec<String>>,
    // Kept alive so `membership_rx.clone()` subscribers keep seeing the
    // single-member view rather than the channel closing.
    _membership_tx: watch::Sender<Vec<String>>,
}

impl NullTransport {
    /// Build a single-node transport identifying itself as `local_node_id`.
    pub fn new(local_node_id: impl Into<String>) -> Self {
        let local_node_id = local_node_id.into();
        let (tx, rx) = watch::channel(vec![local_node_id.clone()]);
        Self {
            local_node_id,
            membership_rx: rx,
            _membership_tx: tx,
        }
    }
}

impl Default for NullTransport {
    fn default() -> Self {
        Self::new("local")
    }
}

#[async_trait]
impl ClusterTransport for NullTransport {
    fn local_node_id(&self) -> &str {
        &self.local_node_id
    }

    async fn send(&self, node_id: &str, _envelope: Vec<u8>) -> Result<(), ClusterError> {
        Err(ClusterError::UnknownNode(node_id.to_string()))
    }

    fn membership_events(&self) -> watch::Receiver<Vec<String>> {
        self.membership_rx.clone()
    }
}
