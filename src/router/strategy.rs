//! Routing strategies and the consistent-hash ring (spec.md §4.6).

// Layer 1: Standard library imports
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

// Layer 3: Internal module imports
use crate::message::Message;

/// Opt-in trait for messages routable by consistent hash.
///
/// Kept separate from [`Message`] rather than folded into it: most messages
/// never go through a consistent-hash router, and a mandatory
/// `routing_key` on every message would force an arbitrary choice (e.g.
/// `MESSAGE_TYPE`) on types that have no natural key.
pub trait RoutingKey: Message {
    /// The key used to place this message on the hash ring.
    fn routing_key(&self) -> &str;
}

/// How a [`crate::router::PoolRouter`]/[`crate::router::GroupRouter`] picks
/// a routee for an incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterStrategy {
    /// `next index (i+1) mod n`, with `i` local to the router.
    RoundRobin,
    /// Uniform independent selection.
    Random,
    /// Deliver to every current routee.
    Broadcast,
    /// Route by a hash ring with `virtual_nodes` per routee (default 40).
    ConsistentHash {
        /// Virtual nodes placed on the ring per routee.
        virtual_nodes: usize,
    },
}

impl RouterStrategy {
    /// Consistent hash with the spec's default of 40 virtual nodes per routee.
    pub fn consistent_hash_default() -> Self {
        Self::ConsistentHash { virtual_nodes: 40 }
    }
}

fn hash_str(s: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

/// A hash ring mapping `(hash, virtual node) -> routee index`, rebuilt
/// whenever the routee set changes.
///
/// On membership change only the ring positions adjacent to the
/// inserted/removed routee's virtual nodes change owner, so keys migrate
/// only between neighbors (spec.md §4.6, P8).
#[derive(Debug, Clone, Default)]
pub struct HashRing {
    // Sorted by (hash, routee id) for a deterministic tie-break.
    positions: Vec<(u64, usize)>,
}

impl HashRing {
    /// Build a ring for `routee_ids` (e.g. worker actor paths), each placed
    /// at `virtual_nodes` positions.
    pub fn build(routee_ids: &[String], virtual_nodes: usize) -> Self {
        let mut positions = Vec::with_capacity(routee_ids.len() * virtual_nodes);
        for (index, id) in routee_ids.iter().enumerate() {
            for vnode in 0..virtual_nodes {
                let hash = hash_str(&format!("{id}#{vnode}"));
                positions.push((hash, index));
            }
        }
        positions.sort_by(|(hash_a, index_a), (hash_b, index_b)| {
            hash_a
                .cmp(hash_b)
                .then_with(|| routee_ids[*index_a].cmp(&routee_ids[*index_b]))
        });
        Self { positions }
    }

    /// The routee index owning `key`'s hash: the first ring position at or
    /// clockwise from `hash(key)`, wrapping to the first position past the
    /// maximum hash.
    pub fn route(&self, key: &str) -> Option<usize> {
        if self.positions.is_empty() {
            return None;
        }
        let key_hash = hash_str(key);
        match self.positions.binary_search_by(|(hash, _)| hash.cmp(&key_hash)) {
            Ok(i) => Some(self.positions[i].1),
            Err(i) if i == self.positions.len() => Some(self.positions[0].1),
            Err(i) => Some(self.positions[i].1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_ring_routes_nothing() {
        let ring = HashRing::build(&[], 40);
        assert_eq!(ring.route("anything"), None);
    }

    #[test]
    fn test_fixed_pool_same_key_routes_to_same_worker() {
        let workers = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let ring = HashRing::build(&workers, 40);
        let first = ring.route("order-42");
        for _ in 0..10 {
            assert_eq!(ring.route("order-42"), first);
        }
    }

    #[test]
    fn test_different_keys_spread_across_workers() {
        let workers = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let ring = HashRing::build(&workers, 40);
        let mut hit = [0usize; 3];
        for i in 0..300 {
            let idx = ring.route(&format!("key-{i}")).unwrap();
            hit[idx] += 1;
        }
        assert!(hit.iter().all(|&count| count > 0));
    }

    #[test]
    fn test_adding_a_worker_only_moves_a_fraction_of_keys() {
        let before = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let ring_before = HashRing::build(&before, 40);

        let after = vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()];
        let ring_after = HashRing::build(&after, 40);

        let total = 1000;
        let mut moved = 0;
        for i in 0..total {
            let key = format!("key-{i}");
            let before_owner = before[ring_before.route(&key).unwrap()].clone();
            let after_owner = after[ring_after.route(&key).unwrap()].clone();
            if before_owner != after_owner {
                moved += 1;
            }
        }
        // Expect roughly 1/4 of keys to move to the new worker, generously bounded.
        assert!(moved < total * 3 / 4);
    }
}
