//! Message extraction and entity spawning for sharded entity types (spec.md §4.8).

// Layer 2: Third-party crate imports
use async_trait::async_trait;

// Layer 3: Internal module imports
use crate::actor::ActorRef;
use crate::message::Message;

/// A message that carries its own `(shard_id, entity_id)` routing
/// information (spec.md §4.8's extractor `env -> (shard_id, entity_id,
/// payload)`, collapsed onto the message itself the same way
/// [`crate::router::RoutingKey`] does for consistent-hash routing, rather
/// than a separate extractor object — the whole message is forwarded to
/// the entity as its payload, so there is nothing left for a standalone
/// extractor to unwrap).
pub trait ShardEnvelope: Message {
    /// The shard this message's entity lives on. In the single-node core
    /// every shard is local; the id still matters for rebalance-readiness
    /// and for `ShardingEvent`s.
    fn shard_id(&self) -> String;

    /// The entity within `shard_id` this message is addressed to.
    fn entity_id(&self) -> String;
}

/// Spawns the entity actor for a given entity id, on first message or
/// after passivation (spec.md §4.8 "entity behavior factory").
///
/// A trait rather than a boxed closure: each entity type has exactly one
/// factory, known at the `ShardRegion`'s construction, so a generic
/// parameter keeps spawning on the zero-cost path used throughout this
/// crate instead of reaching for `dyn Fn`.
#[async_trait]
pub trait EntityFactory<M: Message>: Send + Sync + 'static {
    /// Spawn (or otherwise obtain) a running actor serving `entity_id`.
    async fn spawn(&self, entity_id: &str) -> ActorRef<M>;
}
