//! `ShardRegion<M>`: lazy-spawning, passivating home for one entity type's
//! local shards (spec.md §4.8).

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

// Layer 3: Internal module imports
use super::error::ShardingError;
use super::extractor::{EntityFactory, ShardEnvelope};
use crate::actor::ActorRef;
use crate::cluster::{ClusterTransport, NullTransport};
use crate::event_bus::EventBus;
use crate::message::Message;
use crate::monitoring::{DeadLetterEvent, Monitor, NoopMonitor, ShardingEvent, ShardingEventKind};
use crate::system::SystemConfig;

/// What happens to a new message when an entity's startup buffer is full
/// (spec.md §4.8 "overflow drops-oldest or dead-letters per policy").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferOverflowPolicy {
    /// Drop the oldest buffered message to make room.
    DropOldest,
    /// Reject the new message; the caller treats it as a dead letter.
    DeadLetter,
}

struct EntityState<M> {
    actor_ref: ActorRef<M>,
    last_activity: DateTime<Utc>,
}

/// Owns the locally-hosted shards of one entity type.
///
/// For an incoming message: ensure the addressed entity exists (lazily
/// spawning it via `F` on first use or after passivation), buffering
/// concurrent arrivals while the spawn is in flight, then forward.
///
/// Grounded in the receptionist's `DashMap<_, ActorRef<M>>` liveness
/// bookkeeping; `ShardRegion` adds per-entity buffering (a second DashMap,
/// keyed the same way) and activity timestamps for passivation, since a
/// shard has to account for entities that don't exist *yet* as well as
/// ones that have stopped.
///
/// In this single-node core every shard is local, so `transport` is never
/// consulted by `deliver` — it's held so a cluster-ready build can check
/// shard ownership against `transport.membership_events()` and forward via
/// `transport.send(..)` on the "else forward to remote ShardRegion" branch
/// (spec.md §4.8 step 2) without changing `ShardRegion`'s shape.
pub struct ShardRegion<M, F, Mon = NoopMonitor<ShardingEvent>, T = NullTransport>
where
    M: ShardEnvelope,
    F: EntityFactory<M>,
    Mon: Monitor<ShardingEvent>,
    T: ClusterTransport,
{
    entity_type: String,
    entities: DashMap<String, EntityState<M>>,
    spawn_locks: DashMap<String, Arc<Mutex<()>>>,
    buffers: DashMap<String, VecDeque<M>>,
    factory: F,
    passivation_idle: Duration,
    buffer_size: usize,
    overflow_policy: BufferOverflowPolicy,
    monitor: Mon,
    transport: T,
    dead_letters: Option<EventBus>,
}

impl<M, F> ShardRegion<M, F, NoopMonitor<ShardingEvent>, NullTransport>
where
    M: ShardEnvelope,
    F: EntityFactory<M>,
{
    /// Build a shard region for `entity_type`, reading `passivation_idle`
    /// and `buffer_size` from `config`, with no monitoring, drop-oldest
    /// overflow, and the single-node [`NullTransport`].
    pub fn new(entity_type: impl Into<String>, factory: F, config: &SystemConfig) -> Self {
        Self::with_monitor(
            entity_type,
            factory,
            config,
            BufferOverflowPolicy::DropOldest,
            NoopMonitor::new(),
        )
    }
}

impl<M, F, Mon> ShardRegion<M, F, Mon, NullTransport>
where
    M: ShardEnvelope,
    F: EntityFactory<M>,
    Mon: Monitor<ShardingEvent>,
{
    /// Build a shard region reporting through `monitor`, with the
    /// single-node [`NullTransport`].
    pub fn with_monitor(
        entity_type: impl Into<String>,
        factory: F,
        config: &SystemConfig,
        overflow_policy: BufferOverflowPolicy,
        monitor: Mon,
    ) -> Self {
        Self::with_transport(
            entity_type,
            factory,
            config,
            overflow_policy,
            monitor,
            NullTransport::default(),
        )
    }
}

impl<M, F, Mon, T> ShardRegion<M, F, Mon, T>
where
    M: ShardEnvelope,
    F: EntityFactory<M>,
    Mon: Monitor<ShardingEvent>,
    T: ClusterTransport,
{
    /// Build a shard region reporting through `monitor` and forwarding
    /// non-local shards (once any exist) through `transport`.
    pub fn with_transport(
        entity_type: impl Into<String>,
        factory: F,
        config: &SystemConfig,
        overflow_policy: BufferOverflowPolicy,
        monitor: Mon,
        transport: T,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entities: DashMap::new(),
            spawn_locks: DashMap::new(),
            buffers: DashMap::new(),
            factory,
            passivation_idle: config.sharding_passivation_idle,
            buffer_size: config.sharding_buffer_size,
            overflow_policy,
            monitor,
            transport,
            dead_letters: None,
        }
    }

    /// Attach an [`EventBus`] that undeliverable entity sends are reported
    /// to as [`DeadLetterEvent`]s (spec.md §6 "Dead-letter stream (OUT)").
    pub fn with_dead_letters(mut self, bus: EventBus) -> Self {
        self.dead_letters = Some(bus);
        self
    }

    /// The cluster transport this region would forward non-local shards
    /// through. Exposed for deployments that need `local_node_id` or
    /// `membership_events` to decide ownership upstream of `deliver`.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn report_dead_letter(&self, entity_id: &str, reason: String) {
        if let Some(bus) = &self.dead_letters {
            bus.publish_dead_letter(DeadLetterEvent {
                timestamp: Utc::now(),
                message_type: M::MESSAGE_TYPE.to_string(),
                recipient: Some(format!("{}/{}", self.entity_type, entity_id)),
                reason,
            });
        }
    }

    async fn record(&self, kind: ShardingEventKind) {
        let _ = self
            .monitor
            .record(ShardingEvent {
                timestamp: Utc::now(),
                entity_type: self.entity_type.clone(),
                event_kind: kind,
            })
            .await;
    }

    /// Number of currently-live (non-passivated) local entities.
    pub fn live_entity_count(&self) -> usize {
        self.entities.len()
    }

    fn buffer_message(&self, entity_id: &str, message: M) -> Result<(), ShardingError> {
        let mut buffer = self.buffers.entry(entity_id.to_string()).or_default();
        if buffer.len() >= self.buffer_size {
            match self.overflow_policy {
                BufferOverflowPolicy::DropOldest => {
                    buffer.pop_front();
                }
                BufferOverflowPolicy::DeadLetter => {
                    return Err(ShardingError::BufferOverflow {
                        entity_id: entity_id.to_string(),
                    });
                }
            }
        }
        buffer.push_back(message);
        Ok(())
    }

    /// Route `message` to its entity, lazily spawning it if absent.
    ///
    /// Messages that arrive for an entity currently being spawned are
    /// buffered (bounded by `buffer_size`, see [`BufferOverflowPolicy`])
    /// and delivered in arrival order once the spawn completes.
    pub async fn deliver(&self, message: M) -> Result<(), ShardingError> {
        let shard_id = message.shard_id();
        let entity_id = message.entity_id();

        if let Some(mut state) = self.entities.get_mut(&entity_id) {
            state.last_activity = Utc::now();
            if let Err(err) = state.actor_ref.tell(message).await {
                self.report_dead_letter(&entity_id, err.to_string()).await;
            }
            return Ok(());
        }

        let lock = self
            .spawn_locks
            .entry(entity_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Re-check: another task may have finished spawning while we waited.
        if let Some(mut state) = self.entities.get_mut(&entity_id) {
            state.last_activity = Utc::now();
            if let Err(err) = state.actor_ref.tell(message).await {
                self.report_dead_letter(&entity_id, err.to_string()).await;
            }
            return Ok(());
        }

        self.buffer_message(&entity_id, message)?;
        if let Some(count) = self.buffers.get(&entity_id).map(|b| b.len()) {
            if count == self.buffer_size {
                self.record(ShardingEventKind::BufferOverflow {
                    shard_id: shard_id.clone(),
                })
                .await;
            }
        }

        let actor_ref = self.factory.spawn(&entity_id).await;
        self.record(ShardingEventKind::EntityStarted {
            entity_id: entity_id.clone(),
        })
        .await;

        if let Some((_, mut buffered)) = self.buffers.remove(&entity_id) {
            while let Some(buffered_message) = buffered.pop_front() {
                if let Err(err) = actor_ref.tell(buffered_message).await {
                    self.report_dead_letter(&entity_id, err.to_string()).await;
                }
            }
        }

        self.entities.insert(
            entity_id,
            EntityState {
                actor_ref,
                last_activity: Utc::now(),
            },
        );
        self.spawn_locks.remove(&entity_id);
        Ok(())
    }

    /// Stop every entity that has been idle at least `passivation_idle`
    /// (spec.md §4.8 "shard stops it after an idle window").
    ///
    /// Stopping here means dropping the region's own `ActorRef` clone:
    /// since the entity's spawned task holds only the mailbox receiver,
    /// losing the last sender closes its mailbox and the task's receive
    /// loop ends on its own. The next message addressed to the same
    /// entity id lazily respawns it via `deliver`.
    pub async fn passivate_idle(&self) {
        let now = Utc::now();
        let idle: Vec<String> = self
            .entities
            .iter()
            .filter(|entry| {
                now.signed_duration_since(entry.value().last_activity)
                    .to_std()
                    .map(|elapsed| elapsed >= self.passivation_idle)
                    .unwrap_or(false)
            })
            .map(|entry| entry.key().clone())
            .collect();

        for entity_id in idle {
            self.entities.remove(&entity_id);
            self.spawn_locks.remove(&entity_id);
            self.record(ShardingEventKind::EntityPassivated { entity_id }).await;
        }
    }
}
