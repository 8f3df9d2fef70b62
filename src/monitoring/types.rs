//! Monitoring event types and configuration structures.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::traits::{EventSeverity, MonitoringEvent};
use crate::util::ActorId;

/// Configuration for monitoring behavior.
///
/// Controls how events are recorded, filtered, and stored in the monitor.
#[derive(Debug, Clone, Serialize)]
pub struct MonitoringConfig {
    /// Whether monitoring is enabled
    pub enabled: bool,

    /// Maximum number of events to keep in history
    pub max_history_size: usize,

    /// Minimum severity level to record (events below this are filtered)
    pub severity_filter: EventSeverity,

    /// Interval for snapshot generation (if using background snapshots)
    #[serde(with = "crate::util::duration_serde")]
    pub snapshot_interval: Duration,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_history_size: 1000,
            severity_filter: EventSeverity::Info,
            snapshot_interval: Duration::from_secs(60),
        }
    }
}

/// Snapshot of monitoring state at a point in time.
///
/// Provides queryable access to monitoring counters and recent event history.
#[derive(Debug, Clone, Serialize)]
pub struct MonitoringSnapshot<E: MonitoringEvent> {
    /// Timestamp when snapshot was taken
    pub timestamp: DateTime<Utc>,

    /// Total number of events recorded
    pub total_events: u64,

    /// Number of trace-level events
    pub trace_count: u64,

    /// Number of debug-level events
    pub debug_count: u64,

    /// Number of info-level events
    pub info_count: u64,

    /// Number of warning-level events
    pub warning_count: u64,

    /// Number of error-level events
    pub error_count: u64,

    /// Number of critical-level events
    pub critical_count: u64,

    /// Recent events (up to max_history_size)
    pub recent_events: Vec<E>,
}

// ============================================================================
// Supervision Events
// ============================================================================

/// Events related to supervisor operations and child management.
#[derive(Debug, Clone, Serialize)]
pub struct SupervisionEvent {
    /// Timestamp when event occurred (§3.2 chrono DateTime<Utc>)
    pub timestamp: DateTime<Utc>,

    /// ID of the supervisor
    pub supervisor_id: String,

    /// ID of the child actor (if applicable)
    pub child_id: Option<String>,

    /// Specific supervision event type
    pub event_kind: SupervisionEventKind,

    /// Additional event metadata
    pub metadata: HashMap<String, String>,
}

impl MonitoringEvent for SupervisionEvent {
    const EVENT_TYPE: &'static str = "supervision";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.event_kind {
            SupervisionEventKind::ChildStarted => EventSeverity::Info,
            SupervisionEventKind::ChildStopped => EventSeverity::Info,
            SupervisionEventKind::ChildFailed { .. } => EventSeverity::Error,
            SupervisionEventKind::ChildRestarted { .. } => EventSeverity::Warning,
            SupervisionEventKind::RestartLimitExceeded { .. } => EventSeverity::Critical,
            SupervisionEventKind::StrategyApplied { .. } => EventSeverity::Info,
        }
    }
}

/// Specific types of supervision events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum SupervisionEventKind {
    /// Child actor successfully started
    ChildStarted,

    /// Child actor gracefully stopped
    ChildStopped,

    /// Child actor failed with error
    ChildFailed {
        /// Error message
        error: String,
        /// Current restart count
        restart_count: u32,
    },

    /// Child actor was restarted after failure
    ChildRestarted {
        /// Restart count after this restart
        restart_count: u32,
    },

    /// Restart rate limit exceeded
    RestartLimitExceeded {
        /// Number of restarts attempted
        restart_count: u32,
        /// Time window for restart limit
        #[serde(with = "crate::util::duration_serde")]
        window: Duration,
    },

    /// Supervision strategy was applied
    StrategyApplied {
        /// Name of the strategy (OneForOne, OneForAll, RestForOne)
        strategy: String,
        /// Number of children affected
        affected_count: usize,
    },
}

// ============================================================================
// Actor Events
// ============================================================================

/// Events related to actor lifecycle and message processing.
#[derive(Debug, Clone, Serialize)]
pub struct ActorEvent {
    /// Timestamp when event occurred (§3.2 chrono DateTime<Utc>)
    pub timestamp: DateTime<Utc>,

    /// ID of the actor
    pub actor_id: ActorId,

    /// Specific actor event type
    pub event_kind: ActorEventKind,

    /// Additional event metadata
    pub metadata: HashMap<String, String>,
}

impl MonitoringEvent for ActorEvent {
    const EVENT_TYPE: &'static str = "actor";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.event_kind {
            ActorEventKind::Spawned => EventSeverity::Debug,
            ActorEventKind::Started => EventSeverity::Info,
            ActorEventKind::MessageReceived { .. } => EventSeverity::Trace,
            ActorEventKind::MessageProcessed { .. } => EventSeverity::Trace,
            ActorEventKind::ErrorOccurred { .. } => EventSeverity::Error,
            ActorEventKind::Stopped => EventSeverity::Info,
        }
    }
}

/// Specific types of actor events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ActorEventKind {
    /// Actor was spawned
    Spawned,

    /// Actor started execution
    Started,

    /// Actor received a message
    MessageReceived {
        /// Message type name
        message_type: String,
    },

    /// Actor finished processing a message
    MessageProcessed {
        /// Message type name
        message_type: String,
        /// Processing duration in microseconds
        duration_micros: u64,
    },

    /// Error occurred during actor execution
    ErrorOccurred {
        /// Error message
        error: String,
    },

    /// Actor stopped execution
    Stopped,
}

// ============================================================================
// System Events
// ============================================================================

/// Events related to actor system operations.
#[derive(Debug, Clone, Serialize)]
pub struct SystemEvent {
    /// Timestamp when event occurred (§3.2 chrono DateTime<Utc>)
    pub timestamp: DateTime<Utc>,

    /// Specific system event type
    pub event_kind: SystemEventKind,

    /// Additional event metadata
    pub metadata: HashMap<String, String>,
}

impl MonitoringEvent for SystemEvent {
    const EVENT_TYPE: &'static str = "system";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.event_kind {
            SystemEventKind::Started => EventSeverity::Info,
            SystemEventKind::Shutdown => EventSeverity::Info,
            SystemEventKind::ActorRegistered { .. } => EventSeverity::Debug,
            SystemEventKind::ActorDeregistered { .. } => EventSeverity::Debug,
            SystemEventKind::ConfigurationChanged => EventSeverity::Info,
        }
    }
}

/// Specific types of system events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum SystemEventKind {
    /// Actor system started
    Started,

    /// Actor system shutting down
    Shutdown,

    /// Actor registered with the system
    ActorRegistered {
        /// ID of the registered actor
        actor_id: ActorId,
    },

    /// Actor deregistered from the system
    ActorDeregistered {
        /// ID of the deregistered actor
        actor_id: ActorId,
    },

    /// System configuration was changed
    ConfigurationChanged,
}

// ============================================================================
// Broker Events
// ============================================================================

/// Events related to message broker operations.
#[derive(Debug, Clone, Serialize)]
pub struct BrokerEvent {
    /// Timestamp when event occurred (§3.2 chrono DateTime<Utc>)
    pub timestamp: DateTime<Utc>,

    /// Specific broker event type
    pub event_kind: BrokerEventKind,

    /// Additional event metadata
    pub metadata: HashMap<String, String>,
}

impl MonitoringEvent for BrokerEvent {
    const EVENT_TYPE: &'static str = "broker";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.event_kind {
            BrokerEventKind::MessagePublished { .. } => EventSeverity::Trace,
            BrokerEventKind::MessageRouted { .. } => EventSeverity::Trace,
            BrokerEventKind::SubscriberAdded { .. } => EventSeverity::Debug,
            BrokerEventKind::SubscriberRemoved { .. } => EventSeverity::Debug,
            BrokerEventKind::RoutingFailed { .. } => EventSeverity::Error,
            BrokerEventKind::DeadLetter { .. } => EventSeverity::Warning,
        }
    }
}

/// Specific types of broker events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum BrokerEventKind {
    /// Message published to broker
    MessagePublished {
        /// Message type name
        message_type: String,
    },

    /// Message successfully routed to actor
    MessageRouted {
        /// Destination actor ID
        actor_id: ActorId,
        /// Message type name
        message_type: String,
    },

    /// New subscriber added
    SubscriberAdded {
        /// Subscriber identifier
        subscriber_id: String,
    },

    /// Subscriber removed
    SubscriberRemoved {
        /// Subscriber identifier
        subscriber_id: String,
    },

    /// Failed to route message
    RoutingFailed {
        /// Target actor ID
        actor_id: ActorId,
        /// Failure reason
        reason: String,
    },

    /// Message sent to dead letter queue
    DeadLetter {
        /// Message type name
        message_type: String,
        /// Reason for dead lettering
        reason: String,
    },
}

// ============================================================================
// Mailbox Events
// ============================================================================

/// Events related to mailbox operations and backpressure.
#[derive(Debug, Clone, Serialize)]
pub struct MailboxEvent {
    /// Timestamp when event occurred (§3.2 chrono DateTime<Utc>)
    pub timestamp: DateTime<Utc>,

    /// ID of the actor owning the mailbox
    pub actor_id: ActorId,

    /// Specific mailbox event type
    pub event_kind: MailboxEventKind,

    /// Additional event metadata
    pub metadata: HashMap<String, String>,
}

impl MonitoringEvent for MailboxEvent {
    const EVENT_TYPE: &'static str = "mailbox";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.event_kind {
            MailboxEventKind::MessageEnqueued { .. } => EventSeverity::Trace,
            MailboxEventKind::MessageDequeued { .. } => EventSeverity::Trace,
            MailboxEventKind::BackpressureApplied { .. } => EventSeverity::Warning,
            MailboxEventKind::CapacityReached => EventSeverity::Warning,
            MailboxEventKind::MessageDropped { .. } => EventSeverity::Error,
        }
    }
}

/// Specific types of mailbox events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum MailboxEventKind {
    /// Message enqueued in mailbox
    MessageEnqueued {
        /// Current queue size
        queue_size: usize,
    },

    /// Message dequeued from mailbox
    MessageDequeued {
        /// Remaining queue size
        queue_size: usize,
    },

    /// Backpressure strategy applied
    BackpressureApplied {
        /// Strategy applied (Block, Drop, Error)
        strategy: String,
    },

    /// Mailbox capacity reached
    CapacityReached,

    /// Message dropped due to backpressure
    MessageDropped {
        /// Reason for dropping
        reason: String,
    },
}

// ============================================================================
// Receptionist Events
// ============================================================================

/// Events related to receptionist service-key registration.
#[derive(Debug, Clone, Serialize)]
pub struct ReceptionistEvent {
    /// Timestamp when event occurred (§3.2 chrono DateTime<Utc>)
    pub timestamp: DateTime<Utc>,
    /// The service key's string id.
    pub key_id: String,
    /// Specific receptionist event type.
    pub event_kind: ReceptionistEventKind,
}

impl MonitoringEvent for ReceptionistEvent {
    const EVENT_TYPE: &'static str = "receptionist";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.event_kind {
            ReceptionistEventKind::Registered => EventSeverity::Debug,
            ReceptionistEventKind::Deregistered => EventSeverity::Debug,
            ReceptionistEventKind::ListingUpdated { size } if *size == 0 => EventSeverity::Info,
            ReceptionistEventKind::ListingUpdated { .. } => EventSeverity::Trace,
        }
    }
}

/// Specific types of receptionist events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ReceptionistEventKind {
    /// An actor was registered under a service key.
    Registered,
    /// An actor was deregistered (or its cell terminated).
    Deregistered,
    /// A `Listing` subscription stream delivered an updated listing.
    ListingUpdated {
        /// Number of actors now registered under the key.
        size: usize,
    },
}

// ============================================================================
// Router Events
// ============================================================================

/// Events related to router dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct RouterEvent {
    /// Timestamp when event occurred (§3.2 chrono DateTime<Utc>)
    pub timestamp: DateTime<Utc>,
    /// Name of the router, for correlating events across a run.
    pub router_name: String,
    /// Specific router event type.
    pub event_kind: RouterEventKind,
}

impl MonitoringEvent for RouterEvent {
    const EVENT_TYPE: &'static str = "router";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.event_kind {
            RouterEventKind::RouteeAdded => EventSeverity::Debug,
            RouterEventKind::RouteeRemoved => EventSeverity::Debug,
            RouterEventKind::PoolExhausted => EventSeverity::Error,
            RouterEventKind::MessageRouted { .. } => EventSeverity::Trace,
        }
    }
}

/// Specific types of router events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum RouterEventKind {
    /// A routee joined the pool/group.
    RouteeAdded,
    /// A routee left the pool/group.
    RouteeRemoved,
    /// A message arrived with no routees available.
    PoolExhausted,
    /// A message was routed to a routee.
    MessageRouted {
        /// Index of the chosen routee within the pool.
        routee_index: usize,
    },
}

// ============================================================================
// Topic Events
// ============================================================================

/// Events related to topic pub/sub.
#[derive(Debug, Clone, Serialize)]
pub struct TopicEvent {
    /// Timestamp when event occurred (§3.2 chrono DateTime<Utc>)
    pub timestamp: DateTime<Utc>,
    /// The topic's name.
    pub topic_name: String,
    /// Specific topic event type.
    pub event_kind: TopicEventKind,
}

impl MonitoringEvent for TopicEvent {
    const EVENT_TYPE: &'static str = "topic";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.event_kind {
            TopicEventKind::Subscribed => EventSeverity::Debug,
            TopicEventKind::Unsubscribed => EventSeverity::Debug,
            TopicEventKind::Published { .. } => EventSeverity::Trace,
            TopicEventKind::Stopped => EventSeverity::Info,
        }
    }
}

/// Specific types of topic events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum TopicEventKind {
    /// An actor subscribed to the topic.
    Subscribed,
    /// An actor unsubscribed from the topic.
    Unsubscribed,
    /// A message was fanned out to subscribers.
    Published {
        /// Number of subscribers the message was delivered to.
        subscriber_count: usize,
    },
    /// The topic stopped (e.g. its last subscriber left and
    /// `topic_stop_when_empty` was set).
    Stopped,
}

// ============================================================================
// Sharding Events
// ============================================================================

/// Events related to entity sharding.
#[derive(Debug, Clone, Serialize)]
pub struct ShardingEvent {
    /// Timestamp when event occurred (§3.2 chrono DateTime<Utc>)
    pub timestamp: DateTime<Utc>,
    /// Name of the entity type this shard region serves.
    pub entity_type: String,
    /// Specific sharding event type.
    pub event_kind: ShardingEventKind,
}

impl MonitoringEvent for ShardingEvent {
    const EVENT_TYPE: &'static str = "sharding";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.event_kind {
            ShardingEventKind::EntityStarted { .. } => EventSeverity::Debug,
            ShardingEventKind::EntityPassivated { .. } => EventSeverity::Debug,
            ShardingEventKind::ShardRebalanced { .. } => EventSeverity::Info,
            ShardingEventKind::BufferOverflow { .. } => EventSeverity::Error,
        }
    }
}

/// Specific types of sharding events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ShardingEventKind {
    /// A new entity actor was started on this node.
    EntityStarted {
        /// The entity's id within its entity type.
        entity_id: String,
    },
    /// An idle entity was passivated (stopped to free resources).
    EntityPassivated {
        /// The entity's id within its entity type.
        entity_id: String,
    },
    /// A shard moved from one region to another.
    ShardRebalanced {
        /// The shard id that moved.
        shard_id: String,
    },
    /// A shard's startup buffer exceeded its configured capacity.
    BufferOverflow {
        /// The shard id whose buffer overflowed.
        shard_id: String,
    },
}

// ============================================================================
// Ask Events
// ============================================================================

/// Events related to the ask (request/reply) pattern.
#[derive(Debug, Clone, Serialize)]
pub struct AskEvent {
    /// Timestamp when event occurred (§3.2 chrono DateTime<Utc>)
    pub timestamp: DateTime<Utc>,
    /// Specific ask event type.
    pub event_kind: AskEventKind,
}

impl MonitoringEvent for AskEvent {
    const EVENT_TYPE: &'static str = "ask";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        match &self.event_kind {
            AskEventKind::Completed => EventSeverity::Trace,
            AskEventKind::TimedOut => EventSeverity::Warning,
            AskEventKind::TargetStopped => EventSeverity::Warning,
        }
    }
}

/// Specific types of ask events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum AskEventKind {
    /// The reply arrived before the timeout.
    Completed,
    /// No reply arrived within the configured timeout.
    TimedOut,
    /// The target actor stopped before replying.
    TargetStopped,
}

// ============================================================================
// Dead Letter Events
// ============================================================================

/// A message that could not be delivered to its intended recipient.
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetterEvent {
    /// Timestamp when the message was dead-lettered (§3.2 chrono DateTime<Utc>)
    pub timestamp: DateTime<Utc>,
    /// Type name of the message that was dropped.
    pub message_type: String,
    /// Textual description of the intended recipient, if known.
    pub recipient: Option<String>,
    /// Why the message could not be delivered.
    pub reason: String,
}

impl MonitoringEvent for DeadLetterEvent {
    const EVENT_TYPE: &'static str = "dead_letter";

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn severity(&self) -> EventSeverity {
        EventSeverity::Warning
    }
}
