//! `TopicRegistry`: system-wide `name -> Topic<M>` lookup with idempotent creation.

// Layer 1: Standard library imports
use std::any::{Any, TypeId};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;

// Layer 3: Internal module imports
use super::pubsub::Topic;
use crate::message::Message;
use crate::monitoring::{Monitor, NoopMonitor, TopicEvent};
use crate::system::SystemConfig;

/// Process-wide (well, system-wide) registry of named topics, keyed by
/// `(TypeId, name)` so two distinct message types may each own a topic
/// called e.g. `"events"` without colliding.
///
/// Same type-erasure idiom as [`crate::receptionist::Receptionist`]: one
/// non-generic `DashMap` indexing arbitrarily many `Topic<M>` instances,
/// downcast safety guaranteed by construction from the caller's own `M`.
pub struct TopicRegistry<Mon = NoopMonitor<TopicEvent>>
where
    Mon: Monitor<TopicEvent>,
{
    topics: DashMap<(TypeId, String), Arc<dyn Any + Send + Sync>>,
    stop_when_empty_default: bool,
    monitor: Mon,
}

impl TopicRegistry<NoopMonitor<TopicEvent>> {
    /// Build a registry using `config.topic_stop_when_empty` as the default
    /// for topics created without an explicit override.
    pub fn new(config: &SystemConfig) -> Self {
        Self::with_monitor(config, NoopMonitor::new())
    }
}

impl<Mon: Monitor<TopicEvent>> TopicRegistry<Mon> {
    /// Build a registry reporting through `monitor`.
    pub fn with_monitor(config: &SystemConfig, monitor: Mon) -> Self {
        Self {
            topics: DashMap::new(),
            stop_when_empty_default: config.topic_stop_when_empty,
            monitor,
        }
    }

    /// Get the single live topic named `name` for message type `M`,
    /// creating it on first use (spec.md §4.7 `get_or_create(name)`).
    pub fn get_or_create<M: Message>(&self, name: &str) -> Arc<Topic<M, Mon>> {
        let composite = (TypeId::of::<M>(), name.to_string());
        let boxed = self
            .topics
            .entry(composite)
            .or_insert_with(|| {
                Arc::new(Topic::with_monitor(
                    name.to_string(),
                    self.stop_when_empty_default,
                    self.monitor.clone(),
                )) as Arc<dyn Any + Send + Sync>
            })
            .clone();
        match boxed.downcast::<Topic<M, Mon>>() {
            Ok(topic) => topic,
            Err(_) => unreachable!("(TypeId, name) composite key always maps to Topic<M, Mon>"),
        }
    }
}
