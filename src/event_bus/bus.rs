//! Process-wide event fan-out by event type (spec.md §4.9).

// Layer 1: Standard library imports
use std::any::{Any, TypeId};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use tokio::sync::broadcast;

// Layer 3: Internal module imports
use crate::monitoring::DeadLetterEvent;

/// Default per-event-type channel capacity; lagging subscribers miss the
/// oldest events rather than blocking publishers (spec.md §4.9's delivery
/// is "synchronous-or-asynchronous"; broadcast's bounded ring favors the
/// async, non-blocking case).
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Delivers arbitrary events to subscribers registered by event type.
///
/// Subscription is keyed purely by `TypeId` — "not type-safe beyond
/// runtime class check" per spec.md §4.9 — so one `EventBus` instance
/// serves every event type in the system rather than needing a
/// per-type bus. Grounded in the same type-erased `DashMap` idiom as
/// [`crate::receptionist::Receptionist`]/[`crate::topic::TopicRegistry`],
/// here storing a `tokio::sync::broadcast::Sender<E>` per type instead of
/// an application-specific entry, since fan-out-with-backlog is exactly
/// what `broadcast` already provides.
///
/// Ordering per event type matches publication order (a single
/// `broadcast::Sender` per type preserves FIFO across all its
/// subscribers); ordering across distinct event types is unspecified,
/// matching spec.md §4.9.
pub struct EventBus {
    channels: Arc<DashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    capacity: usize,
}

impl EventBus {
    /// Build an event bus with the default per-type channel capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Build an event bus whose per-type channels hold `capacity` events
    /// before the oldest is dropped for lagging subscribers.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(DashMap::new()),
            capacity,
        }
    }

    fn channel_for<E: Clone + Send + Sync + 'static>(&self) -> Arc<broadcast::Sender<E>> {
        let boxed = self
            .channels
            .entry(TypeId::of::<E>())
            .or_insert_with(|| {
                let (sender, _receiver) = broadcast::channel::<E>(self.capacity);
                Arc::new(sender) as Arc<dyn Any + Send + Sync>
            })
            .clone();
        match boxed.downcast::<broadcast::Sender<E>>() {
            Ok(sender) => sender,
            Err(_) => unreachable!("TypeId key always maps to broadcast::Sender<E>"),
        }
    }

    /// Subscribe to every future `E` published on this bus. The returned
    /// receiver does not see events published before it was created.
    pub fn subscribe<E: Clone + Send + Sync + 'static>(&self) -> broadcast::Receiver<E> {
        self.channel_for::<E>().subscribe()
    }

    /// Publish `event` to every current subscriber of type `E`. Silently a
    /// no-op if nobody is subscribed (mirrors `broadcast::Sender::send`'s
    /// `Err` on zero receivers).
    pub fn publish<E: Clone + Send + Sync + 'static>(&self, event: E) {
        let _ = self.channel_for::<E>().send(event);
    }

    /// Convenience subscription for the dead-letter stream (spec.md §6
    /// "Dead-letter stream (OUT)").
    pub fn subscribe_dead_letters(&self) -> broadcast::Receiver<DeadLetterEvent> {
        self.subscribe::<DeadLetterEvent>()
    }

    /// Convenience publish for an undeliverable envelope.
    pub fn publish_dead_letter(&self, event: DeadLetterEvent) {
        self.publish(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
            capacity: self.capacity,
        }
    }
}
