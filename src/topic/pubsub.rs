//! `Topic<M>`: a named pub/sub channel (spec.md §4.7).

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use chrono::Utc;
use dashmap::DashMap;

// Layer 3: Internal module imports
use super::error::TopicError;
use crate::actor::ActorRef;
use crate::event_bus::EventBus;
use crate::message::Message;
use crate::monitoring::{DeadLetterEvent, Monitor, NoopMonitor, TopicEvent, TopicEventKind};
use crate::util::ActorPath;

/// A single named topic: a set of subscriber refs that every `publish`
/// fans a message out to.
///
/// Grounded in the receptionist's `DashMap<ActorPath, ActorRef<M>>`
/// subscriber-set idiom; a topic differs only in being identified by a
/// plain name instead of a typed `ServiceKey` and in optionally
/// self-stopping once its last subscriber leaves.
pub struct Topic<M, Mon = NoopMonitor<TopicEvent>>
where
    M: Message,
    Mon: Monitor<TopicEvent>,
{
    name: String,
    subscribers: DashMap<ActorPath, ActorRef<M>>,
    stop_when_empty: bool,
    stopped: AtomicBool,
    monitor: Mon,
    dead_letters: Option<EventBus>,
}

impl<M: Message> Topic<M, NoopMonitor<TopicEvent>> {
    /// Create a topic with no monitoring.
    pub fn new(name: impl Into<String>, stop_when_empty: bool) -> Self {
        Self::with_monitor(name, stop_when_empty, NoopMonitor::new())
    }
}

impl<M: Message, Mon: Monitor<TopicEvent>> Topic<M, Mon> {
    /// Create a topic reporting through `monitor`.
    pub fn with_monitor(name: impl Into<String>, stop_when_empty: bool, monitor: Mon) -> Self {
        Self {
            name: name.into(),
            subscribers: DashMap::new(),
            stop_when_empty,
            stopped: AtomicBool::new(false),
            monitor,
            dead_letters: None,
        }
    }

    /// Attach an [`EventBus`] that undeliverable publishes are reported to
    /// as [`DeadLetterEvent`]s (spec.md §6 "Dead-letter stream (OUT)").
    pub fn with_dead_letters(mut self, bus: EventBus) -> Self {
        self.dead_letters = Some(bus);
        self
    }

    /// The topic's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the topic has stopped (only possible with
    /// `stop_when_empty` set).
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    async fn record(&self, kind: TopicEventKind) {
        let _ = self
            .monitor
            .record(TopicEvent {
                timestamp: Utc::now(),
                topic_name: self.name.clone(),
                event_kind: kind,
            })
            .await;
    }

    /// Subscribe `actor_ref`. Idempotent: re-subscribing the same path only
    /// refreshes its ref.
    pub async fn subscribe(&self, actor_ref: ActorRef<M>) -> Result<(), TopicError> {
        if self.is_stopped() {
            return Err(TopicError::Stopped(self.name.clone()));
        }
        self.subscribers.insert(actor_ref.path().clone(), actor_ref);
        self.record(TopicEventKind::Subscribed).await;
        Ok(())
    }

    /// Unsubscribe the actor at `path`. Idempotent: unsubscribing an
    /// absent path is a no-op.
    pub async fn unsubscribe(&self, path: &ActorPath) {
        if self.subscribers.remove(path).is_some() {
            self.record(TopicEventKind::Unsubscribed).await;
            if self.stop_when_empty && self.subscribers.is_empty() {
                self.stopped.store(true, Ordering::Release);
                self.record(TopicEventKind::Stopped).await;
            }
        }
    }

    /// Publish `message` to every current subscriber.
    ///
    /// Lazily prunes subscribers whose mailbox has already closed before
    /// fanning out (spec.md §4.7 "the topic watches ref for
    /// auto-unsubscribe on termination", implemented here best-effort).
    pub async fn publish(&self, message: M) -> Result<(), TopicError> {
        if self.is_stopped() {
            return Err(TopicError::Stopped(self.name.clone()));
        }
        self.subscribers.retain(|_, r| !r.is_closed());

        let mut delivered = 0usize;
        for entry in self.subscribers.iter() {
            if let Err(err) = entry.value().tell(message.clone()).await {
                if let Some(bus) = &self.dead_letters {
                    bus.publish_dead_letter(DeadLetterEvent {
                        timestamp: Utc::now(),
                        message_type: M::MESSAGE_TYPE.to_string(),
                        recipient: Some(entry.key().to_string()),
                        reason: err.to_string(),
                    });
                }
                continue;
            }
            delivered += 1;
        }
        self.record(TopicEventKind::Published { subscriber_count: delivered }).await;

        if self.stop_when_empty && self.subscribers.is_empty() {
            self.stopped.store(true, Ordering::Release);
            self.record(TopicEventKind::Stopped).await;
        }
        Ok(())
    }

    /// Number of currently live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.retain(|_, r| !r.is_closed());
        self.subscribers.len()
    }
}

/// `Arc`-wrapped [`Topic`] handle, convenient for sharing one topic across
/// many publishers/subscribers without re-registering through
/// [`crate::topic::TopicRegistry`] each time.
pub type SharedTopic<M, Mon = NoopMonitor<TopicEvent>> = Arc<Topic<M, Mon>>;
