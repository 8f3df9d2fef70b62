//! Group router: routes to the current receptionist listing for a service key.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicUsize, Ordering};

// Layer 2: Third-party crate imports
use chrono::Utc;
use rand::Rng;
use tokio::sync::watch;

// Layer 3: Internal module imports
use super::error::RouterError;
use super::strategy::{HashRing, RoutingKey, RouterStrategy};
use crate::actor::ActorRef;
use crate::event_bus::EventBus;
use crate::message::Message;
use crate::monitoring::DeadLetterEvent;
use crate::receptionist::{Listing, Receptionist, ServiceKey};

/// Routes to whatever is currently registered under a [`ServiceKey`],
/// atomically swapping its routing set on every listing update
/// (spec.md §4.6 "group router").
///
/// Grounded in the same watch-channel subscription [`Receptionist`]
/// exposes; `GroupRouter` simply layers [`RouterStrategy`] selection on top
/// of `listing.refs()` instead of a caller-managed `Vec<ActorRef<M>>`.
pub struct GroupRouter<M: RoutingKey> {
    key: ServiceKey<M>,
    listing: watch::Receiver<Listing<M>>,
    strategy: RouterStrategy,
    next: AtomicUsize,
    dead_letters: Option<EventBus>,
}

impl<M: RoutingKey> GroupRouter<M> {
    /// Subscribe to `key` through `receptionist` and route with `strategy`.
    pub fn new<Mon>(receptionist: &Receptionist<Mon>, key: ServiceKey<M>, strategy: RouterStrategy) -> Self
    where
        Mon: crate::monitoring::Monitor<crate::monitoring::ReceptionistEvent>,
    {
        let listing = receptionist.subscribe(&key);
        Self {
            key,
            listing,
            strategy,
            next: AtomicUsize::new(0),
            dead_letters: None,
        }
    }

    /// Attach an [`EventBus`] that delivery failures are reported to as
    /// [`DeadLetterEvent`]s (spec.md §6 "Dead-letter stream (OUT)").
    pub fn with_dead_letters(mut self, bus: EventBus) -> Self {
        self.dead_letters = Some(bus);
        self
    }

    /// The current listing snapshot.
    pub fn listing(&self) -> Listing<M> {
        self.listing.borrow().clone()
    }

    async fn report_dead_letter(&self, recipient: &ActorRef<M>, reason: String) {
        if let Some(bus) = &self.dead_letters {
            bus.publish_dead_letter(DeadLetterEvent {
                timestamp: Utc::now(),
                message_type: M::MESSAGE_TYPE.to_string(),
                recipient: Some(recipient.path().to_string()),
                reason,
            });
        }
    }

    /// Route `message` to one (or, for broadcast, every) currently
    /// registered actor.
    pub async fn route(&self, message: M) -> Result<(), RouterError> {
        let listing = self.listing.borrow().clone();
        let refs = listing.refs();
        if refs.is_empty() {
            return Err(RouterError::PoolEmpty(self.key.id().to_string()));
        }

        match self.strategy {
            RouterStrategy::RoundRobin => {
                let index = self.next.fetch_add(1, Ordering::Relaxed) % refs.len();
                if let Err(err) = refs[index].tell(message).await {
                    self.report_dead_letter(&refs[index], err.to_string()).await;
                }
            }
            RouterStrategy::Random => {
                let index = rand::thread_rng().gen_range(0..refs.len());
                if let Err(err) = refs[index].tell(message).await {
                    self.report_dead_letter(&refs[index], err.to_string()).await;
                }
            }
            RouterStrategy::Broadcast => {
                for r in &refs {
                    if let Err(err) = r.tell(message.clone()).await {
                        self.report_dead_letter(r, err.to_string()).await;
                    }
                }
            }
            RouterStrategy::ConsistentHash { virtual_nodes } => {
                let ids: Vec<String> = refs.iter().map(|r| r.path().to_string()).collect();
                let ring = HashRing::build(&ids, virtual_nodes);
                let index = ring
                    .route(message.routing_key())
                    .ok_or_else(|| RouterError::PoolEmpty(self.key.id().to_string()))?;
                if let Err(err) = refs[index].tell(message).await {
                    self.report_dead_letter(&refs[index], err.to_string()).await;
                }
            }
        }
        Ok(())
    }
}
