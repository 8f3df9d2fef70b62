//! Pool router: dispatches to a fixed set of worker refs by strategy.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use chrono::Utc;
use parking_lot::RwLock;
use rand::Rng;

// Layer 3: Internal module imports
use super::error::RouterError;
use super::strategy::{HashRing, RoutingKey, RouterStrategy};
use crate::actor::ActorRef;
use crate::event_bus::EventBus;
use crate::message::Message;
use crate::monitoring::{DeadLetterEvent, Monitor, NoopMonitor, RouterEvent, RouterEventKind};

/// Load-distributing front for a fixed pool of same-typed workers
/// (spec.md §4.6 "pool router").
///
/// Grounded in [`crate::broker::ActorRegistry::get_pool_member`]'s
/// round-robin/random selection, generalized with broadcast and
/// consistent-hash strategies and lifted out of the registry into a
/// standalone, reusable router.
///
/// Replacement of terminated workers is left to the caller's own
/// supervision (e.g. restart one-for-one and call [`PoolRouter::set_workers`]
/// with the refreshed pool) rather than owned here, keeping the router
/// itself a plain routing table.
pub struct PoolRouter<M, Mon = NoopMonitor<RouterEvent>>
where
    M: RoutingKey,
    Mon: Monitor<RouterEvent>,
{
    name: String,
    workers: Arc<RwLock<Vec<ActorRef<M>>>>,
    strategy: RouterStrategy,
    next: AtomicUsize,
    ring: Arc<RwLock<HashRing>>,
    monitor: Mon,
    dead_letters: Option<EventBus>,
}

impl<M: RoutingKey> PoolRouter<M, NoopMonitor<RouterEvent>> {
    /// Build a pool router with no monitoring.
    pub fn new(name: impl Into<String>, workers: Vec<ActorRef<M>>, strategy: RouterStrategy) -> Self {
        Self::with_monitor(name, workers, strategy, NoopMonitor::new())
    }
}

impl<M: RoutingKey, Mon: Monitor<RouterEvent>> PoolRouter<M, Mon> {
    /// Build a pool router reporting through `monitor`.
    pub fn with_monitor(
        name: impl Into<String>,
        workers: Vec<ActorRef<M>>,
        strategy: RouterStrategy,
        monitor: Mon,
    ) -> Self {
        let name = name.into();
        let ring = Self::build_ring(&workers, &strategy);
        Self {
            name,
            workers: Arc::new(RwLock::new(workers)),
            strategy,
            next: AtomicUsize::new(0),
            ring: Arc::new(RwLock::new(ring)),
            monitor,
            dead_letters: None,
        }
    }

    /// Attach an [`EventBus`] that delivery failures are reported to as
    /// [`DeadLetterEvent`]s (spec.md §6 "Dead-letter stream (OUT)").
    pub fn with_dead_letters(mut self, bus: EventBus) -> Self {
        self.dead_letters = Some(bus);
        self
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

    fn build_ring(workers: &[ActorRef<M>], strategy: &RouterStrategy) -> HashRing {
        match strategy {
            RouterStrategy::ConsistentHash { virtual_nodes } => {
                let ids: Vec<String> = workers.iter().map(|w| w.path().to_string()).collect();
                HashRing::build(&ids, *virtual_nodes)
            }
            _ => HashRing::default(),
        }
    }

    /// Replace the worker pool, e.g. after supervision restarts a member.
    pub fn set_workers(&self, workers: Vec<ActorRef<M>>) {
        let ring = Self::build_ring(&workers, &self.strategy);
        *self.workers.write() = workers;
        *self.ring.write() = ring;
    }

    /// Current pool size, after pruning workers whose mailbox has closed.
    pub fn worker_count(&self) -> usize {
        self.prune();
        self.workers.read().len()
    }

    fn prune(&self) {
        let changed = {
            let mut workers = self.workers.write();
            let before = workers.len();
            workers.retain(|w| !w.is_closed());
            workers.len() != before
        };
        if changed {
            let workers = self.workers.read();
            *self.ring.write() = Self::build_ring(&workers, &self.strategy);
        }
    }

    async fn record(&self, kind: RouterEventKind) {
        let _ = self
            .monitor
            .record(RouterEvent {
                timestamp: Utc::now(),
                router_name: self.name.clone(),
                event_kind: kind,
            })
            .await;
    }

    /// Route `message` to one (or, for broadcast, every) worker per the
    /// configured strategy.
    ///
    /// For `Broadcast`, failure to deliver to one worker does not prevent
    /// delivery to the others (spec.md §4.6); only the last observed error
    /// is returned.
    pub async fn route(&self, message: M) -> Result<(), RouterError> {
        self.prune();
        let workers = self.workers.read().clone();
        if workers.is_empty() {
            self.record(RouterEventKind::PoolExhausted).await;
            return Err(RouterError::PoolEmpty(self.name.clone()));
        }

        match self.strategy {
            RouterStrategy::RoundRobin => {
                let index = self.next.fetch_add(1, Ordering::Relaxed) % workers.len();
                self.record(RouterEventKind::MessageRouted { routee_index: index }).await;
                if let Err(err) = workers[index].tell(message).await {
                    self.report_dead_letter(&workers[index], err.to_string()).await;
                }
            }
            RouterStrategy::Random => {
                let index = rand::thread_rng().gen_range(0..workers.len());
                self.record(RouterEventKind::MessageRouted { routee_index: index }).await;
                if let Err(err) = workers[index].tell(message).await {
                    self.report_dead_letter(&workers[index], err.to_string()).await;
                }
            }
            RouterStrategy::Broadcast => {
                for (index, worker) in workers.iter().enumerate() {
                    self.record(RouterEventKind::MessageRouted { routee_index: index }).await;
                    if let Err(err) = worker.tell(message.clone()).await {
                        self.report_dead_letter(worker, err.to_string()).await;
                    }
                }
            }
            RouterStrategy::ConsistentHash { .. } => {
                let key = message.routing_key().to_string();
                let index = self
                    .ring
                    .read()
                    .route(&key)
                    .ok_or_else(|| RouterError::PoolEmpty(self.name.clone()))?;
                self.record(RouterEventKind::MessageRouted { routee_index: index }).await;
                if let Err(err) = workers[index].tell(message).await {
                    self.report_dead_letter(&workers[index], err.to_string()).await;
                }
            }
        }
        Ok(())
    }
}

impl<M: RoutingKey, Mon: Monitor<RouterEvent>> Clone for PoolRouter<M, Mon> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            workers: Arc::clone(&self.workers),
            strategy: self.strategy,
            next: AtomicUsize::new(self.next.load(Ordering::Relaxed)),
            ring: Arc::clone(&self.ring),
            monitor: self.monitor.clone(),
            dead_letters: self.dead_letters.clone(),
        }
    }
}
