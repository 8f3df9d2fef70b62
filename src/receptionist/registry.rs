//! The receptionist: a system-wide `ServiceKey -> Listing` index.
//!
//! Grounded in [`crate::broker::ActorRegistry`]'s DashMap-based, lock-free
//! approach, generalized from a flat address table to a
//! `ServiceKey -> Listing` index with subscription streams (spec.md §4.5).

// Layer 1: Standard library imports
use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::watch;

// Layer 3: Internal module imports
use super::error::ReceptionistError;
use super::key::{Listing, ServiceKey};
use crate::actor::ActorRef;
use crate::message::Message;
use crate::monitoring::{Monitor, NoopMonitor, ReceptionistEvent, ReceptionistEventKind};
use crate::util::ActorPath;

/// Type-erased per-key bookkeeping. Stored behind `Arc<dyn Any>` so one
/// `DashMap` can hold entries for arbitrarily many distinct `M`s; downcast
/// back to `Arc<Entry<M>>` is driven entirely by the caller's own
/// `ServiceKey<M>`, so it can never observe a mismatched type at the
/// downcast site. This is the crate's second deliberate, narrow use of
/// type erasure (the first being `Behavior::Become`'s `Box<dyn Behavior<M>>`,
/// see DESIGN.md) — required because a receptionist indexing many message
/// types behind one registry is inherently a heterogeneous collection.
struct Entry<M: Message> {
    refs: DashMap<ActorPath, ActorRef<M>>,
    generation: AtomicU64,
    listing_tx: watch::Sender<Listing<M>>,
}

impl<M: Message> Entry<M> {
    fn new(key_id: String) -> Self {
        let (listing_tx, _rx) = watch::channel(Listing::new(key_id, Vec::new(), 0));
        Self {
            refs: DashMap::new(),
            generation: AtomicU64::new(0),
            listing_tx,
        }
    }

    fn snapshot(&self, key_id: &str) -> Listing<M> {
        // Lazily prune refs whose mailbox has already closed (spec.md §4.5:
        // "auto-deregistration ... is guaranteed best-effort with bounded lag").
        self.refs.retain(|_, r| !r.is_closed());
        let refs: Vec<ActorRef<M>> = self.refs.iter().map(|e| e.value().clone()).collect();
        Listing::new(key_id.to_string(), refs, self.generation.load(Ordering::Acquire))
    }

    fn publish(&self, key_id: &str) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let refs: Vec<ActorRef<M>> = self.refs.iter().map(|e| e.value().clone()).collect();
        let _ = self.listing_tx.send(Listing::new(key_id.to_string(), refs, generation));
    }
}

/// System-wide registry mapping [`ServiceKey`]s to the actors currently
/// registered under them (spec.md §4.5).
///
/// Lives inside the owning system (see spec.md §9 "global mutable state ...
/// must live inside the system record, not as module-global singletons") so
/// multiple independent systems can coexist in one process; `Receptionist`
/// is cheap to clone (`Arc`-backed) and is typically held once per system
/// and shared via `ActorContext`/application code.
pub struct Receptionist<Mon = NoopMonitor<ReceptionistEvent>>
where
    Mon: Monitor<ReceptionistEvent>,
{
    entries: Arc<DashMap<(TypeId, String), Arc<dyn Any + Send + Sync>>>,
    shutdown: Arc<AtomicBool>,
    monitor: Mon,
}

impl<Mon: Monitor<ReceptionistEvent>> Clone for Receptionist<Mon> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            shutdown: Arc::clone(&self.shutdown),
            monitor: self.monitor.clone(),
        }
    }
}

impl Receptionist<NoopMonitor<ReceptionistEvent>> {
    /// Create a new, empty receptionist with no monitoring.
    pub fn new() -> Self {
        Self::with_monitor(NoopMonitor::new())
    }
}

impl Default for Receptionist<NoopMonitor<ReceptionistEvent>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Mon: Monitor<ReceptionistEvent>> Receptionist<Mon> {
    /// Create a new, empty receptionist reporting through `monitor`.
    pub fn with_monitor(monitor: Mon) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            shutdown: Arc::new(AtomicBool::new(false)),
            monitor,
        }
    }

    /// Stop accepting new registrations; existing listings remain queryable.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    fn entry_for<M: Message>(&self, key: &ServiceKey<M>) -> Arc<Entry<M>> {
        let composite = (key.type_id(), key.id().to_string());
        let boxed = self
            .entries
            .entry(composite)
            .or_insert_with(|| Arc::new(Entry::<M>::new(key.id().to_string())) as Arc<dyn Any + Send + Sync>)
            .clone();
        match boxed.downcast::<Entry<M>>() {
            Ok(entry) => entry,
            Err(_) => unreachable!("ServiceKey<M> composite key always maps to Entry<M>"),
        }
    }

    /// Register `actor_ref` under `key`, publishing an updated listing to
    /// every subscriber.
    ///
    /// Idempotent per path: registering the same ref twice only updates its
    /// entry, it does not duplicate the listing.
    pub async fn register<M: Message>(
        &self,
        key: &ServiceKey<M>,
        actor_ref: ActorRef<M>,
    ) -> Result<(), ReceptionistError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(ReceptionistError::ShutdownInProgress(key.id().to_string()));
        }
        let entry = self.entry_for(key);
        entry.refs.insert(actor_ref.path().clone(), actor_ref);
        entry.publish(key.id());

        let _ = self
            .monitor
            .record(ReceptionistEvent {
                timestamp: Utc::now(),
                key_id: key.id().to_string(),
                event_kind: ReceptionistEventKind::Registered,
            })
            .await;
        let size = entry.refs.len();
        let _ = self
            .monitor
            .record(ReceptionistEvent {
                timestamp: Utc::now(),
                key_id: key.id().to_string(),
                event_kind: ReceptionistEventKind::ListingUpdated { size },
            })
            .await;
        Ok(())
    }

    /// Remove the actor at `path` from `key`'s listing, if present.
    pub async fn deregister<M: Message>(&self, key: &ServiceKey<M>, path: &ActorPath) {
        let entry = self.entry_for(key);
        if entry.refs.remove(path).is_some() {
            entry.publish(key.id());
            let _ = self
                .monitor
                .record(ReceptionistEvent {
                    timestamp: Utc::now(),
                    key_id: key.id().to_string(),
                    event_kind: ReceptionistEventKind::Deregistered,
                })
                .await;
        }
    }

    /// The current listing for `key` (spec.md §4.5 `find`).
    pub fn find<M: Message>(&self, key: &ServiceKey<M>) -> Listing<M> {
        self.entry_for(key).snapshot(key.id())
    }

    /// Subscribe to `key`'s listing. The returned receiver already holds the
    /// current listing and yields every subsequent update in application
    /// order (identical consecutive listings are coalesced by `watch`'s
    /// "only the latest value" semantics, matching spec.md §4.5).
    pub fn subscribe<M: Message>(&self, key: &ServiceKey<M>) -> watch::Receiver<Listing<M>> {
        self.entry_for(key).listing_tx.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::mailbox::{AtomicMetrics, UnboundedMailbox};

    #[derive(Debug, Clone)]
    struct Work;
    impl Message for Work {
        const MESSAGE_TYPE: &'static str = "work";
    }

    fn make_ref(name: &str) -> ActorRef<Work> {
        let (_mailbox, sender) = UnboundedMailbox::<Work, AtomicMetrics>::new();
        ActorRef::new(ActorPath::root().child(name), sender)
    }

    #[tokio::test]
    async fn test_register_then_find_returns_ref() {
        let receptionist = Receptionist::new();
        let key = ServiceKey::<Work>::new("pool");
        let worker = make_ref("worker-1");

        receptionist.register(&key, worker.clone()).await.unwrap();

        let listing = receptionist.find(&key);
        assert_eq!(listing.refs().len(), 1);
        assert_eq!(listing.refs()[0].path(), worker.path());
    }

    #[tokio::test]
    async fn test_three_workers_register_and_find_all() {
        let receptionist = Receptionist::new();
        let key = ServiceKey::<Work>::new("pool");
        for i in 0..3 {
            receptionist
                .register(&key, make_ref(&format!("worker-{i}")))
                .await
                .unwrap();
        }
        assert_eq!(receptionist.find(&key).refs().len(), 3);
    }

    #[tokio::test]
    async fn test_deregister_removes_from_listing() {
        let receptionist = Receptionist::new();
        let key = ServiceKey::<Work>::new("pool");
        let worker = make_ref("worker-1");
        receptionist.register(&key, worker.clone()).await.unwrap();

        receptionist.deregister(&key, worker.path()).await;

        assert!(receptionist.find(&key).is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_sees_current_listing_immediately() {
        let receptionist = Receptionist::new();
        let key = ServiceKey::<Work>::new("pool");
        receptionist.register(&key, make_ref("worker-1")).await.unwrap();

        let rx = receptionist.subscribe(&key);
        assert_eq!(rx.borrow().refs().len(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_observes_subsequent_update() {
        let receptionist = Receptionist::new();
        let key = ServiceKey::<Work>::new("pool");

        let mut rx = receptionist.subscribe(&key);
        assert!(rx.borrow().is_empty());

        receptionist.register(&key, make_ref("worker-1")).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().refs().len(), 1);
    }

    #[tokio::test]
    async fn test_generation_increases_monotonically() {
        let receptionist = Receptionist::new();
        let key = ServiceKey::<Work>::new("pool");
        receptionist.register(&key, make_ref("a")).await.unwrap();
        let gen1 = receptionist.find(&key).generation();
        receptionist.register(&key, make_ref("b")).await.unwrap();
        let gen2 = receptionist.find(&key).generation();
        assert!(gen2 > gen1);
    }

    #[tokio::test]
    async fn test_find_prunes_closed_refs() {
        let receptionist = Receptionist::new();
        let key = ServiceKey::<Work>::new("pool");
        let (mailbox, sender) = UnboundedMailbox::<Work, AtomicMetrics>::new();
        let worker = ActorRef::new(ActorPath::root().child("worker-1"), sender);
        receptionist.register(&key, worker).await.unwrap();
        drop(mailbox);

        assert!(receptionist.find(&key).is_empty());
    }

    #[tokio::test]
    async fn test_register_after_shutdown_errors() {
        let receptionist = Receptionist::new();
        receptionist.shutdown();
        let key = ServiceKey::<Work>::new("pool");
        let result = receptionist.register(&key, make_ref("worker-1")).await;
        assert!(matches!(result, Err(ReceptionistError::ShutdownInProgress(_))));
    }

    #[tokio::test]
    async fn test_distinct_message_types_same_id_do_not_collide() {
        #[derive(Debug, Clone)]
        struct OtherWork;
        impl Message for OtherWork {
            const MESSAGE_TYPE: &'static str = "other-work";
        }

        let receptionist = Receptionist::new();
        let work_key = ServiceKey::<Work>::new("pool");
        receptionist.register(&work_key, make_ref("worker-1")).await.unwrap();

        let other_key = ServiceKey::<OtherWork>::new("pool");
        assert!(receptionist.find(&other_key).is_empty());
    }
}
