//! Main actor system implementation with pub-sub architecture.

// Layer 1: Standard library
use std::collections::HashMap;
use std::sync::Arc;

// Layer 2: Third-party
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::{spawn, JoinHandle};
use tokio::time::{sleep, timeout};

// Layer 3: Internal
use super::{builder::ActorSpawnBuilder, SystemConfig, SystemError};
use crate::actor::cell::{CellControl, WatchSink};
use crate::actor::selection::Selection;
use crate::actor::{Actor, ActorContext, ActorRef, ErrorAction};
use crate::broker::MessageBroker;
use crate::dispatcher::drain_prioritized;
use crate::mailbox::{
    AtomicMetrics, MailboxReceiver, MailboxSender, UnboundedMailbox, UnboundedMailboxSender,
};
use crate::message::Message;
use crate::util::{ActorAddress, ActorId, ActorPath};

/// System state enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SystemState {
    /// System is running normally
    Running,
    /// Graceful shutdown in progress
    ShuttingDown,
    /// System has stopped
    Stopped,
}

/// Terminal state of a spawned actor's dispatch loop.
///
/// Observed through [`ActorSystem::spawn_supervised`] by a `supervisor::Child`
/// wrapper that needs to know when a cell it owns has stopped on its own
/// (clean drain) versus stopped because `Actor::on_error` asked for a
/// restart/escalation it cannot itself perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellOutcome {
    /// Still processing messages (or hasn't failed yet).
    Running,
    /// Mailbox drained to closure, or `on_error` returned `Stop`.
    Stopped,
    /// `on_error` returned `Restart` or `Escalate`; the cell stopped itself
    /// because this generic loop cannot rebuild the actor from a factory.
    Failed,
}

/// Internal actor metadata.
#[allow(dead_code)] // Fields reserved for future actor management features
struct ActorMetadata<M: Message> {
    id: ActorId,
    address: ActorAddress,
    name: Option<String>,
    spawned_at: DateTime<Utc>,
    mailbox_sender: UnboundedMailboxSender<M, AtomicMetrics>,
    task_handle: JoinHandle<()>,
}

/// Main actor system managing actor lifecycle.
///
/// The system is generic over the message type, mailbox sender, and broker
/// implementation, following dependency injection pattern (ADR-006).
///
/// # Architecture: Pub-Sub Integration (ADR-006)
///
/// ```text
/// Actor → ActorContext.send() → Broker.publish() → ActorSystem (subscriber)
///                                                        ↓
///                                                  Routes to actor
///                                                        ↓
///                                                  Mailbox → Actor
/// ```
///
/// # Type Parameters
///
/// * `M` - The message type used by all actors in this system
/// * `B` - The message broker implementation (injected via dependency injection)
///
/// # Examples
///
/// ```rust,ignore
/// use airssys_rt::*;
///
/// #[tokio::main]
/// async fn main() -> Result<(), SystemError> {
///     // Create broker and inject into system
///     let broker = InMemoryMessageBroker::new();
///     let system = ActorSystem::new(SystemConfig::default(), broker);
///     
///     // All actors use the injected broker
///     let addr = system.spawn()
///         .with_name("worker")
///         .spawn(my_actor)
///         .await?;
///     
///     system.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct ActorSystem<M: Message, B: MessageBroker<M>> {
    pub(crate) inner: Arc<ActorSystemInner<M, B>>,
}

pub(crate) struct ActorSystemInner<M: Message, B: MessageBroker<M>> {
    pub(crate) config: SystemConfig,
    pub(crate) broker: B, // Dependency injection (ADR-006 §6.2 compliance)
    actors: RwLock<HashMap<ActorAddress, ActorMetadata<M>>>,
    pub(crate) state: RwLock<SystemState>,
    router_handle: RwLock<Option<JoinHandle<()>>>,
    /// Path-keyed lookup of every live cell's control block, so `watch(target)`
    /// can reach the target's `CellControl` to register a watcher (spec.md
    /// §4.3/§4.4). Populated in `spawn_actor_task_observed`, pruned when that
    /// cell's drain loop terminates.
    cells: DashMap<ActorPath, CellControl>,
    /// Path-keyed lookup of every live cell's mailbox ref, so `select(path)`
    /// can forward a message to whatever currently occupies that path
    /// (spec.md §4.4 Selection) without the caller needing to know its
    /// incarnation uid. Populated/pruned alongside `cells`.
    refs: DashMap<ActorPath, ActorRef<M>>,
}

impl<M: Message + serde::Serialize, B: MessageBroker<M> + Clone + Send + Sync + 'static>
    ActorSystem<M, B>
{
    /// Get the system configuration.
    pub fn config(&self) -> &SystemConfig {
        &self.inner.config
    }

    /// Create a new actor system with dependency injection.
    ///
    /// # Arguments
    ///
    /// * `config` - System configuration
    /// * `broker` - Message broker implementation (injected)
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let broker = InMemoryMessageBroker::new();
    /// let system = ActorSystem::new(SystemConfig::default(), broker);
    /// ```
    pub fn new(config: SystemConfig, broker: B) -> Self {
        let inner = Arc::new(ActorSystemInner {
            config,
            broker,
            actors: RwLock::new(HashMap::new()),
            state: RwLock::new(SystemState::Running),
            router_handle: RwLock::new(None),
            cells: DashMap::new(),
            refs: DashMap::new(),
        });

        // Start router task
        let inner_clone = Arc::clone(&inner);
        let router_handle = spawn(async move {
            Self::router_task(inner_clone).await;
        });

        *inner.router_handle.write() = Some(router_handle);

        Self { inner }
    }

    /// Router task: subscribes to broker and routes messages to actors.
    async fn router_task(inner: Arc<ActorSystemInner<M, B>>) {
        // Subscribe to broker
        let mut stream = match inner.broker.subscribe().await {
            Ok(s) => s,
            Err(_) => return,
        };

        // Route messages to actors
        while let Some(envelope) = stream.recv().await {
            // Check if system is shutting down
            if *inner.state.read() != SystemState::Running {
                break;
            }

            // Route to target actor
            if let Some(target) = &envelope.reply_to {
                let sender = {
                    let actors = inner.actors.read();
                    actors.get(target).map(|metadata| metadata.mailbox_sender.clone())
                };
                if let Some(sender) = sender {
                    // Send to actor's mailbox (ignore if mailbox closed)
                    let _ = sender.send(envelope).await;
                }
                // If actor not found, message is dropped (dead letter in future)
            }
        }
    }

    /// Get the number of active actors.
    pub fn actor_count(&self) -> usize {
        self.inner.actors.read().len()
    }

    /// Check if system is shutting down.
    pub fn is_shutting_down(&self) -> bool {
        *self.inner.state.read() != SystemState::Running
    }

    /// Gracefully shutdown the system.
    ///
    /// Waits for all actors to finish processing before returning.
    pub async fn shutdown(&self) -> Result<(), SystemError> {
        // Set shutting down state
        {
            let mut state = self.inner.state.write();
            if *state != SystemState::Running {
                return Err(SystemError::ShuttingDown);
            }
            *state = SystemState::ShuttingDown;
        }

        // Stop router task
        if let Some(handle) = self.inner.router_handle.write().take() {
            handle.abort();
        }

        // Wait for all actors to finish (with timeout)
        let timeout_duration = self.inner.config.shutdown_timeout;
        let result = timeout(timeout_duration, self.wait_for_actors()).await;

        match result {
            Ok(()) => {
                *self.inner.state.write() = SystemState::Stopped;
                Ok(())
            }
            Err(_) => Err(SystemError::ShutdownTimeout(timeout_duration)),
        }
    }

    /// Wait for all actors to finish.
    async fn wait_for_actors(&self) {
        loop {
            let actor_count = self.inner.actors.read().len();

            if actor_count == 0 {
                break;
            }

            // Wait a bit
            sleep(std::time::Duration::from_millis(10)).await;
        }
    }

    /// Force immediate shutdown without waiting.
    pub async fn force_shutdown(&self) {
        *self.inner.state.write() = SystemState::Stopped;

        // Stop router
        if let Some(handle) = self.inner.router_handle.write().take() {
            handle.abort();
        }

        // Abort all actor tasks
        let mut actors = self.inner.actors.write();
        for metadata in actors.values() {
            metadata.task_handle.abort();
        }
        actors.clear();
    }

    /// Internal: Spawn actor with full configuration.
    ///
    /// Called by ActorSpawnBuilder.
    pub(crate) async fn spawn_actor_internal<A>(
        &self,
        actor: A,
        name: Option<String>,
        _mailbox_capacity: usize,
    ) -> Result<ActorAddress, SystemError>
    where
        A: Actor<Message = M> + Send + 'static,
    {
        // Check if shutting down
        if self.is_shutting_down() {
            return Err(SystemError::ShuttingDown);
        }

        // Check actor limit
        if self.inner.config.max_actors > 0 {
            let current = self.actor_count();
            if current >= self.inner.config.max_actors {
                return Err(SystemError::ActorLimitExceeded {
                    current,
                    max: self.inner.config.max_actors,
                });
            }
        }

        // Create actor ID and address
        let actor_id = ActorId::new();
        let address = if let Some(ref n) = name {
            ActorAddress::named(n)
        } else {
            ActorAddress::Anonymous { id: actor_id }
        };

        // Create unbounded mailbox (bounded not yet supported in pub-sub)
        let (mailbox, mailbox_sender) = UnboundedMailbox::<M, AtomicMetrics>::new();

        // Create actor context, carrying a clone of this cell's own sender so
        // `ActorContext::self_ref` can hand out a genuinely routable `ActorRef`.
        let context = ActorContext::new(
            address.clone(),
            self.inner.broker.clone(),
            self.clone(),
            mailbox_sender.clone(),
        );

        // Spawn actor task
        let task_handle = self.spawn_actor_task(actor, mailbox, context);

        // Store metadata
        let metadata = ActorMetadata {
            id: actor_id,
            address: address.clone(),
            name,
            spawned_at: Utc::now(),
            mailbox_sender,
            task_handle,
        };

        self.inner.actors.write().insert(address.clone(), metadata);

        Ok(address)
    }

    /// Spawn the actor task.
    ///
    /// The loop body is the dispatcher's throughput-bounded, priority-sorted
    /// drain (`dispatcher::drain_prioritized`, spec.md §4.1): each turn pulls
    /// up to `default_throughput` already-queued envelopes, processes them
    /// highest-priority-first, then yields the worker thread back to the
    /// tokio scheduler before looping, so one busy actor cannot starve its
    /// neighbors on a shared runtime.
    ///
    /// `ErrorAction::Restart` and `ErrorAction::Escalate` cannot be carried
    /// out directly by this generic loop: a true restart means rebuilding
    /// the actor from a factory and re-running `pre_start` with a fresh
    /// incarnation uid, which only the owner of that factory can do. Instead
    /// the loop reports a terminal [`CellOutcome::Failed`] through the
    /// watch channel from [`Self::spawn_actor_task_observed`] and stops;
    /// `supervisor::ActorCellChild` watches that channel and performs the
    /// actual stop/respawn via `SupervisorNode::restart_child`. Plain
    /// `spawn()` callers (no supervisor) just drop the receiver, so the
    /// actor stops for good, matching the old behavior.
    fn spawn_actor_task<A>(
        &self,
        actor: A,
        mailbox: UnboundedMailbox<M, AtomicMetrics>,
        context: ActorContext<M, B>,
    ) -> JoinHandle<()>
    where
        A: Actor<Message = M> + Send + 'static,
    {
        self.spawn_actor_task_observed(actor, mailbox, context).0
    }

    /// Same dispatch loop as [`Self::spawn_actor_task`], but also reports
    /// its terminal state on a `watch` channel so a supervising `Child`
    /// wrapper can react to restart/escalate decisions it cannot perform
    /// itself. See `supervisor::ActorCellChild`.
    fn spawn_actor_task_observed<A>(
        &self,
        mut actor: A,
        mut mailbox: UnboundedMailbox<M, AtomicMetrics>,
        mut context: ActorContext<M, B>,
    ) -> (JoinHandle<()>, watch::Receiver<CellOutcome>)
    where
        A: Actor<Message = M> + Send + 'static,
    {
        let throughput = self.inner.config.default_throughput;
        let (outcome_tx, outcome_rx) = watch::channel(CellOutcome::Running);

        let path = context.path().clone();
        let uid = path.uid();
        let cell_control = context.control().clone();
        let system_for_cells = self.clone();
        system_for_cells
            .inner
            .cells
            .insert(path.clone(), cell_control.clone());
        system_for_cells
            .inner
            .refs
            .insert(path.clone(), context.self_ref());

        // Terminate this cell: prune it from the path registry and notify
        // every watcher exactly once (spec.md §4.3/§5 P5 "at-least-once").
        // A local macro rather than a closure: the borrow-checker can't
        // reconcile a `FnMut` capturing `&mut context`/`&mut actor` with the
        // loop's own mutable borrows of those same bindings.
        macro_rules! terminate {
            () => {{
                system_for_cells.inner.cells.remove(&path);
                system_for_cells.inner.refs.remove(&path);
                cell_control.notify_watchers(path.clone(), uid);
            }};
        }

        let handle = spawn(async move {
            // Call pre_start lifecycle hook
            if let Err(error) = actor.pre_start(&mut context).await {
                let action = actor.on_error(error, &mut context).await;
                match action {
                    ErrorAction::Stop => {
                        terminate!();
                        let _ = outcome_tx.send(CellOutcome::Stopped);
                        return;
                    }
                    ErrorAction::Restart | ErrorAction::Escalate => {
                        terminate!();
                        let _ = outcome_tx.send(CellOutcome::Failed);
                        return;
                    }
                    ErrorAction::Resume => {} // Continue with message processing
                }
            }

            'drain: loop {
                let batch = drain_prioritized(&mut mailbox, throughput).await;
                if batch.is_empty() {
                    // Mailbox closed and drained.
                    break 'drain;
                }

                for envelope in batch {
                    match actor.handle_message(envelope.payload, &mut context).await {
                        Ok(()) => {
                            // Message handled successfully. An actor that
                            // called `context.stop_self()` while handling it
                            // (e.g. a `Behavior` returning `Directive::Stopped`)
                            // stops now rather than draining the rest of the
                            // mailbox.
                            if context.is_stop_requested() {
                                let _ = actor.post_stop(&mut context).await;
                                terminate!();
                                let _ = outcome_tx.send(CellOutcome::Stopped);
                                return;
                            }
                        }
                        Err(error) => {
                            let action = actor.on_error(error, &mut context).await;
                            match action {
                                ErrorAction::Stop => {
                                    let _ = actor.post_stop(&mut context).await;
                                    terminate!();
                                    let _ = outcome_tx.send(CellOutcome::Stopped);
                                    return;
                                }
                                ErrorAction::Restart | ErrorAction::Escalate => {
                                    let _ = actor.post_stop(&mut context).await;
                                    terminate!();
                                    let _ = outcome_tx.send(CellOutcome::Failed);
                                    return;
                                }
                                ErrorAction::Resume => {
                                    // Continue processing next message
                                    continue;
                                }
                            }
                        }
                    }
                }

                // Yield to the runtime so other scheduled cells get a turn
                // before this task is polled again (§4.1 fairness).
                tokio::task::yield_now().await;
            }

            // Call post_stop lifecycle hook
            let _ = actor.post_stop(&mut context).await;
            terminate!();
            let _ = outcome_tx.send(CellOutcome::Stopped);
        });

        (handle, outcome_rx)
    }

    /// Spawn an actor whose failures are observable by a supervisor.
    ///
    /// Unlike [`Self::spawn_actor_internal`], the returned cell is not
    /// tracked in this system's own actor registry (it has no
    /// `ActorMetadata` entry, so it doesn't count toward `actor_count()` or
    /// get aborted by `shutdown()`/`force_shutdown()`): its lifecycle is
    /// owned by whichever `SupervisorNode` holds the `Child` wrapper
    /// returned alongside it, which is responsible for stopping it.
    #[allow(clippy::type_complexity)]
    pub(crate) async fn spawn_supervised<A>(
        &self,
        actor: A,
        name: Option<String>,
    ) -> Result<
        (
            ActorAddress,
            JoinHandle<()>,
            watch::Receiver<CellOutcome>,
            UnboundedMailboxSender<M, AtomicMetrics>,
        ),
        SystemError,
    >
    where
        A: Actor<Message = M> + Send + 'static,
    {
        if self.is_shutting_down() {
            return Err(SystemError::ShuttingDown);
        }

        let actor_id = ActorId::new();
        let address = if let Some(ref n) = name {
            ActorAddress::named(n)
        } else {
            ActorAddress::Anonymous { id: actor_id }
        };

        let (mailbox, mailbox_sender) = UnboundedMailbox::<M, AtomicMetrics>::new();
        let context = ActorContext::new(
            address.clone(),
            self.inner.broker.clone(),
            self.clone(),
            mailbox_sender.clone(),
        );

        let (task_handle, outcome_rx) = self.spawn_actor_task_observed(actor, mailbox, context);
        Ok((address, task_handle, outcome_rx, mailbox_sender))
    }

    /// Register `watcher` to be notified through `sink` when the cell at
    /// `target` terminates (spec.md §4.3 watch semantics). Returns `false`
    /// if no live cell is registered at `target` — e.g. it already stopped,
    /// or the path never existed — in which case the caller gets no
    /// notification (the precondition is watch-before-stop, per §5 P5).
    pub(crate) fn watch_path(&self, watcher: ActorPath, target: ActorPath, sink: WatchSink) -> bool {
        match self.inner.cells.get(&target) {
            Some(cell) => {
                cell.add_watcher(watcher, sink);
                true
            }
            None => false,
        }
    }

    /// Stop `watcher` from observing `target`, if it was registered.
    pub(crate) fn unwatch_path(&self, watcher: &ActorPath, target: &ActorPath) {
        if let Some(cell) = self.inner.cells.get(target) {
            cell.remove_watcher(watcher);
        }
    }

    /// The `CellControl` currently registered at `path`, if its cell is
    /// still running. Used by [`Selection`] to resolve a selection's
    /// liveness without reaching into `ActorSystemInner` itself.
    pub(crate) fn cell_at(&self, path: &ActorPath) -> Option<CellControl> {
        self.inner.cells.get(path).map(|entry| entry.value().clone())
    }

    /// Resolve `segments` against the currently live cells, lazily walking
    /// from the root (spec.md §4.4 "resolves lazily by traversing from
    /// root"). Returns the live ref at the full path on success, or the
    /// index of the first segment (from the root) that has no live cell —
    /// a "dead segment" the caller should dead-letter.
    pub(crate) fn resolve_selection(&self, segments: &[String]) -> Result<ActorRef<M>, usize> {
        for depth in 1..=segments.len() {
            let prefix = &segments[..depth];
            let live = self
                .inner
                .refs
                .iter()
                .any(|entry| entry.key().segments() == prefix);
            if !live {
                return Err(depth - 1);
            }
        }
        self.inner
            .refs
            .iter()
            .find(|entry| entry.key().segments() == segments)
            .map(|entry| entry.value().clone())
            .ok_or(segments.len().saturating_sub(1))
    }

    /// Resolve `path` lazily against the live cell tree, returning an
    /// anonymous [`Selection`] that buffers-and-forwards messages to
    /// whatever currently occupies it (spec.md §4.4).
    pub fn select(&self, path: &ActorPath) -> Selection<M, B> {
        Selection::new(self.clone(), path.segments().to_vec())
    }

    /// Create a builder for spawning actors.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let address = system.spawn()
    ///     .with_name("worker")
    ///     .with_mailbox_capacity(1000)
    ///     .spawn(my_actor)
    ///     .await?;
    /// ```
    pub fn spawn(&self) -> ActorSpawnBuilder<M, B> {
        ActorSpawnBuilder::new(self.clone())
    }
}

impl<M: Message, B: MessageBroker<M>> Clone for ActorSystem<M, B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::broker::in_memory::InMemoryMessageBroker;
    use crate::message::MessagePriority;

    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    struct TestMessage {
        data: String,
    }

    impl Message for TestMessage {
        const MESSAGE_TYPE: &'static str = "test";

        fn priority(&self) -> MessagePriority {
            MessagePriority::Normal
        }
    }

    struct TestActor;

    #[async_trait::async_trait]
    impl Actor for TestActor {
        type Message = TestMessage;
        type Error = std::io::Error;

        async fn handle_message<B: crate::broker::MessageBroker<Self::Message>>(
            &mut self,
            _message: Self::Message,
            _context: &mut ActorContext<Self::Message, B>,
        ) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_actor_system_creation() {
        let broker = InMemoryMessageBroker::<TestMessage>::new();
        let system = ActorSystem::new(SystemConfig::default(), broker);
        assert_eq!(system.actor_count(), 0);
        assert!(!system.is_shutting_down());
    }

    #[tokio::test]
    async fn test_actor_spawn() {
        let broker = InMemoryMessageBroker::<TestMessage>::new();
        let system = ActorSystem::new(SystemConfig::default(), broker);

        let address = system
            .spawn_actor_internal(TestActor, Some("test".to_string()), 100)
            .await
            .unwrap();

        assert_eq!(system.actor_count(), 1);

        if let ActorAddress::Named { name, .. } = address {
            assert_eq!(name, "test");
        } else {
            panic!("Expected named address");
        }
    }

    #[tokio::test]
    async fn test_system_shutdown() {
        let broker = InMemoryMessageBroker::<TestMessage>::new();
        let system = ActorSystem::new(SystemConfig::default(), broker);

        // Test shutdown without actors (should succeed immediately)
        assert!(system.shutdown().await.is_ok());
        assert!(system.is_shutting_down());
    }

    #[tokio::test]
    async fn test_force_shutdown() {
        let broker = InMemoryMessageBroker::<TestMessage>::new();
        let system = ActorSystem::new(SystemConfig::default(), broker);

        let _addr = system
            .spawn_actor_internal(TestActor, None, 100)
            .await
            .unwrap();

        // Force shutdown should complete immediately
        system.force_shutdown().await;
        assert_eq!(system.actor_count(), 0);
    }
}
