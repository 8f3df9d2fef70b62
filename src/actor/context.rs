//! Actor execution context: identity, messaging and cell control surface.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc}; // §3.2 MANDATORY

// Layer 3: Internal module imports
use crate::actor::actor_ref::ActorRef;
use crate::actor::cell::CellControl;
use crate::actor::Actor;
use crate::broker::MessageBroker;
use crate::mailbox::{AtomicMetrics, UnboundedMailboxSender};
use crate::message::Message;
use crate::system::{ActorSystem, SystemError};
use crate::util::{ActorAddress, ActorId, ActorPath};

/// Per-actor execution context, injected into every [`Actor::handle_message`] call.
///
/// Carries the actor's identity (flat [`ActorAddress`] and hierarchical
/// [`ActorPath`]), its injected [`MessageBroker`] (ADR-006 dependency
/// injection), a handle back to the owning [`ActorSystem`] for spawning
/// children, and the [`CellControl`] block used for watch/stop bookkeeping.
///
/// # Type Parameters
///
/// * `M` - The message type this actor handles
/// * `B` - The broker implementation injected by the system
pub struct ActorContext<M: Message, B: MessageBroker<M>> {
    address: ActorAddress,
    path: ActorPath,
    id: ActorId,
    created_at: DateTime<Utc>,
    broker: B,
    system: ActorSystem<M, B>,
    self_sender: UnboundedMailboxSender<M, AtomicMetrics>,
    control: CellControl,
}

impl<M: Message, B: MessageBroker<M>> ActorContext<M, B> {
    /// Create a new actor context.
    ///
    /// `system` is the owning [`ActorSystem`], used for `spawn_child`. It is
    /// cheap to clone (an `Arc` handle), so holding one here does not create
    /// a reference cycle back through the actor's own task. `self_sender` is
    /// a clone of this cell's own mailbox sender, so [`Self::self_ref`] can
    /// produce a working [`ActorRef`] back to this actor.
    pub fn new(
        address: ActorAddress,
        broker: B,
        system: ActorSystem<M, B>,
        self_sender: UnboundedMailboxSender<M, AtomicMetrics>,
    ) -> Self {
        let path = ActorPath::from_address(&address);
        Self {
            id: *address.id(),
            address,
            path,
            created_at: Utc::now(), // §3.2
            broker,
            system,
            self_sender,
            control: CellControl::new(),
        }
    }

    /// Create a child context for an actor spawned under `parent_path`.
    pub(crate) fn new_child(
        address: ActorAddress,
        broker: B,
        system: ActorSystem<M, B>,
        self_sender: UnboundedMailboxSender<M, AtomicMetrics>,
        parent_path: &ActorPath,
        child_name: impl Into<String>,
    ) -> Self {
        let path = parent_path.child(child_name);
        Self {
            id: *address.id(),
            address,
            path,
            created_at: Utc::now(), // §3.2
            broker,
            system,
            self_sender,
            control: CellControl::new(),
        }
    }

    /// A ref back to this actor, sharable with other actors.
    pub fn self_ref(&self) -> ActorRef<M> {
        ActorRef::new(self.path.clone(), self.self_sender.clone())
    }

    /// Get the actor's flat address.
    pub fn address(&self) -> &ActorAddress {
        &self.address
    }

    /// Get the actor's hierarchical path.
    pub fn path(&self) -> &ActorPath {
        &self.path
    }

    /// Get the actor's ID.
    pub fn id(&self) -> &ActorId {
        &self.id
    }

    /// Get the actor's creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Access the injected message broker.
    pub fn broker(&self) -> &B {
        &self.broker
    }

    /// Access the owning actor system.
    pub fn system(&self) -> &ActorSystem<M, B> {
        &self.system
    }

    /// Paths of children spawned via [`Self::spawn_child`].
    pub fn children(&self) -> Vec<ActorPath> {
        self.control.children()
    }

    /// This cell's control block, for crate-internal wiring (watch
    /// registration, termination notification).
    pub(crate) fn control(&self) -> &CellControl {
        &self.control
    }

    /// Start watching `target` (spec.md §4.3/§4.4 watch semantics).
    ///
    /// Registers with the owning [`ActorSystem`]'s path registry so the
    /// target cell's [`CellControl`] gains this path in its `watchedBy` set;
    /// when that cell terminates it calls `sink`, which for a raw
    /// low-level [`Actor`] is a no-op (this message type `M` has no `Signal`
    /// variant to embed a `Terminated` notification in) — low-level actors
    /// get the `watching`/`watchedBy` bookkeeping but no delivery.
    /// [`crate::actor::Behavior`]-driven actors get real delivery through
    /// [`crate::actor::behavior::BehaviorContext::watch`], which builds a
    /// sink that posts back into their own mailbox.
    pub fn watch(&mut self, target: ActorPath)
    where
        M: serde::Serialize,
        B: Clone + Send + Sync + 'static,
    {
        self.control.watch(target.clone());
        self.system
            .watch_path(self.path.clone(), target, std::sync::Arc::new(|_, _| {}));
    }

    /// Stop watching `target`.
    pub fn unwatch(&mut self, target: &ActorPath)
    where
        M: serde::Serialize,
        B: Clone + Send + Sync + 'static,
    {
        self.control.unwatch(target);
        self.system.unwatch_path(&self.path, target);
    }

    /// Request that this actor stop after the current message finishes.
    pub fn stop_self(&mut self) {
        self.control.request_stop();
    }

    /// True if `stop_self` has been called.
    pub fn is_stop_requested(&self) -> bool {
        self.control.stop_requested()
    }

    /// Spawn a child actor under this context's path.
    ///
    /// The child is registered with the owning system exactly like a
    /// top-level actor (it shares the same mailbox/broker machinery); the
    /// only difference is that its [`ActorPath`] is nested under this
    /// context's path and it is tracked as a child for introspection and
    /// `stop_self` cascading.
    pub async fn spawn_child<A>(
        &mut self,
        name: impl Into<String>,
        actor: A,
    ) -> Result<ActorAddress, SystemError>
    where
        M: serde::Serialize,
        B: Clone + Send + Sync + 'static,
        A: Actor<Message = M> + Send + 'static,
    {
        let name = name.into();
        let address = self
            .system
            .spawn()
            .with_name(name.clone())
            .spawn(actor)
            .await?;
        self.control.record_child(name, self.path.child(address.name().unwrap_or("child")));
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::in_memory::InMemoryMessageBroker;
    use crate::message::MessagePriority;
    use crate::system::SystemConfig;

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

    fn build_context() -> ActorContext<TestMessage, InMemoryMessageBroker<TestMessage>> {
        let broker = InMemoryMessageBroker::<TestMessage>::new();
        let system = ActorSystem::new(SystemConfig::default(), broker.clone());
        let address = ActorAddress::named("ctx-test");
        let (_, sender) = crate::mailbox::UnboundedMailbox::<TestMessage, _>::new();
        ActorContext::new(address, broker, system, sender)
    }

    #[test]
    fn test_context_creation() {
        let ctx = build_context();
        assert_eq!(ctx.address().name(), Some("ctx-test"));
        assert_eq!(ctx.path().name(), Some("ctx-test"));
    }

    #[test]
    fn test_context_id_matches_address() {
        let ctx = build_context();
        assert_eq!(ctx.id(), ctx.address().id());
    }

    #[test]
    fn test_watch_unwatch() {
        let mut ctx = build_context();
        let target = ActorPath::root().child("service");
        ctx.watch(target.clone());
        assert!(ctx.control.is_watching(&target));
        ctx.unwatch(&target);
        assert!(!ctx.control.is_watching(&target));
    }

    #[test]
    fn test_stop_self() {
        let mut ctx = build_context();
        assert!(!ctx.is_stop_requested());
        ctx.stop_self();
        assert!(ctx.is_stop_requested());
    }

    #[tokio::test]
    async fn test_spawn_child_tracks_child_path() {
        let mut ctx = build_context();

        struct ChildActor;
        #[async_trait::async_trait]
        impl Actor for ChildActor {
            type Message = TestMessage;
            type Error = std::io::Error;

            async fn handle_message<B: MessageBroker<Self::Message>>(
                &mut self,
                _message: Self::Message,
                _context: &mut ActorContext<Self::Message, B>,
            ) -> Result<(), Self::Error> {
                Ok(())
            }
        }

        let address = ctx.spawn_child("child-1", ChildActor).await.unwrap();
        assert_eq!(address.name(), Some("child-1"));
        assert_eq!(ctx.children().len(), 1);
    }
}
