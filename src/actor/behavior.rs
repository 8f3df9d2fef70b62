//! Akka/Pekko-style `Behavior<M>` layered on top of the low-level [`Actor`] trait.
//!
//! `Actor` stays the lifecycle-hook contract (`pre_start`/`handle_message`/
//! `post_stop`/`on_error`); `Behavior<M>` is the higher-level `receive`/
//! `on_signal` surface spec.md §4.2 asks for, and [`BehaviorActor`] is the
//! adapter that drives one from the other.

// Layer 1: Standard library imports
use std::fmt;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::actor::actor_ref::ActorRef;
use crate::actor::cell::{CellControl, WatchSink};
use crate::actor::signal::Signal;
use crate::actor::{Actor, ActorContext, ErrorAction};
use crate::broker::MessageBroker;
use crate::message::{Message, MessagePriority};
use crate::util::ActorPath;

/// The message type carried by every `Behavior`-driven actor's mailbox.
///
/// Wrapping user messages and [`Signal`]s in one enum lets signals travel
/// through the same ordered mailbox as user traffic, instead of needing a
/// side channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BehaviorEnvelope<M: Message> {
    /// A message sent by user code via [`ActorRef::tell`] or the broker.
    User(M),
    /// A lifecycle or watch notification generated by the runtime.
    System(Signal),
}

impl<M: Message> Message for BehaviorEnvelope<M> {
    const MESSAGE_TYPE: &'static str = "behavior-envelope";

    fn priority(&self) -> MessagePriority {
        match self {
            Self::System(_) => MessagePriority::Critical,
            Self::User(message) => message.priority(),
        }
    }
}

/// The non-generic context handed to a [`Behavior`] on every `receive`/`on_signal` call.
///
/// Deliberately does not carry a `MessageBroker` type parameter: `Behavior`'s
/// methods must stay object-safe so `Directive::Become` can hold a
/// `Box<dyn Behavior<M>>` (the `dyn` exception spec §4.2/ADR recorded in
/// `DESIGN.md`), and a generic broker parameter on a trait method would
/// rule that out. Messaging goes through [`ActorRef`] (itself
/// broker-independent) rather than the injected broker directly.
pub struct BehaviorContext<M: Message> {
    path: ActorPath,
    self_ref: ActorRef<BehaviorEnvelope<M>>,
    control: CellControl,
    register_watch: Arc<dyn Fn(ActorPath, WatchSink) -> bool + Send + Sync>,
    unregister_watch: Arc<dyn Fn(&ActorPath) + Send + Sync>,
}

impl<M: Message> BehaviorContext<M> {
    pub(crate) fn new(
        path: ActorPath,
        self_ref: ActorRef<BehaviorEnvelope<M>>,
        control: CellControl,
        register_watch: Arc<dyn Fn(ActorPath, WatchSink) -> bool + Send + Sync>,
        unregister_watch: Arc<dyn Fn(&ActorPath) + Send + Sync>,
    ) -> Self {
        Self {
            path,
            self_ref,
            control,
            register_watch,
            unregister_watch,
        }
    }

    /// This actor's hierarchical path.
    pub fn path(&self) -> &ActorPath {
        &self.path
    }

    /// A ref to this actor, for sharing with other actors.
    pub fn self_ref(&self) -> &ActorRef<BehaviorEnvelope<M>> {
        &self.self_ref
    }

    /// Start watching `target` (spec.md §4.3). Registers with the owning
    /// `ActorSystem`'s path registry so a `Signal::Terminated{path, uid}` is
    /// posted back into this actor's own mailbox (preserving its place in
    /// message ordering, spec.md §4.2) once `target` stops. A no-op if
    /// `target` is not (or no longer) a live cell in this system.
    pub fn watch(&mut self, target: ActorPath) {
        self.control.watch(target.clone());
        let self_ref = self.self_ref.clone();
        let sink: WatchSink = Arc::new(move |path, uid| {
            let _ = self_ref.try_tell(BehaviorEnvelope::System(Signal::Terminated { path, uid }));
        });
        (self.register_watch)(target, sink);
    }

    /// Stop watching `target`.
    pub fn unwatch(&mut self, target: &ActorPath) {
        self.control.unwatch(target);
        (self.unregister_watch)(target);
    }

    /// Request that this cell stop after the current signal/message returns.
    pub fn stop_self(&mut self) {
        self.control.request_stop();
    }

    /// True once `stop_self` has been called.
    pub fn is_stop_requested(&self) -> bool {
        self.control.stop_requested()
    }
}

/// The directive a [`Behavior`] returns after handling a message or signal.
///
/// Mirrors Akka/Pekko's `Behaviors` factory return values.
pub enum Directive<M: Message> {
    /// Keep the current behavior unchanged.
    Same,
    /// The message/signal was not handled; dead-letter it.
    Unhandled,
    /// Replace the current behavior with a new one.
    ///
    /// Boxing the successor is this codebase's one deliberate `dyn` usage
    /// (see `DESIGN.md`): swapping to an arbitrary new behavior is
    /// inherently an existential-type operation.
    Become(Box<dyn Behavior<M>>),
    /// Stop this actor.
    Stopped,
}

/// The typed, akka-style message-handling surface for an actor.
///
/// Implementations describe *what* to do with a message; the runtime (via
/// [`BehaviorActor`]) handles mailbox plumbing, error propagation, and
/// signal delivery.
#[async_trait]
pub trait Behavior<M: Message>: Send + 'static {
    /// Handle a user message, returning the next directive.
    async fn receive(&mut self, message: M, ctx: &mut BehaviorContext<M>) -> Directive<M>;

    /// Handle a lifecycle/watch signal. Default: unhandled (ignored).
    async fn on_signal(&mut self, signal: Signal, ctx: &mut BehaviorContext<M>) -> Directive<M> {
        let _ = (signal, ctx);
        Directive::Unhandled
    }
}

/// Raised when a [`Behavior`] leaves a [`Signal::Terminated`] unhandled
/// (spec.md §4.3 death-pact rule, §7 `DeathPactViolation`): watching another
/// actor without overriding `on_signal` to handle its `Terminated` means this
/// cell dies alongside it instead of silently ignoring the notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeathPactViolation {
    /// Path of the watcher that left `Terminated` unhandled.
    pub watcher: ActorPath,
    /// Path of the actor whose termination was not handled.
    pub terminated: ActorPath,
}

impl fmt::Display for DeathPactViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "death pact: {} did not handle Terminated({})",
            self.watcher, self.terminated
        )
    }
}

impl std::error::Error for DeathPactViolation {}

/// Adapts a [`Behavior`] into the low-level [`Actor`] trait so it can be
/// spawned through the ordinary `ActorSystem::spawn` path.
pub struct BehaviorActor<M: Message> {
    current: Box<dyn Behavior<M>>,
    control: CellControl,
}

impl<M: Message> BehaviorActor<M> {
    /// Wrap an initial behavior for spawning.
    pub fn new(behavior: Box<dyn Behavior<M>>) -> Self {
        Self {
            current: behavior,
            control: CellControl::new(),
        }
    }

    fn behavior_context<B: MessageBroker<BehaviorEnvelope<M>>>(
        &self,
        ctx: &ActorContext<BehaviorEnvelope<M>, B>,
    ) -> BehaviorContext<M>
    where
        M: serde::Serialize,
        B: Clone + Send + Sync + 'static,
    {
        let system = ctx.system().clone();
        let watcher_path = ctx.path().clone();
        let register_system = system.clone();
        let register_watcher_path = watcher_path.clone();
        let register_watch = Arc::new(move |target: ActorPath, sink: WatchSink| {
            register_system.watch_path(register_watcher_path.clone(), target, sink)
        });
        let unregister_watch = Arc::new(move |target: &ActorPath| {
            system.unwatch_path(&watcher_path, target);
        });
        BehaviorContext::new(
            ctx.path().clone(),
            ctx.self_ref(),
            self.control.clone(),
            register_watch,
            unregister_watch,
        )
    }

    fn apply_directive(&mut self, directive: Directive<M>) -> ErrorAction {
        match directive {
            Directive::Same | Directive::Unhandled => ErrorAction::Resume,
            Directive::Become(next) => {
                self.current = next;
                ErrorAction::Resume
            }
            Directive::Stopped => ErrorAction::Stop,
        }
    }
}

#[async_trait]
impl<M: Message + serde::Serialize> Actor for BehaviorActor<M> {
    type Message = BehaviorEnvelope<M>;
    type Error = DeathPactViolation;

    async fn pre_start<B: MessageBroker<Self::Message>>(
        &mut self,
        context: &mut ActorContext<Self::Message, B>,
    ) -> Result<(), Self::Error> {
        // Delivered once, before the first user message (spec.md §4.3
        // lifecycle table); a plain `Unhandled` here is not a death pact
        // (there is no watched actor to have failed the pact with yet).
        let mut bctx = self.behavior_context(context);
        let directive = self.current.on_signal(Signal::PreStart, &mut bctx).await;
        if bctx.is_stop_requested() {
            context.stop_self();
        }
        if let ErrorAction::Stop = self.apply_directive(directive) {
            context.stop_self();
        }
        Ok(())
    }

    async fn post_stop<B: MessageBroker<Self::Message>>(
        &mut self,
        context: &mut ActorContext<Self::Message, B>,
    ) -> Result<(), Self::Error> {
        let mut bctx = self.behavior_context(context);
        let _ = self.current.on_signal(Signal::PostStop, &mut bctx).await;
        Ok(())
    }

    async fn handle_message<B: MessageBroker<Self::Message>>(
        &mut self,
        message: Self::Message,
        context: &mut ActorContext<Self::Message, B>,
    ) -> Result<(), Self::Error> {
        let mut bctx = self.behavior_context(context);

        let directive = match message {
            BehaviorEnvelope::User(inner) => self.current.receive(inner, &mut bctx).await,
            BehaviorEnvelope::System(signal) => {
                let directive = self.current.on_signal(signal.clone(), &mut bctx).await;
                if matches!(directive, Directive::Unhandled)
                    && matches!(signal, Signal::Terminated { .. })
                {
                    let Signal::Terminated { path, .. } = signal else {
                        unreachable!()
                    };
                    return Err(DeathPactViolation {
                        watcher: bctx.path().clone(),
                        terminated: path,
                    });
                }
                directive
            }
        };

        if bctx.is_stop_requested() {
            context.stop_self();
        }

        match self.apply_directive(directive) {
            ErrorAction::Stop => context.stop_self(),
            _ => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::in_memory::InMemoryMessageBroker;
    use crate::mailbox::UnboundedMailbox;
    use crate::system::ActorSystem;
    use crate::system::SystemConfig;
    use crate::util::ActorAddress;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Ping;

    impl Message for Ping {
        const MESSAGE_TYPE: &'static str = "ping";
    }

    struct Counter {
        seen: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Behavior<Ping> for Counter {
        async fn receive(
            &mut self,
            _message: Ping,
            ctx: &mut BehaviorContext<Ping>,
        ) -> Directive<Ping> {
            let count = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
            if count >= 3 {
                ctx.stop_self();
                return Directive::Stopped;
            }
            Directive::Same
        }
    }

    fn build_context(
    ) -> ActorContext<BehaviorEnvelope<Ping>, InMemoryMessageBroker<BehaviorEnvelope<Ping>>> {
        let broker = InMemoryMessageBroker::<BehaviorEnvelope<Ping>>::new();
        let system = ActorSystem::new(SystemConfig::default(), broker.clone());
        let address = ActorAddress::named("counter");
        let (_, sender) = UnboundedMailbox::<BehaviorEnvelope<Ping>, _>::new();
        ActorContext::new(address, broker, system, sender)
    }

    #[tokio::test]
    async fn test_behavior_actor_processes_user_message() {
        let mut ctx = build_context();
        let seen = Arc::new(AtomicU32::new(0));
        let mut actor = BehaviorActor::new(Box::new(Counter { seen: seen.clone() }));

        actor
            .handle_message(BehaviorEnvelope::User(Ping), &mut ctx)
            .await
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(!ctx.is_stop_requested());
    }

    #[tokio::test]
    async fn test_behavior_directive_stopped_requests_context_stop() {
        let mut ctx = build_context();
        let seen = Arc::new(AtomicU32::new(2));
        let mut actor = BehaviorActor::new(Box::new(Counter { seen: seen.clone() }));

        actor
            .handle_message(BehaviorEnvelope::User(Ping), &mut ctx)
            .await
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 3);
        assert!(ctx.is_stop_requested());
    }

    struct SignalRecorder {
        seen: Arc<std::sync::Mutex<Vec<Signal>>>,
    }

    #[async_trait]
    impl Behavior<Ping> for SignalRecorder {
        async fn receive(&mut self, _message: Ping, _ctx: &mut BehaviorContext<Ping>) -> Directive<Ping> {
            Directive::Same
        }

        async fn on_signal(&mut self, signal: Signal, _ctx: &mut BehaviorContext<Ping>) -> Directive<Ping> {
            self.seen.lock().unwrap().push(signal);
            Directive::Same
        }
    }

    #[tokio::test]
    async fn test_pre_start_emits_signal_before_first_user_message() {
        let mut ctx = build_context();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut actor = BehaviorActor::new(Box::new(SignalRecorder { seen: seen.clone() }));

        actor.pre_start(&mut ctx).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_slice(), &[Signal::PreStart]);

        actor
            .handle_message(BehaviorEnvelope::User(Ping), &mut ctx)
            .await
            .unwrap();
        // `receive` doesn't record into `seen`, so PreStart is still the only
        // signal observed after the first user message is processed.
        assert_eq!(seen.lock().unwrap().as_slice(), &[Signal::PreStart]);
    }

    #[tokio::test]
    async fn test_unhandled_terminated_raises_death_pact_violation() {
        let mut ctx = build_context();
        let seen = Arc::new(AtomicU32::new(0));
        let mut actor = BehaviorActor::new(Box::new(Counter { seen }));
        let terminated_path = ActorPath::new(vec!["watched".to_string()]);

        let err = actor
            .handle_message(
                BehaviorEnvelope::System(Signal::Terminated {
                    path: terminated_path.clone(),
                    uid: terminated_path.uid(),
                }),
                &mut ctx,
            )
            .await
            .unwrap_err();

        assert_eq!(err.terminated, terminated_path);
        assert_eq!(err.watcher, *ctx.path());
    }

    struct WatchingCounter {
        child_path: ActorPath,
        terminated: Arc<std::sync::Mutex<Option<ActorPath>>>,
    }

    #[async_trait]
    impl Behavior<Ping> for WatchingCounter {
        async fn receive(&mut self, _message: Ping, _ctx: &mut BehaviorContext<Ping>) -> Directive<Ping> {
            Directive::Same
        }

        async fn on_signal(&mut self, signal: Signal, ctx: &mut BehaviorContext<Ping>) -> Directive<Ping> {
            match signal {
                Signal::PreStart => {
                    ctx.watch(self.child_path.clone());
                    Directive::Same
                }
                Signal::Terminated { path, .. } => {
                    *self.terminated.lock().unwrap() = Some(path);
                    Directive::Same
                }
                _ => Directive::Unhandled,
            }
        }
    }

    #[tokio::test]
    async fn test_watch_delivers_terminated_to_watcher_mailbox() {
        let broker = InMemoryMessageBroker::<BehaviorEnvelope<Ping>>::new();
        let system = ActorSystem::new(SystemConfig::default(), broker);

        let child_address = system
            .spawn()
            .with_name("watched-child")
            .spawn(BehaviorActor::new(Box::new(Counter {
                seen: Arc::new(AtomicU32::new(2)),
            })))
            .await
            .unwrap();
        let child_path = ActorPath::new(vec![child_address.name().unwrap().to_string()]);

        let terminated = Arc::new(std::sync::Mutex::new(None));
        let watcher = WatchingCounter {
            child_path: child_path.clone(),
            terminated: terminated.clone(),
        };
        system
            .spawn()
            .with_name("watcher")
            .spawn(BehaviorActor::new(Box::new(watcher)))
            .await
            .unwrap();

        // Give the watcher's `pre_start` a chance to register its watch
        // before the child is stopped below.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        // One more `Ping` pushes the child's internal counter to 3, at which
        // point `Counter::receive` returns `Directive::Stopped` and the cell
        // terminates, firing every registered `WatchSink` exactly once.
        let child_ref = system.select(&child_path);
        child_ref.tell(BehaviorEnvelope::User(Ping)).await.unwrap();

        let observed = tokio::time::timeout(std::time::Duration::from_secs(1), async {
            loop {
                if let Some(path) = terminated.lock().unwrap().clone() {
                    return path;
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("watcher should observe Terminated(child) well within the timeout");

        assert_eq!(observed, child_path);
    }
}
