//! Bridges real spawned actors into the `Child`/`SupervisorNode` contract.
//!
//! `ActorCellChild` is the adapter the module-level docs on [`super::traits`]
//! describe as "explicitly implement `Child` for supervision" — except it
//! is generic over any `Actor<Message = M>` instead of being hand-written
//! per actor type. It owns a factory so `start()` (and a later
//! `SupervisorNode::restart_child`) can rebuild the actor from scratch with
//! a fresh mailbox and task, giving it a fresh incarnation the same way
//! `ActorSystem::spawn` would.

// Layer 1: Standard library imports
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;

// Layer 3: Internal module imports
use super::error::SupervisorError;
use super::node::SupervisorNode;
use super::traits::{Child, Supervisor, SupervisionStrategy};
use super::types::{ChildHealth, ChildId, SupervisionDecision};
use crate::actor::{Actor, ActorRef};
use crate::broker::MessageBroker;
use crate::message::Message;
use crate::monitoring::{Monitor, SupervisionEvent};
use crate::system::{ActorSystem, CellOutcome, SystemError};
use crate::util::ActorAddress;

/// A `Child` wrapper around a real spawned [`Actor`].
///
/// Built from an `ActorSystem` and a factory closure rather than a single
/// instance: `start()` spawns a fresh actor from the factory, and a restart
/// (`stop()` then `start()` again, driven by `SupervisorNode::restart_child`)
/// produces a genuinely new incarnation rather than reusing the failed one.
pub struct ActorCellChild<A, M, B>
where
    A: Actor<Message = M> + Send + 'static,
    M: Message + serde::Serialize,
    B: MessageBroker<M> + Clone + Send + Sync + 'static,
{
    system: ActorSystem<M, B>,
    factory: Arc<dyn Fn() -> A + Send + Sync>,
    name: Option<String>,
    address: Option<ActorAddress>,
    handle: Option<JoinHandle<()>>,
    outcome_rx: Option<watch::Receiver<CellOutcome>>,
    actor_ref: Option<ActorRef<M>>,
    _marker: PhantomData<A>,
}

impl<A, M, B> ActorCellChild<A, M, B>
where
    A: Actor<Message = M> + Send + 'static,
    M: Message + serde::Serialize,
    B: MessageBroker<M> + Clone + Send + Sync + 'static,
{
    /// Build a supervisable child. `factory` is called once per `start()`
    /// (including every restart), so it must produce the actor's initial
    /// state from scratch rather than carrying state across failures.
    pub fn new(system: ActorSystem<M, B>, name: Option<String>, factory: impl Fn() -> A + Send + Sync + 'static) -> Self {
        Self {
            system,
            factory: Arc::new(factory),
            name,
            address: None,
            handle: None,
            outcome_rx: None,
            actor_ref: None,
            _marker: PhantomData,
        }
    }

    /// The address of the currently running incarnation, if started.
    pub fn address(&self) -> Option<&ActorAddress> {
        self.address.as_ref()
    }

    /// A ref to the currently running incarnation's mailbox, if started.
    ///
    /// Each restart produces a new incarnation with a fresh mailbox, so a
    /// ref obtained before a restart becomes stale; re-fetch it afterwards.
    pub fn actor_ref(&self) -> Option<&ActorRef<M>> {
        self.actor_ref.as_ref()
    }

    /// A clone of this incarnation's outcome channel, used by
    /// [`supervise_actor`] to detect restart/escalate requests the cell
    /// reported but could not carry out itself.
    pub fn outcome(&self) -> Option<watch::Receiver<CellOutcome>> {
        self.outcome_rx.clone()
    }
}

#[async_trait]
impl<A, M, B> Child for ActorCellChild<A, M, B>
where
    A: Actor<Message = M> + Send + 'static,
    M: Message + serde::Serialize,
    B: MessageBroker<M> + Clone + Send + Sync + 'static,
{
    type Error = SystemError;

    async fn start(&mut self) -> Result<(), Self::Error> {
        let actor = (self.factory)();
        let (address, handle, outcome_rx, mailbox_sender) =
            self.system.spawn_supervised(actor, self.name.clone()).await?;
        self.actor_ref = Some(ActorRef::new(address.clone(), mailbox_sender));
        self.address = Some(address);
        self.handle = Some(handle);
        self.outcome_rx = Some(outcome_rx);
        Ok(())
    }

    async fn stop(&mut self, timeout: Duration) -> Result<(), Self::Error> {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = tokio::time::timeout(timeout, handle).await;
        }
        self.address = None;
        self.actor_ref = None;
        self.outcome_rx = None;
        Ok(())
    }

    async fn health_check(&self) -> ChildHealth {
        match self.outcome_rx.as_ref().map(|rx| *rx.borrow()) {
            Some(CellOutcome::Running) | None => ChildHealth::Healthy,
            Some(CellOutcome::Stopped) => ChildHealth::Failed("actor stopped".to_string()),
            Some(CellOutcome::Failed) => {
                ChildHealth::Failed("actor reported an unrecoverable error".to_string())
            }
        }
    }
}

/// Whether a supervised actor is still under supervision after one
/// [`supervise_actor_once`] cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuperviseOutcome {
    /// The child (or, after `OneForAll`/`RestForOne`, its surviving
    /// siblings) is running again; keep supervising.
    Continuing,
    /// This child was stopped (gracefully, or by `StopChild`/`StopAll`)
    /// and is no longer under supervision.
    Stopped,
}

/// Waits for one terminal report from an actor supervised through
/// [`ActorCellChild`] and reacts to it.
///
/// When the cell reports [`CellOutcome::Stopped`] (clean mailbox drain, or
/// `on_error` returning `Stop`), this returns `Ok(Stopped)` directly. When
/// it reports [`CellOutcome::Failed`] (`on_error` returned `Restart` or
/// `Escalate` — something this generic loop cannot carry out itself),
/// this asks the strategy for a decision through
/// `Supervisor::handle_child_error` and carries it out: restarting the
/// failed child (and any `OneForAll`/`RestForOne` siblings it names),
/// stopping it, or propagating `SupervisorError::Escalated`.
pub async fn supervise_actor_once<S, A, M, B, Mon>(
    supervisor: &mut SupervisorNode<S, ActorCellChild<A, M, B>, Mon>,
    id: ChildId,
) -> Result<SuperviseOutcome, SupervisorError>
where
    S: SupervisionStrategy + Send + Sync,
    A: Actor<Message = M> + Send + 'static,
    M: Message + serde::Serialize,
    B: MessageBroker<M> + Clone + Send + Sync + 'static,
    Mon: Monitor<SupervisionEvent> + Send + Sync + 'static,
{
    let mut rx = match supervisor.get_child(&id).and_then(|h| h.child().outcome()) {
        Some(rx) => rx,
        None => return Ok(SuperviseOutcome::Stopped),
    };

    if *rx.borrow() == CellOutcome::Running && rx.changed().await.is_err() {
        // Sender dropped (task aborted from outside) without reporting.
        return Ok(SuperviseOutcome::Stopped);
    }

    let outcome = *rx.borrow();
    match outcome {
        CellOutcome::Running => Ok(SuperviseOutcome::Continuing),
        CellOutcome::Stopped => Ok(SuperviseOutcome::Stopped),
        CellOutcome::Failed => {
            let decision = supervisor
                .handle_child_error(&id, Box::new(ActorFailed))
                .await;

            match decision {
                SupervisionDecision::RestartChild(cid) => {
                    supervisor.restart_child(&cid).await?;
                    Ok(SuperviseOutcome::Continuing)
                }
                SupervisionDecision::RestartAll(ids) | SupervisionDecision::RestartSubset(ids) => {
                    for cid in ids {
                        supervisor.restart_child(&cid).await?;
                    }
                    Ok(SuperviseOutcome::Continuing)
                }
                SupervisionDecision::StopChild(cid) => {
                    supervisor.stop_child(&cid).await?;
                    if cid == id {
                        Ok(SuperviseOutcome::Stopped)
                    } else {
                        Ok(SuperviseOutcome::Continuing)
                    }
                }
                SupervisionDecision::StopAll => {
                    let ids: Vec<ChildId> = supervisor.child_ids().to_vec();
                    for cid in ids {
                        let _ = supervisor.stop_child(&cid).await;
                    }
                    Ok(SuperviseOutcome::Stopped)
                }
                SupervisionDecision::Escalate(reason) => Err(SupervisorError::Escalated {
                    id: id.to_string(),
                    reason,
                }),
            }
        }
    }
}

/// Drives automatic restarts for one actor until it stops for good.
///
/// Repeatedly calls [`supervise_actor_once`] until it reports
/// [`SuperviseOutcome::Stopped`] or returns an error (restart budget
/// exhausted, or the strategy escalated).
pub async fn supervise_actor<S, A, M, B, Mon>(
    supervisor: &mut SupervisorNode<S, ActorCellChild<A, M, B>, Mon>,
    id: ChildId,
) -> Result<(), SupervisorError>
where
    S: SupervisionStrategy + Send + Sync,
    A: Actor<Message = M> + Send + 'static,
    M: Message + serde::Serialize,
    B: MessageBroker<M> + Clone + Send + Sync + 'static,
    Mon: Monitor<SupervisionEvent> + Send + Sync + 'static,
{
    loop {
        match supervise_actor_once(supervisor, id.clone()).await? {
            SuperviseOutcome::Continuing => continue,
            SuperviseOutcome::Stopped => return Ok(()),
        }
    }
}

/// Placeholder error passed to `handle_child_error` for an actor failure.
///
/// The real error produced by `Actor::handle_message`/`on_error` is not
/// `Send`-threaded out of the dispatch task (it is consumed by `on_error`
/// inside the task itself, see `ActorSystem::spawn_actor_task_observed`);
/// this stands in for it since `SupervisionStrategy::determine_decision`
/// only inspects the failed child's id, not the error value.
#[derive(Debug)]
struct ActorFailed;

impl std::fmt::Display for ActorFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "supervised actor reported an unrecoverable error")
    }
}

impl std::error::Error for ActorFailed {}
