//! The `ask` request/response pattern (spec.md §4.4).
//!
//! `ask` sends a message built around a fresh, anonymous reply-collecting
//! ref and resolves once exactly one reply arrives or a timeout elapses.
//! It is grounded in the crate's existing request/response shape (a
//! correlation id plus a one-shot completion, already sketched by
//! `broker::MessageBroker::request`) but is implemented here as a real
//! ephemeral mailbox living under `/temp/`, per spec.md §4.4, rather than a
//! broker-internal correlation map — that way `ask` works against any
//! `ActorRef<M>`, not only actors reachable through a particular broker.

mod error;

pub use error::AskError;

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use tokio::time::timeout as tokio_timeout;

// Layer 3: Internal module imports
use crate::actor::ActorRef;
use crate::mailbox::{AtomicMetrics, MailboxReceiver, UnboundedMailbox};
use crate::message::Message;
use crate::util::ActorPath;

/// Ask `target` for a reply, completing with `AskError::Timeout` if none
/// arrives within `timeout`.
///
/// `factory` builds the outgoing message from the ephemeral reply ref; this
/// mirrors Akka/Pekko's `ctx.ask` where the request carries a handle the
/// recipient replies to rather than relying on an implicit sender slot.
///
/// At-most-one reply is honored: the ephemeral mailbox is dropped as soon as
/// the first envelope arrives (or the timeout fires), so a second reply from
/// a misbehaving target is simply dead-lettered when its `tell` fails against
/// the now-closed mailbox.
///
/// # Examples
///
/// ```
/// use airssys_rt::ask::ask;
/// use airssys_rt::actor::ActorRef;
/// use airssys_rt::mailbox::UnboundedMailbox;
/// use airssys_rt::message::Message;
/// use airssys_rt::util::ActorPath;
/// use std::time::Duration;
///
/// #[derive(Debug, Clone)]
/// enum Echo { Ping(ActorRef<Pong>) }
/// impl Message for Echo {
///     const MESSAGE_TYPE: &'static str = "echo-ping";
/// }
/// #[derive(Debug, Clone)]
/// struct Pong;
/// impl Message for Pong {
///     const MESSAGE_TYPE: &'static str = "echo-pong";
/// }
///
/// # #[tokio::main]
/// # async fn main() {
/// let (mut mailbox, sender) = UnboundedMailbox::<Echo, _>::new();
/// let target = ActorRef::new(ActorPath::root().child("echo"), sender);
///
/// tokio::spawn(async move {
///     if let Some(envelope) = mailbox.recv().await {
///         if let Echo::Ping(reply_to) = envelope.payload {
///             let _ = reply_to.tell(Pong).await;
///         }
///     }
/// });
/// # use airssys_rt::mailbox::MailboxReceiver;
///
/// let reply = ask(&target, Duration::from_secs(1), Echo::Ping).await;
/// assert!(reply.is_ok());
/// # }
/// ```
pub async fn ask<M, R, F>(target: &ActorRef<M>, timeout: Duration, factory: F) -> Result<R, AskError>
where
    M: Message,
    R: Message,
    F: FnOnce(ActorRef<R>) -> M,
{
    let (mut mailbox, sender) = UnboundedMailbox::<R, AtomicMetrics>::new();
    let reply_path = ActorPath::temp();
    let reply_ref = ActorRef::new(reply_path, sender);

    let message = factory(reply_ref);
    target
        .tell(message)
        .await
        .map_err(|_| AskError::TargetStopped(target.path().clone()))?;

    match tokio_timeout(timeout, mailbox.recv()).await {
        Ok(Some(envelope)) => Ok(envelope.payload),
        Ok(None) => Err(AskError::TargetStopped(target.path().clone())),
        Err(_) => Err(AskError::Timeout {
            target: target.path().clone(),
            timeout,
        }),
    }
}
