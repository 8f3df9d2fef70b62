//! A cheap, cloneable handle for sending messages to a specific actor.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::mailbox::{AtomicMetrics, MailboxError, MailboxSender, UnboundedMailboxSender};
use crate::message::{Message, MessageEnvelope};
use crate::util::ActorPath;

/// A location-transparent handle to a running actor's mailbox.
///
/// `ActorRef` standardizes on [`UnboundedMailboxSender<M, AtomicMetrics>`] as
/// its concrete sender rather than adding a second sender-type generic
/// parameter: every higher-level module (receptionist, router, topic,
/// sharding) needs to store and compare refs across many different actor
/// types, and threading a sender-implementation generic through all of them
/// would outweigh the benefit of supporting other mailbox backends there.
/// Low-level code that needs a different backend continues to use
/// [`crate::mailbox::BoundedMailbox`] directly.
pub struct ActorRef<M: Message> {
    path: ActorPath,
    sender: UnboundedMailboxSender<M, AtomicMetrics>,
}

impl<M: Message> ActorRef<M> {
    /// Build a ref from a path and the mailbox sender half of its cell.
    pub fn new(path: ActorPath, sender: UnboundedMailboxSender<M, AtomicMetrics>) -> Self {
        Self { path, sender }
    }

    /// This actor's hierarchical path.
    pub fn path(&self) -> &ActorPath {
        &self.path
    }

    /// Send a message, following the mailbox's backpressure/TTL semantics.
    pub async fn tell(&self, message: M) -> Result<(), MailboxError> {
        self.sender.send(MessageEnvelope::new(message)).await
    }

    /// Send a message without awaiting backpressure.
    pub fn try_tell(&self, message: M) -> Result<(), MailboxError> {
        self.sender.try_send(MessageEnvelope::new(message))
    }

    /// Best-effort check for whether the target actor has stopped.
    ///
    /// Used by receptionist/topic/router/sharding to lazily prune stale refs
    /// instead of maintaining a push-based watch registration for every
    /// entry (spec.md §4.5/§4.7 "best-effort ... bounded lag").
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl<M: Message> Clone for ActorRef<M> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            sender: self.sender.clone(),
        }
    }
}

impl<M: Message> PartialEq for ActorRef<M> {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl<M: Message> Eq for ActorRef<M> {}

impl<M: Message> std::fmt::Debug for ActorRef<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRef").field("path", &self.path).finish()
    }
}
