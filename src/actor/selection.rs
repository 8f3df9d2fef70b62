//! Lazy path-based actor lookup (spec.md §4.4 Selection).

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use chrono::Utc;
use thiserror::Error;

// Layer 3: Internal module imports
use crate::broker::MessageBroker;
use crate::event_bus::EventBus;
use crate::message::Message;
use crate::monitoring::DeadLetterEvent;
use crate::system::ActorSystem;
use crate::util::ActorPath;

/// Failure modes for [`Selection::tell`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// No live cell occupies the path, or a segment on the way to it does
    /// not; `dead_at` is the path up to and including the first dead
    /// segment, counted from the root.
    #[error("selection {0:?} has a dead segment")]
    DeadSegment(String),
    /// Delivery to the resolved actor failed (its mailbox is closed).
    #[error("selection {0:?} resolved but delivery failed")]
    DeliveryFailed(String),
}

/// An anonymous, lazily-resolved handle to whatever actor currently occupies
/// a hierarchical path.
///
/// Built by [`ActorSystem::select`]. Unlike [`crate::actor::ActorRef`], a
/// `Selection` does not pin a specific incarnation: every [`Selection::tell`]
/// call re-walks the live cell tree from the root, so it keeps working
/// across restarts that land a new incarnation at the same path. Dead
/// segments are reported to the dead-letter stream instead of silently
/// dropped (spec.md §4.4 "Dead segments deliver to the dead-letter stream").
pub struct Selection<M: Message, B: MessageBroker<M>> {
    system: ActorSystem<M, B>,
    segments: Vec<String>,
    dead_letters: Option<EventBus>,
}

impl<M: Message + serde::Serialize, B: MessageBroker<M> + Clone + Send + Sync + 'static>
    Selection<M, B>
{
    pub(crate) fn new(system: ActorSystem<M, B>, segments: Vec<String>) -> Self {
        Self {
            system,
            segments,
            dead_letters: None,
        }
    }

    /// Attach an [`EventBus`] that dead segments and delivery failures are
    /// reported to as [`DeadLetterEvent`]s.
    pub fn with_dead_letters(mut self, bus: EventBus) -> Self {
        self.dead_letters = Some(bus);
        self
    }

    fn path_string(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    fn report_dead_letter(&self, reason: String) {
        if let Some(bus) = &self.dead_letters {
            bus.publish_dead_letter(DeadLetterEvent {
                timestamp: Utc::now(),
                message_type: M::MESSAGE_TYPE.to_string(),
                recipient: Some(self.path_string()),
                reason,
            });
        }
    }

    /// Re-resolve the path against the live cell tree and forward `message`
    /// if it currently resolves.
    pub async fn tell(&self, message: M) -> Result<(), SelectionError> {
        match self.system.resolve_selection(&self.segments) {
            Ok(target) => target.tell(message).await.map_err(|err| {
                let reason = err.to_string();
                self.report_dead_letter(reason.clone());
                SelectionError::DeliveryFailed(reason)
            }),
            Err(dead_at) => {
                let dead_path = format!("/{}", self.segments[..=dead_at].join("/"));
                self.report_dead_letter(format!("dead segment at {dead_path}"));
                Err(SelectionError::DeadSegment(dead_path))
            }
        }
    }

    /// The path this selection resolves, as given to [`ActorSystem::select`].
    pub fn path(&self) -> ActorPath {
        ActorPath::new(self.segments.clone())
    }
}
