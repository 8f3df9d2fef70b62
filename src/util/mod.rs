//! Utility types and helpers for the actor system

pub mod ids;
pub mod path;
pub mod serde_helpers;

pub use ids::{ActorAddress, ActorId, MessageId};
pub use path::{next_incarnation_uid, ActorPath};
pub use serde_helpers::duration_serde;
