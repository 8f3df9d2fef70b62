//! Topic pub/sub: named, idempotently-created broadcast channels (spec.md §4.7).

mod error;
mod pubsub;
mod registry;

pub use error::TopicError;
pub use pubsub::{SharedTopic, Topic};
pub use registry::TopicRegistry;
