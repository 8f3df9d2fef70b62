//! Process-wide event bus and the dead-letter stream (spec.md §4.9, §6).

mod bus;

pub use bus::{EventBus, DEFAULT_CHANNEL_CAPACITY};
