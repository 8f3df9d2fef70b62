//! Lifecycle signals delivered to `Behavior`-driven actors.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::util::ActorPath;

/// A system-originated signal delivered alongside user messages to a
/// [`crate::actor::Behavior`].
///
/// Signals carry the cell lifecycle and watch notifications spec.md §4.2/§4.4
/// describe: they are not user messages, but they travel through the same
/// mailbox so ordering relative to user messages is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    /// Delivered once, before the first user message, after `pre_start` hooks run.
    PreStart,

    /// Delivered once, after the cell has fully stopped processing.
    PostStop,

    /// Delivered before a supervised restart, carrying a description of the
    /// failure that triggered it.
    PreRestart {
        /// Human-readable cause of the restart (e.g. the failing error's `Display`).
        cause: String,
    },

    /// Delivered to a parent when one of its children terminates.
    ChildTerminated(ActorPath),

    /// Delivered to every watcher of `path` when that actor terminates.
    Terminated {
        /// Path of the actor that terminated.
        path: ActorPath,
        /// Incarnation uid of the actor that terminated, so a watcher can
        /// tell this apart from a successor occupying the same path.
        uid: u64,
    },
}
