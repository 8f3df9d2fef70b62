//! Hierarchical actor paths with incarnation tracking.
//!
//! `ActorPath` sits alongside [`crate::util::ActorAddress`] rather than replacing it:
//! the broker/registry layer is keyed by `ActorAddress` throughout, while the newer
//! supervision-tree-aware modules (behavior, ask, receptionist, router, topic,
//! sharding) need a hierarchical name plus an incarnation identifier to tell a
//! restarted actor apart from the one it replaced.

// Layer 1: Standard library imports
use std::fmt::{self, Display};
use std::sync::atomic::{AtomicU64, Ordering};

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Layer 3: Internal module imports
use crate::util::ActorAddress;

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh, process-wide unique incarnation identifier.
///
/// Used to distinguish a restarted actor occupying the same path from the
/// incarnation that preceded it (mirrors the Pekko/Akka notion of a path's
/// "uid").
pub fn next_incarnation_uid() -> u64 {
    NEXT_UID.fetch_add(1, Ordering::Relaxed)
}

/// A hierarchical, incarnation-stamped actor path.
///
/// A path is a sequence of named segments from the root (e.g. `/user/parent/child`)
/// plus a `uid` that changes every time a new incarnation is created at that
/// position in the tree. Two `ActorPath`s are equal only if both the segments
/// and the uid match, so a stale reference to a terminated actor does not
/// silently resolve to its successor.
///
/// # Examples
///
/// ```rust
/// use airssys_rt::util::ActorPath;
///
/// let root = ActorPath::root();
/// let child = root.child("worker");
/// assert_eq!(child.to_string().starts_with("/worker#"), true);
/// assert_ne!(root.child("worker"), child); // distinct incarnations
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorPath {
    segments: Vec<String>,
    uid: u64,
}

impl ActorPath {
    /// The root path, with no segments and a fixed `uid` of 0.
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
            uid: 0,
        }
    }

    /// Build a path from explicit segments, allocating a fresh incarnation uid.
    pub fn new(segments: Vec<String>) -> Self {
        Self {
            segments,
            uid: next_incarnation_uid(),
        }
    }

    /// Derive a path from a flat [`ActorAddress`], using its name (or a
    /// synthesized anonymous label) as the single top-level segment.
    pub fn from_address(address: &ActorAddress) -> Self {
        let label = match address.name() {
            Some(name) => name.to_string(),
            None => format!("anon-{}", address.id()),
        };
        Self::new(vec![label])
    }

    /// Create a child path one level below this one, with a new incarnation uid.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        Self {
            segments,
            uid: next_incarnation_uid(),
        }
    }

    /// The parent path, or `None` if this is the root.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self { segments, uid: 0 })
    }

    /// The path segments from the root.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The leaf (last) segment's name, if any.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// This path's incarnation uid.
    pub fn uid(&self) -> u64 {
        self.uid
    }

    /// True if this is the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// A fresh path under `/temp/`, for an ephemeral actor (spec.md §4.4 ask
    /// pattern: the reply-collecting actor "never appears in supervision
    /// trees as a durable child; it is under the system guardian").
    pub fn temp() -> Self {
        Self::root().child("temp").child(Uuid::new_v4().to_string())
    }
}

impl PartialEq for ActorPath {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments && self.uid == other.uid
    }
}

impl Eq for ActorPath {}

impl std::hash::Hash for ActorPath {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.segments.hash(state);
        self.uid.hash(state);
    }
}

impl Display for ActorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}#{}", self.segments.join("/"), self.uid)
    }
}
