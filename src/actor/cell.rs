//! Per-actor cell bookkeeping shared between a running actor and its context.
//!
//! `CellControl` is the lightweight, `Message`-independent half of an actor
//! cell: child tracking, watch registrations and a stop flag. It is cheap to
//! clone (everything is `Arc`-backed) so [`crate::actor::ActorContext`] can
//! hand copies to child contexts without extra generic parameters.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::DashMap;

// Layer 3: Internal module imports
use crate::util::ActorPath;

/// A callback invoked with a terminated cell's final path and incarnation
/// uid. Stored against the *watched* cell's `watched_by` entry for the
/// watcher whose path is the map key; `ActorSystem` resolves the target
/// cell by path and hands it this sink so delivery does not require the
/// registry to know anything about the watcher's own message type.
pub type WatchSink = Arc<dyn Fn(ActorPath, u64) + Send + Sync>;

/// Shared, `Message`-independent control block for a single actor cell.
///
/// Tracks the cell's children (for `stop_self` cascading and
/// introspection), the set of paths it is watching, the set of paths
/// watching *it* (§3 ActorCell invariant 5: `watching`/`watchedBy` are
/// symmetric), and whether it has asked to stop.
#[derive(Clone)]
pub struct CellControl {
    inner: Arc<CellControlInner>,
}

struct CellControlInner {
    children: DashMap<String, ActorPath>,
    watching: DashMap<ActorPath, ()>,
    watched_by: DashMap<ActorPath, WatchSink>,
    stop_requested: AtomicBool,
}

impl CellControl {
    /// Create an empty control block for a freshly spawned cell.
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(CellControlInner {
                children: DashMap::new(),
                watching: DashMap::new(),
                watched_by: DashMap::new(),
                stop_requested: AtomicBool::new(false),
            }),
        }
    }

    /// Record a newly spawned child under the given name.
    pub(crate) fn record_child(&self, name: impl Into<String>, path: ActorPath) {
        self.inner.children.insert(name.into(), path);
    }

    /// Forget a child, e.g. after it terminates.
    pub fn remove_child(&self, name: &str) {
        self.inner.children.remove(name);
    }

    /// Paths of all currently tracked children.
    pub fn children(&self) -> Vec<ActorPath> {
        self.inner
            .children
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Start watching `target` for termination.
    pub fn watch(&self, target: ActorPath) {
        self.inner.watching.insert(target, ());
    }

    /// Stop watching `target`.
    pub fn unwatch(&self, target: &ActorPath) {
        self.inner.watching.remove(target);
    }

    /// True if `target` is currently being watched.
    pub fn is_watching(&self, target: &ActorPath) -> bool {
        self.inner.watching.contains_key(target)
    }

    /// All paths currently being watched.
    pub fn watched(&self) -> Vec<ActorPath> {
        self.inner
            .watching
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Register `watcher` as observing this cell, delivering through `sink`
    /// once this cell terminates. The other half of the `watching`/
    /// `watchedBy` symmetry: called on the *target* cell by
    /// `ActorSystem::watch_path` when some other cell calls `watch`.
    pub(crate) fn add_watcher(&self, watcher: ActorPath, sink: WatchSink) {
        self.inner.watched_by.insert(watcher, sink);
    }

    /// Stop watching this cell from `watcher`'s side.
    pub(crate) fn remove_watcher(&self, watcher: &ActorPath) {
        self.inner.watched_by.remove(watcher);
    }

    /// Paths currently watching this cell.
    pub fn watched_by(&self) -> Vec<ActorPath> {
        self.inner
            .watched_by
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Notify every registered watcher that this cell terminated at `path`
    /// with incarnation `uid`, then clear the set (each watcher is notified
    /// at most once, per spec.md §4.3/P5).
    pub(crate) fn notify_watchers(&self, path: ActorPath, uid: u64) {
        for entry in self.inner.watched_by.iter() {
            (entry.value())(path.clone(), uid);
        }
        self.inner.watched_by.clear();
    }

    /// Request that the owning cell stop after the current message.
    pub fn request_stop(&self) {
        self.inner.stop_requested.store(true, Ordering::Release);
    }

    /// True if a stop has been requested.
    pub fn stop_requested(&self) -> bool {
        self.inner.stop_requested.load(Ordering::Acquire)
    }
}

impl Default for CellControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_cell_has_no_children_or_watches() {
        let cell = CellControl::new();
        assert!(cell.children().is_empty());
        assert!(cell.watched().is_empty());
        assert!(!cell.stop_requested());
    }

    #[test]
    fn test_record_and_remove_child() {
        let cell = CellControl::new();
        let path = ActorPath::root().child("worker");
        cell.record_child("worker", path);
        assert_eq!(cell.children().len(), 1);
        cell.remove_child("worker");
        assert!(cell.children().is_empty());
    }

    #[test]
    fn test_watch_and_unwatch() {
        let cell = CellControl::new();
        let target = ActorPath::root().child("service");
        cell.watch(target.clone());
        assert!(cell.is_watching(&target));
        cell.unwatch(&target);
        assert!(!cell.is_watching(&target));
    }

    #[test]
    fn test_stop_request() {
        let cell = CellControl::new();
        assert!(!cell.stop_requested());
        cell.request_stop();
        assert!(cell.stop_requested());
    }

    #[test]
    fn test_clone_shares_state() {
        let cell = CellControl::new();
        let clone = cell.clone();
        clone.request_stop();
        assert!(cell.stop_requested());
    }

    #[test]
    fn test_watched_by_symmetry() {
        let target = CellControl::new();
        let watcher_path = ActorPath::root().child("watcher");
        assert!(target.watched_by().is_empty());
        target.add_watcher(watcher_path.clone(), Arc::new(|_, _| {}));
        assert_eq!(target.watched_by(), vec![watcher_path.clone()]);
        target.remove_watcher(&watcher_path);
        assert!(target.watched_by().is_empty());
    }

    #[test]
    fn test_notify_watchers_invokes_every_sink_once() {
        use std::sync::atomic::AtomicUsize;

        let target = CellControl::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let watcher_a = ActorPath::root().child("a");
        let watcher_b = ActorPath::root().child("b");

        let calls_a = calls.clone();
        target.add_watcher(
            watcher_a,
            Arc::new(move |_, _| {
                calls_a.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let calls_b = calls.clone();
        target.add_watcher(
            watcher_b,
            Arc::new(move |_, _| {
                calls_b.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let terminated = ActorPath::root().child("target");
        target.notify_watchers(terminated.clone(), terminated.uid());

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(target.watched_by().is_empty(), "watchers drained after notification");
    }
}
