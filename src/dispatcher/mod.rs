//! The dispatcher: per-cell scheduling state and the throughput-bounded,
//! priority-aware drain loop spec.md §4.1 describes.
//!
//! The crate's actual thread pool is tokio's own multi-threaded runtime
//! (`SystemConfig::worker_threads` feeds `Builder::worker_threads` at system
//! construction, see `system::builder`); tokio already multiplexes many
//! per-actor tasks over that pool and parks a task whose mailbox is empty,
//! which is the liveness half of §4.1's "Idle/Scheduled/Running" dance. What
//! tokio does *not* give us for free is (a) a bound on how many envelopes one
//! actor drains before yielding to its neighbors, and (b) system messages
//! jumping ahead of already-queued user messages. Both are implemented here
//! and used by every actor's run loop in `system::actor_system`, independent
//! of whether the actor is a raw [`crate::actor::Actor`] or a
//! [`crate::actor::Behavior`]-driven one (system signals get
//! [`crate::message::MessagePriority::Critical`] from
//! [`crate::actor::BehaviorEnvelope::priority`]).
//!
//! # Why a batch-reorder instead of a second channel
//!
//! A literal reading of §4.1 "system messages bypass user-message ordering
//! via a separate priority lane" suggests two channels. That is a legitimate
//! design but doubles every mailbox's plumbing (two senders, two capacities,
//! two backpressure stories) for a guarantee this crate can get more cheaply:
//! [`drain_prioritized`] pulls up to `throughput` envelopes that are already
//! sitting in the single mailbox (one blocking `recv`, then non-blocking
//! `try_recv` until empty or the throughput cap), then stable-sorts that
//! batch by descending [`crate::message::MessagePriority`]. Within one
//! throughput window this gives exactly the ordering §8 P3 asks for —
//! `Terminated` (Critical) enqueued while user messages are pending is
//! processed before the next *unprocessed* user message in that window —
//! without a second queue. The cost: a system message that arrives after a
//! full throughput batch has already been pulled waits for the next window,
//! same as it would behind a full user batch in the two-channel design once
//! that batch is already in flight.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU8, Ordering};

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::mailbox::{MailboxReceiver, TryRecvError};
use crate::message::{Message, MessageEnvelope};

/// A cell's scheduling state, per spec.md §3 "Mailbox: ... + a flag {Idle,
/// Scheduled, Closed}" generalized with the `Running` state §4.1's run loop
/// needs to make "at most one worker thread may dequeue from a given mailbox
/// at a time" (§3 invariant 1, P1) a checkable invariant rather than an
/// implicit consequence of single ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CellState {
    /// No drain task is running and the mailbox has nothing pending (or
    /// nothing queued a drain yet).
    Idle = 0,
    /// A drain task has been submitted but has not started running.
    Scheduled = 1,
    /// A drain task is actively processing envelopes.
    Running = 2,
    /// The cell has stopped; no further drain will be scheduled.
    Closed = 3,
}

impl From<u8> for CellState {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Scheduled,
            2 => Self::Running,
            _ => Self::Closed,
        }
    }
}

/// Atomic holder for a cell's [`CellState`], plus the reentrancy counter
/// property P1 asks test suites to verify directly: "a counter incremented
/// on entry and decremented on exit; any observation >1 is a failure".
///
/// One `CellSchedule` is owned by the task that runs a cell's drain loop; it
/// is not meant to be shared beyond that task and its spawner, so the CAS
/// traffic here is low (one transition per drain, not per message).
pub struct CellSchedule {
    state: AtomicU8,
    running_count: AtomicU8,
}

impl CellSchedule {
    /// A fresh schedule in the `Idle` state.
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(CellState::Idle as u8),
            running_count: AtomicU8::new(0),
        }
    }

    /// Current state, for diagnostics and tests.
    pub fn state(&self) -> CellState {
        CellState::from(self.state.load(Ordering::Acquire))
    }

    /// `Idle -> Scheduled`. Returns `false` (no-op) if already `Scheduled`
    /// or `Running`, matching §4.1 "no-op if already Scheduled".
    pub fn try_schedule(&self) -> bool {
        self.state
            .compare_exchange(
                CellState::Idle as u8,
                CellState::Scheduled as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// `Scheduled -> Running`. Called by the drain task right before it
    /// starts popping envelopes. Increments the reentrancy counter so P1
    /// can be asserted by test code driving two drain tasks concurrently
    /// against the same schedule.
    pub fn begin_run(&self) -> RunGuard<'_> {
        let _ = self.state.compare_exchange(
            CellState::Scheduled as u8,
            CellState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        let depth = self.running_count.fetch_add(1, Ordering::AcqRel) + 1;
        RunGuard {
            schedule: self,
            entry_depth: depth,
        }
    }

    /// `Running -> Idle` via CAS; on failure (a producer concurrently set
    /// `Scheduled` again because a new envelope arrived mid-drain) the
    /// caller should immediately re-run its drain rather than leaving the
    /// mailbox's pending message unobserved — this is §4.1's "producers
    /// never observe a permanent Idle-but-non-empty race".
    fn try_go_idle(&self) -> bool {
        self.state
            .compare_exchange(
                CellState::Running as u8,
                CellState::Idle as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Force the cell `Closed`; no further `try_schedule` will succeed.
    pub fn close(&self) {
        self.state.store(CellState::Closed as u8, Ordering::Release);
    }
}

impl Default for CellSchedule {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by [`CellSchedule::begin_run`]; dropping it attempts
/// the `Running -> Idle` transition and reports whether the caller must loop
/// again (mailbox was re-scheduled concurrently).
pub struct RunGuard<'a> {
    schedule: &'a CellSchedule,
    entry_depth: u8,
}

impl RunGuard<'_> {
    /// The reentrancy depth observed when this guard was created. A value
    /// `> 1` is exactly P1's failure condition.
    pub fn entry_depth(&self) -> u8 {
        self.entry_depth
    }

    /// Finish this run, attempting `Running -> Idle`. Returns `true` if the
    /// caller should schedule another drain immediately (a concurrent
    /// producer flipped the state back to `Scheduled` before this CAS ran).
    pub fn finish(self) -> bool {
        let needs_rerun = !self.schedule.try_go_idle();
        self.schedule.running_count.fetch_sub(1, Ordering::AcqRel);
        needs_rerun
    }
}

/// Pull up to `throughput` envelopes currently available in `mailbox`
/// (spec.md §4.1 "drains up to `throughput` envelopes"), then stable-sort
/// the batch by descending [`crate::message::MessagePriority`] so any
/// `Critical` system envelope in the batch runs first (§4.1's priority
/// lane, §8 P3).
///
/// Blocks on the first envelope (there is nothing to drain otherwise);
/// every subsequent envelope in the batch is pulled with `try_recv` so this
/// never waits for more messages than are already queued. Returns an empty
/// vector only when the mailbox is closed and drained.
pub async fn drain_prioritized<M, R>(
    mailbox: &mut R,
    throughput: usize,
) -> Vec<MessageEnvelope<M>>
where
    M: Message,
    R: MailboxReceiver<M>,
{
    let mut batch = Vec::with_capacity(throughput.max(1));

    match mailbox.recv().await {
        Some(envelope) => batch.push(envelope),
        None => return batch,
    }

    while batch.len() < throughput.max(1) {
        match mailbox.try_recv() {
            Ok(envelope) => batch.push(envelope),
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Closed) => break,
        }
    }

    // Stable sort: within equal priority, arrival (FIFO) order is preserved,
    // matching §3's invariant that same-sender traffic stays FIFO (P2) even
    // though priority reordering is cross-sender by nature.
    batch.sort_by(|a, b| b.priority.cmp(&a.priority));
    batch
}
