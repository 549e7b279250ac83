// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Tobias Sarnowski

//! Per-worker call context.
//!
//! Every worker thread that services an interface owns one entry of a
//! [`CallContextArena`]: the badge and selector of its in-flight call, its
//! reply right manager, and the interface's argument slots. The arena is
//! sized when the component is built and never allocates. Entries are
//! indexed by [`WorkerId`], not by thread address.
//!
//! A worker gains access to its entry by claiming it. The claim is exclusive
//! and lasts until the returned [`WorkerContext`] is dropped, so two workers
//! can never alias the same slots.

use crate::reply::{ReplyCapManager, ReplyStorage};
use core::cell::UnsafeCell;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use tether_abi::{Badge, MethodIndex, WorkerId};


// =============================================================================
// Errors
// =============================================================================

/// Error claiming a worker's context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClaimError {
    /// The worker index is beyond the arena's capacity.
    OutOfRange {
        /// The requested worker.
        worker: WorkerId,
        /// Number of entries in the arena.
        capacity: usize,
    },
    /// Another claim on this worker is still alive.
    AlreadyClaimed(WorkerId),
}

impl fmt::Display for ClaimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { worker, capacity } => {
                write!(f, "{worker} outside arena of {capacity} workers")
            }
            Self::AlreadyClaimed(worker) => write!(f, "{worker} already claimed"),
        }
    }
}

// =============================================================================
// Worker State
// =============================================================================

/// Call state of one worker.
#[derive(Debug)]
struct WorkerState<S> {
    worker: WorkerId,
    badge: Badge,
    selector: Option<MethodIndex>,
    reply: ReplyCapManager,
    slots: S,
}

struct Entry<S> {
    claimed: AtomicBool,
    state: UnsafeCell<WorkerState<S>>,
}

// =============================================================================
// Arena
// =============================================================================

/// Fixed table of per-worker call contexts.
pub struct CallContextArena<S, const WORKERS: usize> {
    entries: [Entry<S>; WORKERS],
}

// SAFETY: Each entry's state is only reached through a `WorkerContext`, and
// `claim` hands out at most one of those per entry at a time (guarded by the
// entry's `claimed` flag). The state moves between threads with the claim,
// so `S: Send` suffices.
unsafe impl<S: Send, const WORKERS: usize> Sync for CallContextArena<S, WORKERS> {}

impl<S: Default, const WORKERS: usize> CallContextArena<S, WORKERS> {
    const CAPACITY_OK: () = assert!(
        WORKERS > 0 && WORKERS <= WorkerId::MAX_WORKERS as usize,
        "arena must hold between 1 and MAX_WORKERS workers"
    );

    /// Creates an arena with default slots for every worker.
    #[must_use]
    pub fn new() -> Self {
        let () = Self::CAPACITY_OK;
        Self {
            entries: core::array::from_fn(|index| Entry {
                claimed: AtomicBool::new(false),
                state: UnsafeCell::new(WorkerState {
                    worker: worker_at(index),
                    badge: Badge::NONE,
                    selector: None,
                    reply: ReplyCapManager::new(),
                    slots: S::default(),
                }),
            }),
        }
    }
}

impl<S: Default, const WORKERS: usize> Default for CallContextArena<S, WORKERS> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, const WORKERS: usize> CallContextArena<S, WORKERS> {
    /// Number of workers the arena holds.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        WORKERS
    }

    /// Claims the context of `worker`.
    ///
    /// # Errors
    ///
    /// Fails if `worker` is out of range or already claimed.
    pub fn claim(&self, worker: WorkerId) -> Result<WorkerContext<'_, S>, ClaimError> {
        let entry = self
            .entries
            .get(worker.as_usize())
            .ok_or(ClaimError::OutOfRange {
                worker,
                capacity: WORKERS,
            })?;
        entry
            .claimed
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| ClaimError::AlreadyClaimed(worker))?;

        // SAFETY: The flag was false and is now ours, so no other reference
        // to this state exists until `WorkerContext::drop` clears it.
        let state = unsafe { &mut *entry.state.get() };
        Ok(WorkerContext {
            claimed: &entry.claimed,
            state,
        })
    }
}

impl<S, const WORKERS: usize> fmt::Debug for CallContextArena<S, WORKERS> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContextArena")
            .field("workers", &WORKERS)
            .finish_non_exhaustive()
    }
}

/// Worker identity of arena entry `index`.
fn worker_at(index: usize) -> WorkerId {
    // `index < WORKERS <= MAX_WORKERS`, so the fallback is unreachable.
    u16::try_from(index)
        .ok()
        .and_then(WorkerId::new)
        .unwrap_or(WorkerId::CONTROL)
}

// =============================================================================
// Worker Context
// =============================================================================

/// Exclusive access to one worker's call context.
pub struct WorkerContext<'a, S> {
    claimed: &'a AtomicBool,
    state: &'a mut WorkerState<S>,
}

impl<S> WorkerContext<'_, S> {
    /// The worker this context belongs to.
    #[must_use]
    pub fn worker(&self) -> WorkerId {
        self.state.worker
    }

    /// Badge of the call most recently received by this worker.
    #[must_use]
    pub fn sender_id(&self) -> Badge {
        self.state.badge
    }

    /// Selector of the in-flight call, once validated.
    #[must_use]
    pub fn selector(&self) -> Option<MethodIndex> {
        self.state.selector
    }

    /// Assigns the storage slot used to preserve reply rights.
    pub fn assign_reply_storage(&mut self, storage: ReplyStorage) {
        self.state.reply.set_storage(storage);
    }

    /// The reply right manager.
    #[must_use]
    pub fn reply(&self) -> &ReplyCapManager {
        &self.state.reply
    }

    /// The reply right manager, mutably.
    pub fn reply_mut(&mut self) -> &mut ReplyCapManager {
        &mut self.state.reply
    }

    /// The argument slots.
    #[must_use]
    pub fn slots(&self) -> &S {
        &self.state.slots
    }

    /// The argument slots, mutably.
    pub fn slots_mut(&mut self) -> &mut S {
        &mut self.state.slots
    }

    /// Records a newly received call.
    pub(crate) fn begin_call(&mut self, badge: Badge) {
        self.state.badge = badge;
        self.state.selector = None;
    }

    pub(crate) fn set_selector(&mut self, selector: MethodIndex) {
        self.state.selector = Some(selector);
    }

    /// Borrows the reply manager and the slots at the same time.
    pub(crate) fn parts(&mut self) -> (&mut ReplyCapManager, &mut S) {
        (&mut self.state.reply, &mut self.state.slots)
    }
}

impl<S> Drop for WorkerContext<'_, S> {
    fn drop(&mut self) {
        self.claimed.store(false, Ordering::Release);
    }
}

impl<S: fmt::Debug> fmt::Debug for WorkerContext<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerContext")
            .field("worker", &self.state.worker)
            .field("badge", &self.state.badge)
            .field("selector", &self.state.selector)
            .field("reply", &self.state.reply)
            .field("slots", &self.state.slots)
            .finish()
    }
}
