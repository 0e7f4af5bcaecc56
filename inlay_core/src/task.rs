// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deadline-ordered task queue.
//!
//! [`TaskQueue`] holds opaque tasks tagged with a target time. A task is
//! *eligible* once its target time is at or before the drain time. Eligible
//! tasks come out in non-decreasing deadline order; tasks sharing a deadline
//! come out in submission order.
//!
//! The queue has no notion of threads. `inlay_runner` wraps it with the
//! thread-affinity and observer rules the engine expects.

use alloc::collections::BinaryHeap;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;

use crate::time::HostTime;

/// Identifies which logical engine queue a task runner serves.
///
/// The engine tags each task runner description with an identifier; the
/// values match the engine's expectations (render = 1, platform = 2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// GPU work scheduled on the graphics worker thread.
    Render,
    /// Platform and UI work scheduled on the host's main thread.
    Platform,
}

impl QueueKind {
    /// Returns the identifier the engine uses for this queue.
    #[must_use]
    pub const fn identifier(self) -> u64 {
        match self {
            Self::Render => 1,
            Self::Platform => 2,
        }
    }
}

struct Pending<T> {
    deadline: HostTime,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Pending<T> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl<T> Eq for Pending<T> {}

impl<T> PartialOrd for Pending<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Pending<T> {
    // Reversed so the max-heap pops the earliest (deadline, seq) first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A queue of tasks ordered by deadline, then by submission.
pub struct TaskQueue<T> {
    heap: BinaryHeap<Pending<T>>,
    next_seq: u64,
}

impl<T> fmt::Debug for TaskQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("len", &self.heap.len())
            .field("next_deadline", &self.next_deadline())
            .finish_non_exhaustive()
    }
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TaskQueue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Enqueues `task` to become eligible at `deadline`.
    pub fn push(&mut self, task: T, deadline: HostTime) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Pending {
            deadline,
            seq,
            task,
        });
    }

    /// Removes and returns every task eligible at `now`, in execution order.
    ///
    /// Only tasks already queued are considered, so work pushed while the
    /// returned tasks run waits for the next drain.
    pub fn drain_eligible(&mut self, now: HostTime) -> Vec<T> {
        let mut ready = Vec::new();
        while self.heap.peek().is_some_and(|p| p.deadline <= now) {
            if let Some(pending) = self.heap.pop() {
                ready.push(pending.task);
            }
        }
        ready
    }

    /// Returns `true` if at least one task is eligible at `now`.
    #[must_use]
    pub fn has_eligible(&self, now: HostTime) -> bool {
        self.heap.peek().is_some_and(|p| p.deadline <= now)
    }

    /// Returns the earliest deadline in the queue, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<HostTime> {
        self.heap.peek().map(|p| p.deadline)
    }

    /// Removes every task regardless of deadline, in execution order.
    pub fn clear(&mut self) -> Vec<T> {
        let mut rest = Vec::with_capacity(self.heap.len());
        while let Some(pending) = self.heap.pop() {
            rest.push(pending.task);
        }
        rest
    }

    /// Returns the number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns `true` when no tasks are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
