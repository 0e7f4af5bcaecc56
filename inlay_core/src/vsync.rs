// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vsync baton buffering.
//!
//! The embedded engine asks for a vsync by handing over an opaque
//! [`VsyncBaton`]. The host has a single per-frame signal, so batons are
//! parked in a [`VsyncBatonQueue`] until the next frame pump, which takes the
//! whole sequence at once and acknowledges each baton with a synthetic
//! `(now, now + interval)` frame pair.
//!
//! Taking is a swap with an empty sequence: a baton pushed while a batch is
//! being delivered lands in the next batch, never in the current one, and no
//! baton is delivered twice.

use alloc::vec::Vec;

use crate::time::{Duration, HostTime};

/// Opaque token for one outstanding vsync request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VsyncBaton(pub isize);

/// The frame pair handed to the engine when a baton is acknowledged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameInterval {
    /// When the frame starts (the pump's `now`).
    pub frame_start: HostTime,
    /// When the frame should be on screen.
    pub frame_target: HostTime,
}

impl FrameInterval {
    /// Builds the pair `(now, now + interval)`.
    #[must_use]
    pub const fn starting_at(now: HostTime, interval: Duration) -> Self {
        Self {
            frame_start: now,
            frame_target: now.saturating_add(interval),
        }
    }
}

/// Append-only baton sequence, drained once per frame pump.
#[derive(Debug, Default)]
pub struct VsyncBatonQueue {
    batons: Vec<VsyncBaton>,
}

impl VsyncBatonQueue {
    /// Creates an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self { batons: Vec::new() }
    }

    /// Appends a baton.
    pub fn push(&mut self, baton: VsyncBaton) {
        self.batons.push(baton);
    }

    /// Swaps the pending sequence out, leaving the queue empty.
    #[must_use]
    pub fn take(&mut self) -> VsyncBatch {
        VsyncBatch {
            batons: core::mem::take(&mut self.batons),
        }
    }

    /// Takes every pending baton and acknowledges each, in push order.
    ///
    /// Returns the number of batons delivered.
    pub fn drain_and_deliver_all(
        &mut self,
        now: HostTime,
        interval: Duration,
        deliver: impl FnMut(VsyncBaton, FrameInterval),
    ) -> usize {
        self.take().deliver_all(now, interval, deliver)
    }

    /// Returns the number of pending batons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batons.len()
    }

    /// Returns `true` when no baton is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batons.is_empty()
    }
}

/// Batons taken from a [`VsyncBatonQueue`] by one frame pump.
///
/// Delivery consumes the batch, so each baton is acknowledged exactly once.
#[derive(Debug)]
#[must_use = "a taken batch must be delivered or its batons are lost"]
pub struct VsyncBatch {
    batons: Vec<VsyncBaton>,
}

impl VsyncBatch {
    /// Acknowledges every baton in push order with `(now, now + interval)`.
    ///
    /// Returns the number of batons delivered.
    pub fn deliver_all(
        self,
        now: HostTime,
        interval: Duration,
        mut deliver: impl FnMut(VsyncBaton, FrameInterval),
    ) -> usize {
        let frame = FrameInterval::starting_at(now, interval);
        let count = self.batons.len();
        for baton in self.batons {
            deliver(baton, frame);
        }
        count
    }

    /// Returns the number of batons in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.batons.len()
    }

    /// Returns `true` when the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.batons.is_empty()
    }
}
