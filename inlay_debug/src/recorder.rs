// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].
//!
//! A panel owns its sink, so [`SharedRecorder`] wraps a recorder behind a
//! lock for callers that want to read the bytes while the panel runs.

use std::sync::Arc;

use inlay_core::pointer::PointerPhase;
use inlay_core::task::QueueKind;
use inlay_core::time::{Duration, HostTime};
use inlay_core::trace::{
    LifecycleEvent, LifecycleStage, PointerTraceEvent, SurfaceRecreatedEvent, TaskDrainEvent,
    TraceSink, VsyncDeliveredEvent,
};
use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_TASK_DRAIN: u8 = 1;
const TAG_VSYNC_DELIVERED: u8 = 2;
const TAG_POINTER: u8 = 3;
const TAG_SURFACE_RECREATED: u8 = 4;
const TAG_LIFECYCLE: u8 = 5;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_count(&mut self, count: usize) {
        self.write_u32(u32::try_from(count).unwrap_or(u32::MAX));
    }

    fn write_queue(&mut self, queue: QueueKind) {
        self.write_u8(match queue {
            QueueKind::Render => 0,
            QueueKind::Platform => 1,
        });
    }

    fn write_phase(&mut self, phase: PointerPhase) {
        self.write_u8(match phase {
            PointerPhase::Add => 0,
            PointerPhase::Remove => 1,
            PointerPhase::Hover => 2,
            PointerPhase::Down => 3,
            PointerPhase::Move => 4,
            PointerPhase::Up => 5,
        });
    }

    fn write_stage(&mut self, stage: LifecycleStage) {
        self.write_u8(match stage {
            LifecycleStage::Enabled => 0,
            LifecycleStage::EnableFailed => 1,
            LifecycleStage::Disabled => 2,
        });
    }
}

impl TraceSink for RecorderSink {
    fn on_task_drain(&mut self, e: &TaskDrainEvent) {
        self.write_u8(TAG_TASK_DRAIN);
        self.write_queue(e.queue);
        self.write_count(e.executed);
        self.write_u64(e.started.nanos());
        self.write_u64(e.elapsed.nanos());
    }

    fn on_vsync_delivered(&mut self, e: &VsyncDeliveredEvent) {
        self.write_u8(TAG_VSYNC_DELIVERED);
        self.write_count(e.count);
        self.write_u64(e.frame_start.nanos());
        self.write_u64(e.frame_target.nanos());
    }

    fn on_pointer_event(&mut self, e: &PointerTraceEvent) {
        self.write_u8(TAG_POINTER);
        self.write_phase(e.phase);
        self.write_u8(u8::from(e.synthesized));
        self.write_u64(e.timestamp_micros);
    }

    fn on_surface_recreated(&mut self, e: &SurfaceRecreatedEvent) {
        self.write_u8(TAG_SURFACE_RECREATED);
        self.write_u32(e.width);
        self.write_u32(e.height);
        self.write_u32(e.fbo);
        self.write_u64(e.timestamp.nanos());
    }

    fn on_lifecycle(&mut self, e: &LifecycleEvent) {
        self.write_u8(TAG_LIFECYCLE);
        self.write_stage(e.stage);
        self.write_u64(e.timestamp.nanos());
    }
}

// ---------------------------------------------------------------------------
// SharedRecorder
// ---------------------------------------------------------------------------

/// A cloneable [`RecorderSink`] handle.
///
/// Hand one clone to the panel and keep another to read the recording.
#[derive(Clone, Debug, Default)]
pub struct SharedRecorder {
    inner: Arc<Mutex<RecorderSink>>,
}

impl SharedRecorder {
    /// Creates an empty shared recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the bytes recorded so far.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> {
        self.inner.lock().as_bytes().to_vec()
    }
}

impl TraceSink for SharedRecorder {
    fn on_task_drain(&mut self, e: &TaskDrainEvent) {
        self.inner.lock().on_task_drain(e);
    }

    fn on_vsync_delivered(&mut self, e: &VsyncDeliveredEvent) {
        self.inner.lock().on_vsync_delivered(e);
    }

    fn on_pointer_event(&mut self, e: &PointerTraceEvent) {
        self.inner.lock().on_pointer_event(e);
    }

    fn on_surface_recreated(&mut self, e: &SurfaceRecreatedEvent) {
        self.inner.lock().on_surface_recreated(e);
    }

    fn on_lifecycle(&mut self, e: &LifecycleEvent) {
        self.inner.lock().on_lifecycle(e);
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Copy, Debug)]
pub enum RecordedEvent {
    /// A [`TaskDrainEvent`]. The executed count saturates at `u32::MAX`.
    TaskDrain(TaskDrainEvent),
    /// A [`VsyncDeliveredEvent`].
    VsyncDelivered(VsyncDeliveredEvent),
    /// A [`PointerTraceEvent`].
    Pointer(PointerTraceEvent),
    /// A [`SurfaceRecreatedEvent`].
    SurfaceRecreated(SurfaceRecreatedEvent),
    /// A [`LifecycleEvent`].
    Lifecycle(LifecycleEvent),
}

impl RecordedEvent {
    /// The host time the event is stamped with.
    ///
    /// Pointer events carry microseconds; they are widened to nanoseconds.
    #[must_use]
    pub fn timestamp(&self) -> HostTime {
        match self {
            Self::TaskDrain(e) => e.started,
            Self::VsyncDelivered(e) => e.frame_start,
            Self::Pointer(e) => HostTime(e.timestamp_micros.saturating_mul(1_000)),
            Self::SurfaceRecreated(e) => e.timestamp,
            Self::Lifecycle(e) => e.timestamp,
        }
    }
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.read_array::<1>().map(|[v]| v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.read_array().map(u32::from_le_bytes)
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.read_array().map(u64::from_le_bytes)
    }

    fn read_count(&mut self) -> Option<usize> {
        usize::try_from(self.read_u32()?).ok()
    }

    fn read_queue(&mut self) -> Option<QueueKind> {
        match self.read_u8()? {
            0 => Some(QueueKind::Render),
            1 => Some(QueueKind::Platform),
            _ => None,
        }
    }

    fn read_phase(&mut self) -> Option<PointerPhase> {
        Some(match self.read_u8()? {
            0 => PointerPhase::Add,
            1 => PointerPhase::Remove,
            2 => PointerPhase::Hover,
            3 => PointerPhase::Down,
            4 => PointerPhase::Move,
            5 => PointerPhase::Up,
            _ => return None,
        })
    }

    fn read_stage(&mut self) -> Option<LifecycleStage> {
        Some(match self.read_u8()? {
            0 => LifecycleStage::Enabled,
            1 => LifecycleStage::EnableFailed,
            2 => LifecycleStage::Disabled,
            _ => return None,
        })
    }

    fn decode_task_drain(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::TaskDrain(TaskDrainEvent {
            queue: self.read_queue()?,
            executed: self.read_count()?,
            started: HostTime(self.read_u64()?),
            elapsed: Duration(self.read_u64()?),
        }))
    }

    fn decode_vsync_delivered(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::VsyncDelivered(VsyncDeliveredEvent {
            count: self.read_count()?,
            frame_start: HostTime(self.read_u64()?),
            frame_target: HostTime(self.read_u64()?),
        }))
    }

    fn decode_pointer(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Pointer(PointerTraceEvent {
            phase: self.read_phase()?,
            synthesized: self.read_u8()? != 0,
            timestamp_micros: self.read_u64()?,
        }))
    }

    fn decode_surface_recreated(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::SurfaceRecreated(SurfaceRecreatedEvent {
            width: self.read_u32()?,
            height: self.read_u32()?,
            fbo: self.read_u32()?,
            timestamp: HostTime(self.read_u64()?),
        }))
    }

    fn decode_lifecycle(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::Lifecycle(LifecycleEvent {
            stage: self.read_stage()?,
            timestamp: HostTime(self.read_u64()?),
        }))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_u8()? {
            TAG_TASK_DRAIN => self.decode_task_drain(),
            TAG_VSYNC_DELIVERED => self.decode_vsync_delivered(),
            TAG_POINTER => self.decode_pointer(),
            TAG_SURFACE_RECREATED => self.decode_surface_recreated(),
            TAG_LIFECYCLE => self.decode_lifecycle(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
