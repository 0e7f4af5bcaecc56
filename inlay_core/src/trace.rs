// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the panel.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! panel calls as it drains tasks, delivers vsync batons, forwards pointer
//! events and recreates its render surface. All method bodies default to
//! no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! Human-readable diagnostics do not go through here; they use the `log`
//! facade.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).

use crate::pointer::PointerPhase;
use crate::task::QueueKind;
use crate::time::{Duration, HostTime};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Panel lifecycle transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecycleStage {
    /// The enable sequence completed and the engine is running.
    Enabled,
    /// The enable sequence failed part-way and was unwound.
    EnableFailed,
    /// The disable sequence completed.
    Disabled,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted after a task runner finishes one drain pass.
#[derive(Clone, Copy, Debug)]
pub struct TaskDrainEvent {
    /// Which runner drained.
    pub queue: QueueKind,
    /// Number of tasks executed in this pass.
    pub executed: usize,
    /// Host time at the start of the pass.
    pub started: HostTime,
    /// Time spent draining.
    pub elapsed: Duration,
}

/// Emitted after the frame pump acknowledges pending vsync batons.
#[derive(Clone, Copy, Debug)]
pub struct VsyncDeliveredEvent {
    /// Number of batons acknowledged.
    pub count: usize,
    /// Frame start handed to the engine.
    pub frame_start: HostTime,
    /// Frame target handed to the engine.
    pub frame_target: HostTime,
}

/// Emitted for every pointer event forwarded to the engine.
#[derive(Clone, Copy, Debug)]
pub struct PointerTraceEvent {
    /// Phase of the forwarded event.
    pub phase: PointerPhase,
    /// `true` when the event was synthesized rather than reported by the host.
    pub synthesized: bool,
    /// Event timestamp in microseconds.
    pub timestamp_micros: u64,
}

/// Emitted when the render surface is rebuilt for a new host target.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceRecreatedEvent {
    /// Physical width of the new target.
    pub width: u32,
    /// Physical height of the new target.
    pub height: u32,
    /// Framebuffer name now reported to the engine.
    pub fbo: u32,
    /// Host time of the recreation.
    pub timestamp: HostTime,
}

/// Emitted on panel lifecycle transitions.
#[derive(Clone, Copy, Debug)]
pub struct LifecycleEvent {
    /// Which transition happened.
    pub stage: LifecycleStage,
    /// Host time of the transition.
    pub timestamp: HostTime,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the panel.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called after a task runner drain pass.
    fn on_task_drain(&mut self, e: &TaskDrainEvent) {
        _ = e;
    }

    /// Called after vsync batons are acknowledged.
    fn on_vsync_delivered(&mut self, e: &VsyncDeliveredEvent) {
        _ = e;
    }

    /// Called for every pointer event forwarded to the engine.
    fn on_pointer_event(&mut self, e: &PointerTraceEvent) {
        _ = e;
    }

    /// Called when the render surface is recreated.
    fn on_surface_recreated(&mut self, e: &SurfaceRecreatedEvent) {
        _ = e;
    }

    /// Called on lifecycle transitions.
    fn on_lifecycle(&mut self, e: &LifecycleEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer from an optional sink.
    #[inline]
    #[must_use]
    pub fn from_option(sink: Option<&'a mut dyn TraceSink>) -> Self {
        match sink {
            Some(sink) => Self::new(sink),
            None => Self::none(),
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits a [`TaskDrainEvent`].
    #[inline]
    pub fn task_drain(&mut self, e: &TaskDrainEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_task_drain(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`VsyncDeliveredEvent`].
    #[inline]
    pub fn vsync_delivered(&mut self, e: &VsyncDeliveredEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_vsync_delivered(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`PointerTraceEvent`].
    #[inline]
    pub fn pointer_event(&mut self, e: &PointerTraceEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_pointer_event(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`SurfaceRecreatedEvent`].
    #[inline]
    pub fn surface_recreated(&mut self, e: &SurfaceRecreatedEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_surface_recreated(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`LifecycleEvent`].
    #[inline]
    pub fn lifecycle(&mut self, e: &LifecycleEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_lifecycle(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingSink {
        drains: usize,
        lifecycles: usize,
    }

    impl TraceSink for CountingSink {
        fn on_task_drain(&mut self, _e: &TaskDrainEvent) {
            self.drains += 1;
        }

        fn on_lifecycle(&mut self, _e: &LifecycleEvent) {
            self.lifecycles += 1;
        }
    }

    fn drain_event() -> TaskDrainEvent {
        TaskDrainEvent {
            queue: QueueKind::Platform,
            executed: 2,
            started: HostTime(10),
            elapsed: Duration(5),
        }
    }

    #[test]
    fn none_tracer_discards() {
        let mut tracer = Tracer::none();
        tracer.task_drain(&drain_event());
        tracer.lifecycle(&LifecycleEvent {
            stage: LifecycleStage::Enabled,
            timestamp: HostTime::ZERO,
        });
    }

    #[test]
    fn noop_sink_accepts_every_event() {
        let mut sink = NoopSink;
        let mut tracer = Tracer::new(&mut sink);
        tracer.task_drain(&drain_event());
        tracer.vsync_delivered(&VsyncDeliveredEvent {
            count: 1,
            frame_start: HostTime(0),
            frame_target: HostTime(16_666_667),
        });
        tracer.pointer_event(&PointerTraceEvent {
            phase: PointerPhase::Add,
            synthesized: true,
            timestamp_micros: 1,
        });
        tracer.surface_recreated(&SurfaceRecreatedEvent {
            width: 4,
            height: 4,
            fbo: 1,
            timestamp: HostTime(0),
        });
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_when_enabled() {
        let mut sink = CountingSink::default();
        {
            let mut tracer = Tracer::new(&mut sink);
            tracer.task_drain(&drain_event());
            tracer.task_drain(&drain_event());
            tracer.lifecycle(&LifecycleEvent {
                stage: LifecycleStage::Disabled,
                timestamp: HostTime(3),
            });
        }
        assert_eq!(sink.drains, 2, "two drain events dispatched");
        assert_eq!(sink.lifecycles, 1, "one lifecycle event dispatched");
    }

    #[cfg(not(feature = "trace"))]
    #[test]
    fn tracer_compiles_away_when_disabled() {
        let mut sink = CountingSink::default();
        {
            let mut tracer = Tracer::from_option(Some(&mut sink));
            tracer.task_drain(&drain_event());
        }
        assert_eq!(sink.drains, 0, "no dispatch without the trace feature");
        assert_eq!(sink.lifecycles, 0, "no dispatch without the trace feature");
    }
}
