// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core types for embedding a UI engine into a host-owned GPU texture.
//!
//! `inlay_core` holds the platform-independent pieces of the embedding: the
//! data that flows between the host's frame pump and the embedded engine. It
//! is `no_std` compatible (with `alloc`); everything that needs threads, GPU
//! APIs or a real clock lives in the sibling crates.
//!
//! # Architecture
//!
//! ```text
//!   host frame pump ──► TaskQueue::drain_eligible() ──► engine tasks
//!          │
//!          ├────────► VsyncBatonQueue::take() ──► VsyncBatch::deliver_all()
//!          │                                         (now, now + interval)
//!          ▼
//!   host input ──► PointerNormalizer ──► PointerBatch ──► engine
//! ```
//!
//! **[`task`]**: Deadline-ordered task queue. Ordering and eligibility rules
//! live here; thread affinity is added by `inlay_runner`.
//!
//! **[`vsync`]**: Append-only baton queue drained once per frame pump.
//!
//! **[`pointer`]**: State machine turning raw button/position input into a
//! phase-tagged pointer stream with synthesized add/remove bracketing.
//!
//! **[`metrics`]**: Viewport metrics forwarded to the engine on resize.
//!
//! **[`time`]**: Monotonic nanosecond timestamps and durations.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! panel instrumentation, with a zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod metrics;
pub mod pointer;
pub mod task;
pub mod time;
pub mod trace;
pub mod vsync;
