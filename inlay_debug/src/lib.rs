// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording and Chrome trace export for inlay panel
//! diagnostics.
//!
//! This crate provides [`TraceSink`](inlay_core::trace::TraceSink)
//! implementations for development and post-mortem analysis:
//!
//! - [`recorder::RecorderSink`]: compact binary recording with
//!   [`recorder::decode`] for playback.
//! - [`chrome::export`]: writes Chrome Trace Event Format JSON from recorded
//!   bytes.
//!
//! Install a sink on a panel with `Panel::set_trace_sink`; events only flow
//! when `inlay_core` is built with its `trace` feature, which this crate
//! turns on.

pub mod chrome;
pub mod recorder;
