// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Thread-affined task runners for inlay.
//!
//! The embedded engine schedules work on two logical queues: platform tasks
//! on the host's main thread and render-side tasks on the host's graphics
//! worker thread. Each queue is a [`TaskRunner`] bound to one OS thread at
//! construction. Anyone may post to it through a [`TaskRunnerHandle`]; only
//! the bound thread may drain it.
//!
//! The graphics worker's identity is not known to the plugin, so it is
//! discovered once with [`discover_worker_thread`]: a job posted through the
//! host's [`ThreadPoster`] reports back the thread it ran on, and the caller
//! blocks until it does. That rendezvous is the only blocking call in inlay.
//!
//! ```text
//!   engine ──post_task──► TaskRunnerHandle ──► TaskQueue (deadline, FIFO)
//!                                 │
//!                                 └─ eligible + waker? ──► ThreadPoster::post(drain)
//!
//!   bound thread ──process_tasks──► run eligible snapshot ──► observers (once)
//! ```

mod handshake;
mod runner;
pub mod time;

pub use handshake::{HandshakeError, ThreadPoster, discover_worker_thread};
pub use runner::{
    DrainOutcome, Observer, TaskExecutor, TaskRunner, TaskRunnerHandle,
};
