// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Panel orchestration for inlay.
//!
//! A [`Panel`] is one embedded engine drawing into one host-owned texture.
//! It ties together the surface manager from `inlay_gl`, two thread-affined
//! task runners from `inlay_runner`, and the vsync and pointer state from
//! `inlay_core`, and exposes the whole as a small C ABI ([`ffi`]).
//!
//! # Threads
//!
//! ```text
//!   host main thread ── pump() ──► platform runner ──► Engine::run_task
//!          │                  └──► vsync batons ────► Engine::on_vsync
//!          │
//!   graphics worker ─── wake ────► render runner ───► Engine::run_task
//!          │
//!   engine render thread ◄── post_render_task (surface recreation)
//! ```
//!
//! The engine itself is reached only through the [`Engine`] and
//! [`EngineLauncher`] traits; the host only through [`HostEnvironment`].

mod config;
mod engine;
mod error;
pub mod ffi;
mod host;
mod panel;
mod textures;

#[cfg(test)]
mod fakes;

pub use config::PanelConfig;
pub use engine::{
    Engine, EngineConfig, EngineError, EngineLauncher, EngineTask, Entrypoint, EntrypointFn,
    ExternalTexture, TextureId, VsyncWaiter,
};
pub use error::PanelError;
pub use host::HostEnvironment;
pub use panel::Panel;
pub use textures::TextureRegistry;
