// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use inlay_gl::SurfaceError;
use inlay_runner::HandshakeError;

use crate::engine::EngineError;

/// Why a panel could not be enabled.
#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    /// `enable` was called on an enabled panel.
    #[error("panel is already enabled")]
    AlreadyEnabled,
    /// The render context could not be bound on the calling thread.
    #[error("render context could not be made current")]
    ContextUnavailable,
    /// Display, context or surface setup failed.
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    /// The graphics worker never ran the identity handshake.
    #[error(transparent)]
    Worker(#[from] HandshakeError),
    /// The engine failed to start.
    #[error(transparent)]
    Engine(#[from] EngineError),
}
