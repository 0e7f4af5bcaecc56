// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Panel configuration.

use inlay_core::time::Duration;
use inlay_gl::SurfaceConfig;

/// Tunables for one panel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PanelConfig {
    /// Length of the synthetic frame handed out with each vsync baton.
    pub frame_interval: Duration,
    /// Context and library setup for the surface manager.
    pub surface: SurfaceConfig,
    /// Nudge the graphics worker from each frame pump while render tasks
    /// with later deadlines are waiting. Eligible tasks wake it regardless.
    pub wake_worker: bool,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::FRAME_60HZ,
            surface: SurfaceConfig::gles2(),
            wake_worker: true,
        }
    }
}
