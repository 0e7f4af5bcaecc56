// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! What the host application provides.

use std::fmt;
use std::sync::Arc;

use inlay_gl::{GraphicsCapabilities, GraphicsSubsystem};
use inlay_runner::ThreadPoster;

use crate::engine::EngineLauncher;

/// The host's graphics setup, worker thread and engine launcher.
///
/// One environment serves every panel in the process; they share its
/// display connection.
pub struct HostEnvironment {
    /// The host's renderer.
    pub capabilities: GraphicsCapabilities,
    /// Owner of the process-wide display.
    pub graphics: GraphicsSubsystem,
    /// Runs jobs on the host's graphics worker thread.
    pub worker: Arc<dyn ThreadPoster>,
    /// Starts the embedded engine.
    pub launcher: Arc<dyn EngineLauncher>,
}

impl fmt::Debug for HostEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostEnvironment")
            .field("capabilities", &self.capabilities)
            .field("graphics", &self.graphics)
            .finish_non_exhaustive()
    }
}

impl HostEnvironment {
    /// Releases the environment's hold on the display.
    ///
    /// Panels still holding surface managers keep it open until they
    /// disable.
    pub fn shutdown(&self) {
        self.graphics.shutdown();
    }
}
