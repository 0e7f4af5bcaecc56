// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The process-level display connection.
//!
//! A [`GraphicsSubsystem`] owns at most one [`DisplayConnection`]. Surface
//! managers hold an `Arc` to it, so the connection outlives every context
//! created against it. The subsystem drops its own reference only on
//! [`GraphicsSubsystem::shutdown`]; the display is terminated once the last
//! holder lets go.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::{EglApi, EglDisplay, GlesApi};
use crate::error::SurfaceError;

/// An initialized EGL display.
pub struct DisplayConnection {
    egl: Arc<dyn EglApi>,
    display: EglDisplay,
    version: (i32, i32),
}

impl fmt::Debug for DisplayConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayConnection")
            .field("display", &self.display)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl DisplayConnection {
    fn open(egl: Arc<dyn EglApi>) -> Result<Self, SurfaceError> {
        let display = egl
            .default_display()
            .map_err(SurfaceError::egl("eglGetDisplay"))?;
        let version = egl
            .initialize(display)
            .map_err(SurfaceError::egl("eglInitialize"))?;
        log::debug!("EGL display {display:?} initialized, version {}.{}", version.0, version.1);
        Ok(Self {
            egl,
            display,
            version,
        })
    }

    /// Returns the display handle.
    #[must_use]
    pub fn display(&self) -> EglDisplay {
        self.display
    }

    /// Returns the EGL version reported at initialization.
    #[must_use]
    pub fn version(&self) -> (i32, i32) {
        self.version
    }

    /// Returns the EGL entry points.
    #[must_use]
    pub fn egl(&self) -> &Arc<dyn EglApi> {
        &self.egl
    }
}

impl Drop for DisplayConnection {
    fn drop(&mut self) {
        if let Err(err) = self.egl.terminate(self.display) {
            log::warn!("eglTerminate failed: {err}");
        } else {
            log::debug!("EGL display {:?} terminated", self.display);
        }
    }
}

/// The graphics subsystem: the loaded driver plus the shared display.
pub struct GraphicsSubsystem {
    egl: Arc<dyn EglApi>,
    gles: Arc<dyn GlesApi>,
    connection: Mutex<Option<Arc<DisplayConnection>>>,
}

impl fmt::Debug for GraphicsSubsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsSubsystem")
            .field("connection", &*self.connection.lock())
            .finish_non_exhaustive()
    }
}

impl GraphicsSubsystem {
    /// Creates a subsystem over the given entry points. No display is opened
    /// until first use.
    pub fn new(egl: Arc<dyn EglApi>, gles: Arc<dyn GlesApi>) -> Self {
        Self {
            egl,
            gles,
            connection: Mutex::new(None),
        }
    }

    /// Returns the shared display, opening it on first use.
    pub fn connection(&self) -> Result<Arc<DisplayConnection>, SurfaceError> {
        let mut slot = self.connection.lock();
        if let Some(connection) = slot.as_ref() {
            return Ok(Arc::clone(connection));
        }
        let connection = Arc::new(DisplayConnection::open(Arc::clone(&self.egl))?);
        *slot = Some(Arc::clone(&connection));
        Ok(connection)
    }

    /// Returns `true` if the display has been opened and not shut down.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.connection.lock().is_some()
    }

    /// Releases the subsystem's reference to the display.
    ///
    /// The display is terminated once no surface manager holds it.
    pub fn shutdown(&self) {
        if let Some(connection) = self.connection.lock().take() {
            let others = Arc::strong_count(&connection) - 1;
            if others > 0 {
                log::debug!("display shutdown deferred until {others} holder(s) release it");
            }
        }
    }

    /// Returns the EGL entry points.
    #[must_use]
    pub fn egl(&self) -> &Arc<dyn EglApi> {
        &self.egl
    }

    /// Returns the GLES entry points.
    #[must_use]
    pub fn gles(&self) -> &Arc<dyn GlesApi> {
        &self.gles
    }
}
