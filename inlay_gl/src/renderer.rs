// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The renderer capability handed to the embedded engine.

use core::ffi::{CStr, c_void};

use crate::manager::SurfaceManager;

/// What an embedded GLES engine needs from its host surface.
///
/// Every method acts on the calling thread's context binding. Callers bind
/// and unbind symmetrically around GL work done off the expected thread.
pub trait RendererDelegate: Send + Sync {
    /// Binds the render context.
    fn make_current(&self) -> bool;

    /// Unbinds whatever context is current.
    fn clear_current(&self) -> bool;

    /// Binds the resource context for uploads.
    fn make_resource_current(&self) -> bool;

    /// The framebuffer the engine should draw into.
    fn fbo_for_current_surface(&self) -> u32;

    /// Publishes a finished frame.
    fn present(&self) -> bool;

    /// Resolves a GL entry point; null when unknown.
    fn resolve_proc(&self, name: &CStr) -> *const c_void;
}

impl RendererDelegate for SurfaceManager {
    fn make_current(&self) -> bool {
        Self::make_current(self)
    }

    fn clear_current(&self) -> bool {
        Self::clear_current(self)
    }

    fn make_resource_current(&self) -> bool {
        Self::make_resource_current(self)
    }

    fn fbo_for_current_surface(&self) -> u32 {
        self.fbo()
    }

    fn present(&self) -> bool {
        Self::present(self)
    }

    fn resolve_proc(&self, name: &CStr) -> *const c_void {
        Self::resolve_proc(self, name)
    }
}
