// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render targets, host capabilities and the classic surface backend.

#![expect(
    unsafe_code,
    reason = "Vulkan host handles are raw driver pointers shared across threads"
)]

use core::ffi::c_void;
use core::fmt;
use core::num::NonZeroU32;

use crate::api::{EglContext, GL_FRAMEBUFFER_COMPLETE, GlesApi};
use crate::error::SurfaceError;

/// Which surface backend a manager was built with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GraphicsBackend {
    /// The host renders with GLES; targets are GL textures.
    ClassicGl,
    /// The host renders with Vulkan; targets are Vulkan images filled
    /// through an external-memory interop image.
    ExplicitApi,
}

/// Host callback that runs `callback(data)` before returning, while nothing
/// else submits to or waits on the host's `VkQueue`.
pub type QueueAccessFn = unsafe extern "C" fn(
    context: *mut c_void,
    callback: unsafe extern "C" fn(data: *mut c_void),
    data: *mut c_void,
);

/// Raw Vulkan handles the host shares with the plugin.
#[derive(Clone, Copy)]
pub struct VulkanHostHandles {
    /// `vkGetInstanceProcAddr`.
    pub get_instance_proc_addr: *const c_void,
    /// `VkInstance`.
    pub instance: *mut c_void,
    /// `VkPhysicalDevice`.
    pub physical_device: *mut c_void,
    /// `VkDevice`.
    pub device: *mut c_void,
    /// The host's graphics `VkQueue`.
    pub queue: *mut c_void,
    /// Family index of `queue`.
    pub queue_family_index: u32,
    /// Serializes every use of `queue` by the plugin with the host's own.
    /// Required for the interop backend.
    pub access_queue: Option<QueueAccessFn>,
    /// Passed back to `access_queue`.
    pub queue_context: *mut c_void,
}

// SAFETY: Vulkan handles are opaque identifiers; queue use is serialized
// through `access_queue`.
unsafe impl Send for VulkanHostHandles {}
// SAFETY: as above.
unsafe impl Sync for VulkanHostHandles {}

impl fmt::Debug for VulkanHostHandles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanHostHandles")
            .field("instance", &self.instance)
            .field("device", &self.device)
            .field("queue_family_index", &self.queue_family_index)
            .finish_non_exhaustive()
    }
}

/// What the host reports about its renderer.
#[derive(Clone, Copy, Debug)]
pub enum GraphicsCapabilities {
    /// GLES; the plugin's render context shares with `share_context`.
    Gles {
        /// The host's context, or [`EglContext::NO_CONTEXT`].
        share_context: EglContext,
    },
    /// Vulkan.
    Vulkan(VulkanHostHandles),
}

impl GraphicsCapabilities {
    /// Returns the backend these capabilities select.
    #[must_use]
    pub fn backend(&self) -> GraphicsBackend {
        match self {
            Self::Gles { .. } => GraphicsBackend::ClassicGl,
            Self::Vulkan(_) => GraphicsBackend::ExplicitApi,
        }
    }
}

/// A host Vulkan image the plugin draws into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VulkanTarget {
    /// Raw `VkImage`.
    pub image: u64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// A host-owned render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderTarget {
    /// A GL texture name in the host's share group.
    GlTexture(u32),
    /// A Vulkan image.
    VulkanImage(VulkanTarget),
}

/// One surface backend. At most one surface is live at a time.
pub(crate) trait SurfaceBackend: Send {
    fn kind(&self) -> GraphicsBackend;

    /// Builds a framebuffer for `target` and returns its name.
    fn create(&mut self, gl: &dyn GlesApi, target: RenderTarget) -> Result<u32, SurfaceError>;

    /// Releases the live surface.
    fn destroy(&mut self, gl: &dyn GlesApi);

    /// Publishes the rendered frame to the host target.
    fn present(&mut self, gl: &dyn GlesApi) -> bool;
}

/// Saves the framebuffer binding, builds a framebuffer around `texture`,
/// checks completeness and restores the binding.
///
/// On failure the new framebuffer is deleted.
pub(crate) fn attach_texture(gl: &dyn GlesApi, texture: u32) -> Result<u32, SurfaceError> {
    let previous = gl.framebuffer_binding();
    let fbo = gl.gen_framebuffer();
    gl.bind_framebuffer(fbo);
    gl.framebuffer_texture_2d(texture);
    let status = gl.check_framebuffer_status();
    gl.bind_framebuffer(previous);

    if status == GL_FRAMEBUFFER_COMPLETE {
        Ok(fbo)
    } else {
        gl.delete_framebuffer(fbo);
        Err(SurfaceError::IncompleteFramebuffer(status))
    }
}

/// Framebuffers wrapping host GL textures directly.
#[derive(Debug, Default)]
pub(crate) struct ClassicBackend {
    fbo: Option<NonZeroU32>,
}

impl SurfaceBackend for ClassicBackend {
    fn kind(&self) -> GraphicsBackend {
        GraphicsBackend::ClassicGl
    }

    fn create(&mut self, gl: &dyn GlesApi, target: RenderTarget) -> Result<u32, SurfaceError> {
        let RenderTarget::GlTexture(texture) = target else {
            return Err(SurfaceError::TargetMismatch(GraphicsBackend::ClassicGl));
        };
        let fbo = attach_texture(gl, texture)?;
        self.fbo = NonZeroU32::new(fbo);
        Ok(fbo)
    }

    fn destroy(&mut self, gl: &dyn GlesApi) {
        if let Some(fbo) = self.fbo.take() {
            gl.delete_framebuffer(fbo.get());
        }
    }

    fn present(&mut self, _gl: &dyn GlesApi) -> bool {
        // The host samples its own texture; nothing to publish.
        true
    }
}
