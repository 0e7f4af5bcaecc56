// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The external-memory interop surface backend.
//!
//! The engine only draws with GLES, while the host samples Vulkan images. For
//! each host target the backend allocates an exportable Vulkan image of the
//! same extent, imports its memory into GLES as texture storage
//! (`GL_EXT_memory_object_fd`) and wraps that texture in a framebuffer. On
//! present, GL work is finished and the interop image is copied into the
//! host's image on the host queue.
//!
//! ```text
//!   engine ──GLES──► fbo ─► texture ─► memory object ══ fd ══ VkDeviceMemory ─► interop VkImage
//!                                                                                   │ copy
//!                                                                                   ▼
//!                                                                            host VkImage
//! ```

use std::fmt;
use std::os::fd::OwnedFd;

use crate::api::{GlesApi, supports_memory_object_fd};
use crate::error::SurfaceError;
use crate::surface::{GraphicsBackend, RenderTarget, SurfaceBackend, VulkanTarget, attach_texture};

/// A Vulkan image with exportable memory, as raw handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InteropImage {
    /// Raw `VkImage`.
    pub image: u64,
    /// Raw `VkDeviceMemory` bound to `image`.
    pub memory: u64,
    /// Allocation size in bytes.
    pub size: u64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// The Vulkan side of the interop backend.
pub trait ExternalImageDevice: Send {
    /// Allocates an RGBA8 image with exportable memory and exports it as an
    /// opaque fd.
    fn allocate(&mut self, width: u32, height: u32) -> Result<(InteropImage, OwnedFd), SurfaceError>;

    /// Copies `image` into the host's `target` and waits for completion.
    fn copy_to_target(&mut self, image: &InteropImage, target: &VulkanTarget)
    -> Result<(), SurfaceError>;

    /// Waits until the device has no work in flight.
    fn wait_idle(&mut self);

    /// Destroys `image` and frees its memory.
    fn release(&mut self, image: InteropImage);
}

struct LiveInterop {
    target: VulkanTarget,
    image: InteropImage,
    memory_object: u32,
    texture: u32,
    fbo: u32,
}

/// Interop images imported into GLES.
pub(crate) struct InteropBackend {
    device: Box<dyn ExternalImageDevice>,
    live: Option<LiveInterop>,
}

impl fmt::Debug for InteropBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteropBackend")
            .field("live", &self.live.as_ref().map(|l| l.fbo))
            .finish_non_exhaustive()
    }
}

impl InteropBackend {
    /// Checks the GL extensions and round-trips a 1×1 export.
    ///
    /// The render context must be current.
    pub(crate) fn negotiate(
        mut device: Box<dyn ExternalImageDevice>,
        gl: &dyn GlesApi,
    ) -> Result<Self, SurfaceError> {
        if !supports_memory_object_fd(gl) {
            return Err(SurfaceError::MissingExtension("GL_EXT_memory_object_fd"));
        }
        let (image, fd) = device.allocate(1, 1)?;
        drop(fd);
        device.release(image);
        Ok(Self { device, live: None })
    }

    fn import(
        &mut self,
        gl: &dyn GlesApi,
        target: VulkanTarget,
    ) -> Result<LiveInterop, SurfaceError> {
        let (image, fd) = self.device.allocate(target.width, target.height)?;

        let memory_object = gl.create_memory_object();
        gl.import_memory_fd(memory_object, image.size, fd);

        let previous = gl.texture_binding();
        let texture = gl.gen_texture();
        gl.bind_texture(texture);
        gl.tex_storage_mem_2d(image.width, image.height, memory_object, 0);
        gl.bind_texture(previous);

        match attach_texture(gl, texture) {
            Ok(fbo) => Ok(LiveInterop {
                target,
                image,
                memory_object,
                texture,
                fbo,
            }),
            Err(err) => {
                gl.delete_texture(texture);
                gl.delete_memory_object(memory_object);
                self.device.release(image);
                Err(err)
            }
        }
    }
}

impl SurfaceBackend for InteropBackend {
    fn kind(&self) -> GraphicsBackend {
        GraphicsBackend::ExplicitApi
    }

    fn create(&mut self, gl: &dyn GlesApi, target: RenderTarget) -> Result<u32, SurfaceError> {
        let RenderTarget::VulkanImage(target) = target else {
            return Err(SurfaceError::TargetMismatch(GraphicsBackend::ExplicitApi));
        };
        let live = self.import(gl, target)?;
        let fbo = live.fbo;
        self.live = Some(live);
        Ok(fbo)
    }

    fn destroy(&mut self, gl: &dyn GlesApi) {
        let Some(live) = self.live.take() else {
            return;
        };
        // The host queue may still be reading the interop image.
        self.device.wait_idle();
        gl.delete_framebuffer(live.fbo);
        gl.delete_texture(live.texture);
        gl.delete_memory_object(live.memory_object);
        self.device.release(live.image);
    }

    fn present(&mut self, gl: &dyn GlesApi) -> bool {
        let Some(live) = &self.live else {
            return false;
        };
        gl.finish();
        match self.device.copy_to_target(&live.image, &live.target) {
            Ok(()) => true,
            Err(err) => {
                log::error!("interop present failed: {err}");
                false
            }
        }
    }
}

impl Drop for InteropBackend {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            // GL objects die with the context; only the Vulkan side is ours.
            log::warn!("interop surface {} still live at teardown", live.fbo);
            self.device.wait_idle();
            self.device.release(live.image);
        }
    }
}
