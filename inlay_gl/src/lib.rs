// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! GPU surface and context lifecycle for inlay.
//!
//! A [`GraphicsSubsystem`] owns the process-wide EGL display. A
//! [`SurfaceManager`] built against it owns a render/resource
//! [`ContextPair`] and at most one live render surface, served by one of two
//! backends chosen from the host's [`GraphicsCapabilities`]:
//!
//! - **Classic GL**: the host hands over a GL texture in a share group; the
//!   surface is a framebuffer with that texture as color attachment.
//! - **Explicit API** (unix, `vulkan` feature): the host hands over a Vulkan
//!   image; the surface is a framebuffer over a GLES texture whose storage is
//!   Vulkan memory imported through `GL_EXT_memory_object_fd`, copied into
//!   the host image on [`present`](SurfaceManager::present).
//!
//! The driver is reached through the [`EglApi`] and [`GlesApi`] traits,
//! implemented by [`GlLibrary`] over the system libraries.
//!
//! The embedded engine sees the manager only as a [`RendererDelegate`].

mod api;
mod config;
mod context;
mod display;
mod error;
mod loader;
mod manager;
mod renderer;
mod surface;

#[cfg(unix)]
mod interop;
#[cfg(all(unix, feature = "vulkan"))]
mod vulkan;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use api::{
    EglApi, EglConfig, EglContext, EglDisplay, EglError, EglSurface, GL_FRAMEBUFFER_COMPLETE,
    GlesApi,
};
pub use config::SurfaceConfig;
pub use context::ContextPair;
pub use display::{DisplayConnection, GraphicsSubsystem};
pub use error::SurfaceError;
#[cfg(unix)]
pub use interop::{ExternalImageDevice, InteropImage};
pub use loader::GlLibrary;
pub use manager::SurfaceManager;
pub use renderer::RendererDelegate;
pub use surface::{
    GraphicsBackend, GraphicsCapabilities, QueueAccessFn, RenderTarget, VulkanHostHandles,
    VulkanTarget,
};
#[cfg(all(unix, feature = "vulkan"))]
pub use vulkan::AshImageDevice;
