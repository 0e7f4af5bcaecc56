// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The surface manager: contexts plus one backend-specific render surface.

use core::ffi::{CStr, c_void};
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::{EglContext, EglSurface, GlesApi};
use crate::config::SurfaceConfig;
use crate::context::ContextPair;
use crate::display::GraphicsSubsystem;
use crate::error::SurfaceError;
use crate::surface::{
    ClassicBackend, GraphicsBackend, GraphicsCapabilities, RenderTarget, SurfaceBackend,
    VulkanTarget,
};

/// Owns the render/resource contexts and the live render surface.
///
/// The backend is chosen once, at construction, from the host's
/// capabilities. Context binding is per thread and takes no lock; surface
/// creation and destruction must happen with the render context current on
/// the calling thread.
pub struct SurfaceManager {
    backend: Mutex<Box<dyn SurfaceBackend>>,
    contexts: ContextPair,
    gles: Arc<dyn GlesApi>,
    /// The live framebuffer, or 0.
    fbo: AtomicU32,
}

impl fmt::Debug for SurfaceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceManager")
            .field("backend", &self.backend_kind())
            .field("contexts", &self.contexts)
            .field("fbo", &self.fbo())
            .finish_non_exhaustive()
    }
}

impl SurfaceManager {
    /// Builds a manager for the host's graphics capabilities.
    ///
    /// GLES hosts get the classic backend with the render context sharing
    /// the host's context. Vulkan hosts get the interop backend over the
    /// host's device. Nothing survives a failure.
    pub fn initialize(
        graphics: &GraphicsSubsystem,
        capabilities: &GraphicsCapabilities,
        config: &SurfaceConfig,
    ) -> Result<Self, SurfaceError> {
        match capabilities {
            GraphicsCapabilities::Gles { share_context } => {
                Self::with_backend(graphics, *share_context, config, |_| {
                    Ok(Box::new(ClassicBackend::default()))
                })
            }
            #[cfg(all(unix, feature = "vulkan"))]
            GraphicsCapabilities::Vulkan(handles) => {
                Self::with_backend(graphics, EglContext::NO_CONTEXT, config, |gles| {
                    let device = crate::vulkan::AshImageDevice::new(handles)?;
                    let backend = crate::interop::InteropBackend::negotiate(Box::new(device), gles)?;
                    Ok(Box::new(backend))
                })
            }
            #[cfg(not(all(unix, feature = "vulkan")))]
            GraphicsCapabilities::Vulkan(_) => Err(SurfaceError::UnsupportedBackend(
                "Vulkan interop needs a unix target and the `vulkan` feature",
            )),
        }
    }

    /// Builds a manager on the interop backend over `device`.
    #[cfg(unix)]
    pub fn with_external_images(
        graphics: &GraphicsSubsystem,
        device: Box<dyn crate::interop::ExternalImageDevice>,
        config: &SurfaceConfig,
    ) -> Result<Self, SurfaceError> {
        Self::with_backend(graphics, EglContext::NO_CONTEXT, config, |gles| {
            Ok(Box::new(crate::interop::InteropBackend::negotiate(
                device, gles,
            )?))
        })
    }

    fn with_backend(
        graphics: &GraphicsSubsystem,
        share: EglContext,
        config: &SurfaceConfig,
        backend: impl FnOnce(&dyn GlesApi) -> Result<Box<dyn SurfaceBackend>, SurfaceError>,
    ) -> Result<Self, SurfaceError> {
        let connection = graphics.connection()?;
        let contexts = ContextPair::create(connection, config, share)?;
        let gles = Arc::clone(graphics.gles());
        // Extension queries need a current context.
        if !contexts.make_render_current(EglSurface::NO_SURFACE) {
            return Err(SurfaceError::ContextUnavailable);
        }
        let backend = backend(&*gles);
        contexts.clear_current();
        let backend = backend?;
        log::debug!("surface manager ready with {:?} backend", backend.kind());
        Ok(Self {
            backend: Mutex::new(backend),
            contexts,
            gles,
            fbo: AtomicU32::new(0),
        })
    }

    /// Returns the backend selected at construction.
    #[must_use]
    pub fn backend_kind(&self) -> GraphicsBackend {
        self.backend.lock().kind()
    }

    /// Interprets a host-native target handle for this manager's backend.
    #[must_use]
    pub fn target_from_native(&self, handle: usize, width: u32, height: u32) -> RenderTarget {
        match self.backend_kind() {
            GraphicsBackend::ClassicGl => {
                RenderTarget::GlTexture(u32::try_from(handle).unwrap_or_else(|_| {
                    log::warn!("texture handle {handle:#x} does not fit a GL name");
                    0
                }))
            }
            GraphicsBackend::ExplicitApi => RenderTarget::VulkanImage(VulkanTarget {
                image: handle as u64,
                width,
                height,
            }),
        }
    }

    /// Creates the render surface for `target` and returns its framebuffer.
    ///
    /// # Panics
    ///
    /// If the render context is not current on the calling thread, or a
    /// surface is already live.
    pub fn create_render_surface(&self, target: RenderTarget) -> Result<u32, SurfaceError> {
        assert!(
            self.contexts.is_render_current(),
            "render surface created without the render context current"
        );
        assert!(
            !self.has_surface(),
            "render surface created while another is live"
        );
        let fbo = self.backend.lock().create(&*self.gles, target)?;
        self.fbo.store(fbo, Ordering::Release);
        log::debug!("render surface {fbo} created for {target:?}");
        Ok(fbo)
    }

    /// Destroys the live render surface.
    ///
    /// # Panics
    ///
    /// If there is no live surface, or the render context is not current on
    /// the calling thread.
    pub fn destroy_render_surface(&self) {
        assert!(self.has_surface(), "destroy_render_surface with no live surface");
        assert!(
            self.contexts.is_render_current(),
            "render surface destroyed without the render context current"
        );
        self.backend.lock().destroy(&*self.gles);
        let fbo = self.fbo.swap(0, Ordering::AcqRel);
        log::debug!("render surface {fbo} destroyed");
    }

    /// Returns `true` while a render surface is live.
    #[must_use]
    pub fn has_surface(&self) -> bool {
        self.fbo() != 0
    }

    /// The live framebuffer, or 0 (the default framebuffer) when none is.
    #[must_use]
    pub fn fbo(&self) -> u32 {
        self.fbo.load(Ordering::Acquire)
    }

    /// Binds the render context on the calling thread.
    pub fn make_current(&self) -> bool {
        self.contexts.make_render_current(EglSurface::NO_SURFACE)
    }

    /// Binds the resource context on the calling thread.
    pub fn make_resource_current(&self) -> bool {
        self.contexts.make_resource_current()
    }

    /// Unbinds any context on the calling thread.
    pub fn clear_current(&self) -> bool {
        self.contexts.clear_current()
    }

    /// Publishes the last frame to the host target.
    pub fn present(&self) -> bool {
        self.backend.lock().present(&*self.gles)
    }

    /// Resolves a GL or EGL entry point by name.
    #[must_use]
    pub fn resolve_proc(&self, name: &CStr) -> *const c_void {
        self.contexts.connection().egl().proc_address(name)
    }

    /// Returns the context pair.
    #[must_use]
    pub fn contexts(&self) -> &ContextPair {
        &self.contexts
    }

    /// Destroys the resource context, then the render context.
    ///
    /// The display stays open; it belongs to the [`GraphicsSubsystem`].
    pub fn cleanup(self) {
        log::debug!("surface manager cleanup");
        drop(self);
    }
}

impl Drop for SurfaceManager {
    fn drop(&mut self) {
        if self.has_surface() {
            log::warn!(
                "surface manager dropped with render surface {} still live",
                self.fbo()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeGl, INCOMPLETE_ATTACHMENT};

    fn classic(fake: &Arc<FakeGl>) -> (GraphicsSubsystem, SurfaceManager) {
        let graphics = GraphicsSubsystem::new(fake.clone(), fake.clone());
        let caps = GraphicsCapabilities::Gles {
            share_context: fake.host_context(),
        };
        let manager = SurfaceManager::initialize(&graphics, &caps, &SurfaceConfig::gles2()).unwrap();
        (graphics, manager)
    }

    #[test]
    fn render_context_descends_from_host_context() {
        let fake = Arc::new(FakeGl::new());
        let (_graphics, manager) = classic(&fake);
        assert_eq!(manager.backend_kind(), GraphicsBackend::ClassicGl);
        assert_eq!(
            fake.share_of(manager.contexts().render()),
            Some(fake.host_context())
        );
    }

    #[test]
    fn clear_current_is_idempotent() {
        let fake = Arc::new(FakeGl::new());
        let (_graphics, manager) = classic(&fake);
        assert!(manager.make_current());
        assert!(manager.clear_current());
        assert!(manager.clear_current(), "second clear still succeeds");
        assert!(!manager.contexts().is_render_current(), "context stays unbound");
    }

    #[test]
    fn surface_round_trip_leaks_nothing() {
        let fake = Arc::new(FakeGl::new());
        let (_graphics, manager) = classic(&fake);
        assert!(manager.make_current());

        let first = manager.create_render_surface(RenderTarget::GlTexture(7)).unwrap();
        assert_eq!(fake.attachment_of(first), Some(7));
        assert_eq!(manager.fbo(), first);
        manager.destroy_render_surface();
        assert_eq!(fake.live_framebuffers(), 0);
        assert!(!manager.has_surface(), "nothing live after destroy");

        let second = manager.create_render_surface(RenderTarget::GlTexture(9)).unwrap();
        assert_eq!(fake.attachment_of(second), Some(9));
        assert_eq!(fake.live_framebuffers(), 1);
        assert!(manager.present(), "classic present always succeeds");
        manager.destroy_render_surface();
        assert!(manager.clear_current());
    }

    #[test]
    fn incomplete_framebuffer_is_fatal_and_cleaned_up() {
        let fake = Arc::new(FakeGl::new());
        let (_graphics, manager) = classic(&fake);
        assert!(manager.make_current());
        fake.set_incomplete_framebuffers(true);
        assert!(matches!(
            manager.create_render_surface(RenderTarget::GlTexture(7)),
            Err(SurfaceError::IncompleteFramebuffer(INCOMPLETE_ATTACHMENT))
        ));
        assert_eq!(fake.live_framebuffers(), 0);
        assert!(!manager.has_surface(), "no surface after failure");
    }

    #[test]
    fn target_kind_must_match_backend() {
        let fake = Arc::new(FakeGl::new());
        let (_graphics, manager) = classic(&fake);
        assert!(manager.make_current());
        let target = RenderTarget::VulkanImage(VulkanTarget {
            image: 1,
            width: 4,
            height: 4,
        });
        assert!(matches!(
            manager.create_render_surface(target),
            Err(SurfaceError::TargetMismatch(GraphicsBackend::ClassicGl))
        ));
        assert_eq!(
            manager.target_from_native(42, 10, 10),
            RenderTarget::GlTexture(42)
        );
    }

    #[test]
    #[should_panic(expected = "no live surface")]
    fn destroy_without_surface_is_a_contract_violation() {
        let fake = Arc::new(FakeGl::new());
        let (_graphics, manager) = classic(&fake);
        assert!(manager.make_current());
        manager.destroy_render_surface();
    }

    #[test]
    #[should_panic(expected = "without the render context current")]
    fn create_requires_render_context_current() {
        let fake = Arc::new(FakeGl::new());
        let (_graphics, manager) = classic(&fake);
        let _ = manager.create_render_surface(RenderTarget::GlTexture(7));
    }

    #[test]
    fn cleanup_destroys_contexts_but_keeps_display() {
        let fake = Arc::new(FakeGl::new());
        let (graphics, manager) = classic(&fake);
        let (render, resource) = (manager.contexts().render(), manager.contexts().resource());
        manager.cleanup();
        assert_eq!(fake.destroyed_contexts(), vec![resource, render]);
        assert!(graphics.is_open(), "display outlives the manager");
        assert_eq!(fake.terminate_calls(), 0);
    }

    #[test]
    fn resolve_proc_goes_through_egl() {
        let fake = Arc::new(FakeGl::new());
        let (_graphics, manager) = classic(&fake);
        assert!(!manager.resolve_proc(c"glClear").is_null());
        assert!(manager.resolve_proc(c"vkCreateInstance").is_null());
    }

    #[cfg(unix)]
    mod interop {
        use super::*;
        use crate::api::EglApi;
        use crate::testing::FakeExternalImages;

        #[test]
        fn interop_surface_lifecycle() {
            let fake = Arc::new(FakeGl::new());
            let graphics = GraphicsSubsystem::new(fake.clone(), fake.clone());
            let (device, stats) = FakeExternalImages::new();
            let manager = SurfaceManager::with_external_images(
                &graphics,
                Box::new(device),
                &SurfaceConfig::gles2(),
            )
            .unwrap();
            assert_eq!(manager.backend_kind(), GraphicsBackend::ExplicitApi);
            assert_eq!(stats.lock().live(), 0, "trial image released");

            assert!(manager.make_current());
            let target = manager.target_from_native(0xF00, 320, 200);
            let fbo = manager.create_render_surface(target).unwrap();
            assert_ne!(fbo, 0);
            {
                let stats = stats.lock();
                assert_eq!(stats.live(), 1);
                let image = stats.allocations.last().unwrap();
                assert_eq!((image.width, image.height), (320, 200), "real target extent");
            }
            assert_eq!(fake.live_textures(), 1);
            assert_eq!(fake.live_memory_objects(), 1);

            assert!(manager.present());
            assert_eq!(fake.finish_calls(), 1);
            assert_eq!(
                stats.lock().copies.last().map(|(_, t)| t.image),
                Some(0xF00)
            );

            manager.destroy_render_surface();
            let stats = stats.lock();
            assert_eq!(stats.live(), 0);
            assert!(stats.wait_idle_calls >= 1, "destroy waits for the device");
            assert_eq!(fake.live_framebuffers(), 0);
            assert_eq!(fake.live_textures(), 0);
            assert_eq!(fake.live_memory_objects(), 0);
        }

        #[test]
        fn interop_requires_memory_object_extension() {
            let fake = Arc::new(FakeGl::new());
            fake.set_memory_object_entry_points(false);
            let graphics = GraphicsSubsystem::new(fake.clone(), fake.clone());
            let (device, _stats) = FakeExternalImages::new();
            assert!(matches!(
                SurfaceManager::with_external_images(
                    &graphics,
                    Box::new(device),
                    &SurfaceConfig::gles2()
                ),
                Err(SurfaceError::MissingExtension("GL_EXT_memory_object_fd"))
            ));
            assert_eq!(fake.live_contexts(), 0, "contexts unwound");
        }

        #[test]
        fn resolved_entry_points_without_the_extension_are_refused() {
            let fake = Arc::new(FakeGl::new());
            fake.set_extensions("GL_OES_rgb8_rgba8 GL_EXT_memory_object");
            let graphics = GraphicsSubsystem::new(fake.clone(), fake.clone());
            let (device, stats) = FakeExternalImages::new();
            assert!(matches!(
                SurfaceManager::with_external_images(
                    &graphics,
                    Box::new(device),
                    &SurfaceConfig::gles2()
                ),
                Err(SurfaceError::MissingExtension("GL_EXT_memory_object_fd"))
            ));
            assert!(stats.lock().allocations.is_empty(), "nothing exported");
            assert_eq!(fake.live_contexts(), 0);
            assert_eq!(fake.current_context(), EglContext::NO_CONTEXT);
        }

        #[test]
        fn failed_import_releases_the_image() {
            let fake = Arc::new(FakeGl::new());
            let graphics = GraphicsSubsystem::new(fake.clone(), fake.clone());
            let (device, stats) = FakeExternalImages::new();
            let manager = SurfaceManager::with_external_images(
                &graphics,
                Box::new(device),
                &SurfaceConfig::gles2(),
            )
            .unwrap();
            assert!(manager.make_current());
            fake.set_incomplete_framebuffers(true);
            let target = manager.target_from_native(0xF00, 64, 64);
            assert!(manager.create_render_surface(target).is_err());
            assert_eq!(stats.lock().live(), 0);
            assert_eq!(fake.live_textures(), 0);
            assert_eq!(fake.live_memory_objects(), 0);
        }
    }
}
