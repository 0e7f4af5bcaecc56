// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory fakes of the driver seams.
//!
//! [`FakeGl`] implements [`EglApi`] and [`GlesApi`] with per-thread
//! current-context tracking, and panics on GL calls made with no context
//! current, the way a debug driver would complain. `FakeExternalImages`
//! stands in for the Vulkan side of the interop backend.

use core::ffi::{CStr, c_void};
use core::ptr;
use std::thread::{self, ThreadId};

use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;

use crate::api::{
    EglApi, EglConfig, EglContext, EglDisplay, EglError, EglSurface, GL_FRAMEBUFFER_COMPLETE,
    GlesApi,
};

const EGL_BAD_ALLOC: EglError = EglError(0x3003);
const EGL_NOT_INITIALIZED: EglError = EglError(0x3001);
const EGL_BAD_CONTEXT: EglError = EglError(0x3006);
/// `GL_FRAMEBUFFER_INCOMPLETE_ATTACHMENT`.
pub const INCOMPLETE_ATTACHMENT: u32 = 0x8CD6;

fn handle(n: usize) -> *mut c_void {
    ptr::without_provenance_mut(n)
}

#[derive(Default)]
struct GlState {
    next_handle: usize,
    next_name: u32,

    initialize_calls: usize,
    terminate_calls: usize,
    fail_initialize: bool,
    fail_choose_config: bool,
    contexts_until_failure: Option<usize>,

    host_context: Option<EglContext>,
    // Live contexts and the context each was shared with.
    contexts: HashMap<EglContext, EglContext>,
    destroyed: Vec<EglContext>,
    current: HashMap<ThreadId, EglContext>,

    framebuffers: HashMap<u32, Option<u32>>,
    textures: HashSet<u32>,
    memory_objects: HashMap<u32, bool>,
    framebuffer_binding: HashMap<EglContext, u32>,
    texture_binding: HashMap<EglContext, u32>,
    incomplete_framebuffers: bool,
    finish_calls: usize,
    memory_object_entry_points: bool,
    extensions: String,
}

impl GlState {
    fn handle(&mut self) -> *mut c_void {
        self.next_handle += 1;
        handle(0x1000 + self.next_handle * 0x10)
    }

    fn name(&mut self) -> u32 {
        self.next_name += 1;
        self.next_name
    }

    fn current(&self) -> EglContext {
        match self.current.get(&thread::current().id()) {
            Some(&context) => context,
            None => panic!("GL call with no context current on this thread"),
        }
    }
}

/// A fake EGL driver and GLES implementation.
pub struct FakeGl {
    state: Mutex<GlState>,
}

impl core::fmt::Debug for FakeGl {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FakeGl")
            .field("contexts", &state.contexts.len())
            .field("framebuffers", &state.framebuffers.len())
            .finish_non_exhaustive()
    }
}

impl Default for FakeGl {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeGl {
    /// Creates a driver with one host context already in existence and the
    /// memory-object extensions available.
    pub fn new() -> Self {
        let mut state = GlState {
            memory_object_entry_points: true,
            extensions: "GL_OES_rgb8_rgba8 GL_EXT_memory_object GL_EXT_memory_object_fd".into(),
            ..GlState::default()
        };
        let host = EglContext(state.handle());
        state.host_context = Some(host);
        Self {
            state: Mutex::new(state),
        }
    }

    /// The host's own context, usable as a share context.
    pub fn host_context(&self) -> EglContext {
        self.state.lock().host_context.unwrap_or(EglContext::NO_CONTEXT)
    }

    /// Number of `eglInitialize` calls.
    pub fn initialize_calls(&self) -> usize {
        self.state.lock().initialize_calls
    }

    /// Number of `eglTerminate` calls.
    pub fn terminate_calls(&self) -> usize {
        self.state.lock().terminate_calls
    }

    /// Makes `eglInitialize` fail.
    pub fn fail_initialize(&self, fail: bool) {
        self.state.lock().fail_initialize = fail;
    }

    /// Makes `eglChooseConfig` find no config.
    pub fn fail_choose_config(&self, fail: bool) {
        self.state.lock().fail_choose_config = fail;
    }

    /// Lets `successes` more contexts be created, then fails.
    pub fn fail_context_creation_after(&self, successes: usize) {
        self.state.lock().contexts_until_failure = Some(successes);
    }

    /// The context `context` was created sharing with, if it is live.
    pub fn share_of(&self, context: EglContext) -> Option<EglContext> {
        self.state.lock().contexts.get(&context).copied()
    }

    /// Contexts destroyed so far, in order.
    pub fn destroyed_contexts(&self) -> Vec<EglContext> {
        self.state.lock().destroyed.clone()
    }

    /// Number of live contexts created through this driver.
    pub fn live_contexts(&self) -> usize {
        self.state.lock().contexts.len()
    }

    /// Makes every framebuffer report incomplete.
    pub fn set_incomplete_framebuffers(&self, incomplete: bool) {
        self.state.lock().incomplete_framebuffers = incomplete;
    }

    /// Makes the memory-object entry points resolve or not.
    pub fn set_memory_object_entry_points(&self, available: bool) {
        self.state.lock().memory_object_entry_points = available;
    }

    /// Replaces the `GL_EXTENSIONS` string.
    pub fn set_extensions(&self, extensions: &str) {
        self.state.lock().extensions = extensions.into();
    }

    /// Number of live framebuffers.
    pub fn live_framebuffers(&self) -> usize {
        self.state.lock().framebuffers.len()
    }

    /// The texture attached to `fbo`, if `fbo` is live.
    pub fn attachment_of(&self, fbo: u32) -> Option<u32> {
        self.state.lock().framebuffers.get(&fbo).copied().flatten()
    }

    /// Number of live textures created through [`GlesApi::gen_texture`].
    pub fn live_textures(&self) -> usize {
        self.state.lock().textures.len()
    }

    /// Number of live memory objects.
    pub fn live_memory_objects(&self) -> usize {
        self.state.lock().memory_objects.len()
    }

    /// Number of `glFinish` calls.
    pub fn finish_calls(&self) -> usize {
        self.state.lock().finish_calls
    }
}

impl EglApi for FakeGl {
    fn default_display(&self) -> Result<EglDisplay, EglError> {
        Ok(EglDisplay(handle(0x10)))
    }

    fn initialize(&self, _display: EglDisplay) -> Result<(i32, i32), EglError> {
        let mut state = self.state.lock();
        state.initialize_calls += 1;
        if state.fail_initialize {
            Err(EGL_NOT_INITIALIZED)
        } else {
            Ok((1, 5))
        }
    }

    fn terminate(&self, _display: EglDisplay) -> Result<(), EglError> {
        self.state.lock().terminate_calls += 1;
        Ok(())
    }

    fn choose_config(
        &self,
        _display: EglDisplay,
        attribs: &[i32],
    ) -> Result<Option<EglConfig>, EglError> {
        assert_eq!(attribs.last(), Some(&0x3038), "attribute list terminated");
        let mut state = self.state.lock();
        if state.fail_choose_config {
            Ok(None)
        } else {
            Ok(Some(EglConfig(state.handle())))
        }
    }

    fn bind_gles_api(&self) -> Result<(), EglError> {
        Ok(())
    }

    fn create_context(
        &self,
        _display: EglDisplay,
        _config: EglConfig,
        share: EglContext,
        _attribs: &[i32],
    ) -> Result<EglContext, EglError> {
        let mut state = self.state.lock();
        if let Some(remaining) = state.contexts_until_failure.as_mut() {
            if *remaining == 0 {
                return Err(EGL_BAD_ALLOC);
            }
            *remaining -= 1;
        }
        let context = EglContext(state.handle());
        state.contexts.insert(context, share);
        Ok(context)
    }

    fn destroy_context(&self, _display: EglDisplay, context: EglContext) -> Result<(), EglError> {
        let mut state = self.state.lock();
        if state.contexts.remove(&context).is_none() {
            return Err(EGL_BAD_CONTEXT);
        }
        state.destroyed.push(context);
        Ok(())
    }

    fn make_current(
        &self,
        _display: EglDisplay,
        _draw: EglSurface,
        _read: EglSurface,
        context: EglContext,
    ) -> Result<(), EglError> {
        let mut state = self.state.lock();
        let id = thread::current().id();
        if context.is_null() {
            state.current.remove(&id);
            return Ok(());
        }
        if !state.contexts.contains_key(&context) {
            return Err(EGL_BAD_CONTEXT);
        }
        state.current.insert(id, context);
        Ok(())
    }

    fn current_context(&self) -> EglContext {
        let state = self.state.lock();
        state
            .current
            .get(&thread::current().id())
            .copied()
            .unwrap_or(EglContext::NO_CONTEXT)
    }

    fn proc_address(&self, name: &CStr) -> *const c_void {
        let bytes = name.to_bytes();
        if bytes.starts_with(b"gl") || bytes.starts_with(b"egl") {
            handle(0x10_0000 + bytes.len())
        } else {
            ptr::null()
        }
    }
}

impl GlesApi for FakeGl {
    fn framebuffer_binding(&self) -> u32 {
        let state = self.state.lock();
        let context = state.current();
        state.framebuffer_binding.get(&context).copied().unwrap_or(0)
    }

    fn gen_framebuffer(&self) -> u32 {
        let mut state = self.state.lock();
        state.current();
        let fbo = state.name();
        state.framebuffers.insert(fbo, None);
        fbo
    }

    fn bind_framebuffer(&self, fbo: u32) {
        let mut state = self.state.lock();
        let context = state.current();
        assert!(
            fbo == 0 || state.framebuffers.contains_key(&fbo),
            "binding unknown framebuffer {fbo}"
        );
        state.framebuffer_binding.insert(context, fbo);
    }

    fn framebuffer_texture_2d(&self, texture: u32) {
        let mut state = self.state.lock();
        let context = state.current();
        let bound = state.framebuffer_binding.get(&context).copied().unwrap_or(0);
        assert_ne!(bound, 0, "attaching to the default framebuffer");
        state.framebuffers.insert(bound, Some(texture));
    }

    fn check_framebuffer_status(&self) -> u32 {
        let state = self.state.lock();
        let context = state.current();
        let bound = state.framebuffer_binding.get(&context).copied().unwrap_or(0);
        let attached = state.framebuffers.get(&bound).copied().flatten();
        if state.incomplete_framebuffers || attached.is_none_or(|t| t == 0) {
            INCOMPLETE_ATTACHMENT
        } else {
            GL_FRAMEBUFFER_COMPLETE
        }
    }

    fn delete_framebuffer(&self, fbo: u32) {
        let mut state = self.state.lock();
        let context = state.current();
        assert!(
            state.framebuffers.remove(&fbo).is_some(),
            "deleting unknown framebuffer {fbo}"
        );
        if state.framebuffer_binding.get(&context) == Some(&fbo) {
            state.framebuffer_binding.insert(context, 0);
        }
    }

    fn texture_binding(&self) -> u32 {
        let state = self.state.lock();
        let context = state.current();
        state.texture_binding.get(&context).copied().unwrap_or(0)
    }

    fn gen_texture(&self) -> u32 {
        let mut state = self.state.lock();
        state.current();
        let texture = state.name();
        state.textures.insert(texture);
        texture
    }

    fn bind_texture(&self, texture: u32) {
        let mut state = self.state.lock();
        let context = state.current();
        state.texture_binding.insert(context, texture);
    }

    fn delete_texture(&self, texture: u32) {
        let mut state = self.state.lock();
        state.current();
        assert!(
            state.textures.remove(&texture),
            "deleting unknown texture {texture}"
        );
    }

    fn finish(&self) {
        let mut state = self.state.lock();
        state.current();
        state.finish_calls += 1;
    }

    fn extensions(&self) -> String {
        let state = self.state.lock();
        state.current();
        state.extensions.clone()
    }

    fn memory_object_entry_points(&self) -> bool {
        self.state.lock().memory_object_entry_points
    }

    fn create_memory_object(&self) -> u32 {
        let mut state = self.state.lock();
        state.current();
        let memory = state.name();
        state.memory_objects.insert(memory, false);
        memory
    }

    #[cfg(unix)]
    fn import_memory_fd(&self, memory: u32, size: u64, fd: std::os::fd::OwnedFd) {
        let mut state = self.state.lock();
        state.current();
        assert!(size > 0, "importing empty memory");
        let Some(imported) = state.memory_objects.get_mut(&memory) else {
            panic!("importing into unknown memory object {memory}");
        };
        *imported = true;
        drop(fd);
    }

    fn tex_storage_mem_2d(&self, width: u32, height: u32, memory: u32, _offset: u64) {
        let state = self.state.lock();
        let context = state.current();
        assert!(width > 0 && height > 0, "empty texture storage");
        assert_eq!(
            state.memory_objects.get(&memory),
            Some(&true),
            "storage from memory that was never imported"
        );
        assert_ne!(
            state.texture_binding.get(&context).copied().unwrap_or(0),
            0,
            "no texture bound for storage"
        );
    }

    fn delete_memory_object(&self, memory: u32) {
        let mut state = self.state.lock();
        state.current();
        assert!(
            state.memory_objects.remove(&memory).is_some(),
            "deleting unknown memory object {memory}"
        );
    }
}

#[cfg(unix)]
pub use images::{FakeExternalImages, FakeImageStats};

#[cfg(unix)]
mod images {
    use std::fs::File;
    use std::os::fd::OwnedFd;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::error::SurfaceError;
    use crate::interop::{ExternalImageDevice, InteropImage};
    use crate::surface::VulkanTarget;

    /// What a [`FakeExternalImages`] has been asked to do.
    #[derive(Clone, Debug, Default)]
    pub struct FakeImageStats {
        /// Images allocated, including the trial export.
        pub allocations: Vec<InteropImage>,
        /// Images released.
        pub releases: Vec<InteropImage>,
        /// `wait_idle` calls.
        pub wait_idle_calls: usize,
        /// Copies, as `(source, target)`.
        pub copies: Vec<(InteropImage, VulkanTarget)>,
        /// Makes the next allocation fail.
        pub fail_allocation: bool,
    }

    impl FakeImageStats {
        /// Images allocated and not yet released.
        pub fn live(&self) -> usize {
            self.allocations.len() - self.releases.len()
        }
    }

    /// A fake Vulkan device handing out `/dev/null` descriptors.
    #[derive(Debug, Default)]
    pub struct FakeExternalImages {
        stats: Arc<Mutex<FakeImageStats>>,
        next: u64,
    }

    impl FakeExternalImages {
        /// Creates a device and a handle to its stats.
        pub fn new() -> (Self, Arc<Mutex<FakeImageStats>>) {
            let device = Self::default();
            let stats = Arc::clone(&device.stats);
            (device, stats)
        }
    }

    impl ExternalImageDevice for FakeExternalImages {
        fn allocate(
            &mut self,
            width: u32,
            height: u32,
        ) -> Result<(InteropImage, OwnedFd), SurfaceError> {
            let mut stats = self.stats.lock();
            if stats.fail_allocation {
                stats.fail_allocation = false;
                return Err(SurfaceError::Vulkan {
                    call: "vkAllocateMemory",
                    code: -2,
                });
            }
            let fd = File::open("/dev/null").map_err(|_| SurfaceError::Vulkan {
                call: "vkGetMemoryFdKHR",
                code: -1,
            })?;
            self.next += 1;
            let image = InteropImage {
                image: 0xA000 + self.next,
                memory: 0xB000 + self.next,
                size: u64::from(width) * u64::from(height) * 4,
                width,
                height,
            };
            stats.allocations.push(image);
            Ok((image, OwnedFd::from(fd)))
        }

        fn copy_to_target(
            &mut self,
            image: &InteropImage,
            target: &VulkanTarget,
        ) -> Result<(), SurfaceError> {
            self.stats.lock().copies.push((*image, *target));
            Ok(())
        }

        fn wait_idle(&mut self) {
            self.stats.lock().wait_idle_calls += 1;
        }

        fn release(&mut self, image: InteropImage) {
            let mut stats = self.stats.lock();
            assert!(
                stats.allocations.contains(&image) && !stats.releases.contains(&image),
                "releasing an image that is not live"
            );
            stats.releases.push(image);
        }
    }
}
