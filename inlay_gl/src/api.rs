// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The EGL and GLES entry points inlay uses, as traits.
//!
//! [`EglApi`] and [`GlesApi`] are the seam between the surface manager and
//! the driver. [`GlLibrary`](crate::GlLibrary) implements both by loading the
//! system libraries; tests use the fakes in `testing`.
//!
//! GLES calls act on whatever context is current on the calling thread, the
//! same as the C API.

#![expect(
    unsafe_code,
    reason = "EGL handles are raw driver pointers shared across threads"
)]

use core::ffi::{CStr, c_void};
use core::fmt;

// EGL attributes and values.
pub(crate) const EGL_NONE: i32 = 0x3038;
pub(crate) const EGL_ALPHA_SIZE: i32 = 0x3021;
pub(crate) const EGL_BLUE_SIZE: i32 = 0x3022;
pub(crate) const EGL_GREEN_SIZE: i32 = 0x3023;
pub(crate) const EGL_RED_SIZE: i32 = 0x3024;
pub(crate) const EGL_DEPTH_SIZE: i32 = 0x3025;
pub(crate) const EGL_STENCIL_SIZE: i32 = 0x3026;
pub(crate) const EGL_SURFACE_TYPE: i32 = 0x3033;
pub(crate) const EGL_RENDERABLE_TYPE: i32 = 0x3040;
pub(crate) const EGL_CONTEXT_CLIENT_VERSION: i32 = 0x3098;
pub(crate) const EGL_WINDOW_BIT: i32 = 0x0004;
pub(crate) const EGL_OPENGL_ES2_BIT: i32 = 0x0004;
pub(crate) const EGL_OPENGL_ES_API: u32 = 0x30A0;

// EGL error codes.
const EGL_SUCCESS: i32 = 0x3000;
const EGL_NOT_INITIALIZED: i32 = 0x3001;
const EGL_BAD_ACCESS: i32 = 0x3002;
const EGL_BAD_ALLOC: i32 = 0x3003;
const EGL_BAD_ATTRIBUTE: i32 = 0x3004;
const EGL_BAD_CONFIG: i32 = 0x3005;
const EGL_BAD_CONTEXT: i32 = 0x3006;
const EGL_BAD_CURRENT_SURFACE: i32 = 0x3007;
const EGL_BAD_DISPLAY: i32 = 0x3008;
const EGL_BAD_MATCH: i32 = 0x3009;
const EGL_BAD_PARAMETER: i32 = 0x300C;
const EGL_BAD_SURFACE: i32 = 0x300D;
const EGL_CONTEXT_LOST: i32 = 0x300E;

// GLES enums.
pub(crate) const GL_FRAMEBUFFER: u32 = 0x8D40;
pub(crate) const GL_FRAMEBUFFER_BINDING: u32 = 0x8CA6;
pub(crate) const GL_COLOR_ATTACHMENT0: u32 = 0x8CE0;
pub(crate) const GL_TEXTURE_2D: u32 = 0x0DE1;
pub(crate) const GL_TEXTURE_BINDING_2D: u32 = 0x8069;
/// `glCheckFramebufferStatus` result for a usable framebuffer.
pub const GL_FRAMEBUFFER_COMPLETE: u32 = 0x8CD5;
pub(crate) const GL_RGBA8: u32 = 0x8058;
pub(crate) const GL_HANDLE_TYPE_OPAQUE_FD_EXT: u32 = 0x9586;
pub(crate) const GL_EXTENSIONS: u32 = 0x1F03;

macro_rules! egl_handle {
    ($(#[$meta:meta])* $name:ident, $none:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub *mut c_void);

        // SAFETY: EGL handles are opaque driver identifiers; EGL itself is
        // thread-safe and inlay never dereferences them.
        unsafe impl Send for $name {}
        // SAFETY: as above.
        unsafe impl Sync for $name {}

        impl $name {
            /// The null handle.
            pub const $none: Self = Self(core::ptr::null_mut());

            /// Returns `true` for the null handle.
            #[must_use]
            pub fn is_null(self) -> bool {
                self.0.is_null()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:p})"), self.0)
            }
        }
    };
}

egl_handle!(
    /// An `EGLDisplay`.
    EglDisplay,
    NO_DISPLAY
);
egl_handle!(
    /// An `EGLConfig`.
    EglConfig,
    NO_CONFIG
);
egl_handle!(
    /// An `EGLContext`.
    EglContext,
    NO_CONTEXT
);
egl_handle!(
    /// An `EGLSurface`. The null surface doubles as the off-screen
    /// placeholder for surfaceless binding.
    EglSurface,
    NO_SURFACE
);

/// An EGL error code as reported by `eglGetError`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EglError(pub i32);

impl EglError {
    /// Returns the symbolic name of the code.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self.0 {
            EGL_SUCCESS => "EGL_SUCCESS",
            EGL_NOT_INITIALIZED => "EGL_NOT_INITIALIZED",
            EGL_BAD_ACCESS => "EGL_BAD_ACCESS",
            EGL_BAD_ALLOC => "EGL_BAD_ALLOC",
            EGL_BAD_ATTRIBUTE => "EGL_BAD_ATTRIBUTE",
            EGL_BAD_CONFIG => "EGL_BAD_CONFIG",
            EGL_BAD_CONTEXT => "EGL_BAD_CONTEXT",
            EGL_BAD_CURRENT_SURFACE => "EGL_BAD_CURRENT_SURFACE",
            EGL_BAD_DISPLAY => "EGL_BAD_DISPLAY",
            EGL_BAD_MATCH => "EGL_BAD_MATCH",
            EGL_BAD_PARAMETER => "EGL_BAD_PARAMETER",
            EGL_BAD_SURFACE => "EGL_BAD_SURFACE",
            EGL_CONTEXT_LOST => "EGL_CONTEXT_LOST",
            _ => "unknown EGL error",
        }
    }
}

impl fmt::Debug for EglError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:#x})", self.name(), self.0)
    }
}

impl fmt::Display for EglError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#x})", self.name(), self.0)
    }
}

impl core::error::Error for EglError {}

/// The EGL entry points inlay uses.
pub trait EglApi: Send + Sync {
    /// `eglGetDisplay(EGL_DEFAULT_DISPLAY)`.
    fn default_display(&self) -> Result<EglDisplay, EglError>;

    /// `eglInitialize`; returns the `(major, minor)` version.
    fn initialize(&self, display: EglDisplay) -> Result<(i32, i32), EglError>;

    /// `eglTerminate`.
    fn terminate(&self, display: EglDisplay) -> Result<(), EglError>;

    /// `eglChooseConfig` for one config. `attribs` is `EGL_NONE`-terminated.
    ///
    /// Returns `Ok(None)` when no config matches.
    fn choose_config(
        &self,
        display: EglDisplay,
        attribs: &[i32],
    ) -> Result<Option<EglConfig>, EglError>;

    /// `eglBindAPI(EGL_OPENGL_ES_API)`.
    fn bind_gles_api(&self) -> Result<(), EglError>;

    /// `eglCreateContext`. `attribs` is `EGL_NONE`-terminated.
    fn create_context(
        &self,
        display: EglDisplay,
        config: EglConfig,
        share: EglContext,
        attribs: &[i32],
    ) -> Result<EglContext, EglError>;

    /// `eglDestroyContext`.
    fn destroy_context(&self, display: EglDisplay, context: EglContext) -> Result<(), EglError>;

    /// `eglMakeCurrent` on the calling thread.
    fn make_current(
        &self,
        display: EglDisplay,
        draw: EglSurface,
        read: EglSurface,
        context: EglContext,
    ) -> Result<(), EglError>;

    /// `eglGetCurrentContext` for the calling thread.
    fn current_context(&self) -> EglContext;

    /// `eglGetProcAddress`. Returns null for unknown names.
    fn proc_address(&self, name: &CStr) -> *const c_void;
}

/// The GLES entry points inlay uses, acting on the calling thread's current
/// context.
pub trait GlesApi: Send + Sync {
    /// `glGetIntegerv(GL_FRAMEBUFFER_BINDING)`.
    fn framebuffer_binding(&self) -> u32;

    /// `glGenFramebuffers(1)`.
    fn gen_framebuffer(&self) -> u32;

    /// `glBindFramebuffer(GL_FRAMEBUFFER, fbo)`.
    fn bind_framebuffer(&self, fbo: u32);

    /// `glFramebufferTexture2D` onto `GL_COLOR_ATTACHMENT0` of the bound
    /// framebuffer.
    fn framebuffer_texture_2d(&self, texture: u32);

    /// `glCheckFramebufferStatus(GL_FRAMEBUFFER)`.
    fn check_framebuffer_status(&self) -> u32;

    /// `glDeleteFramebuffers(1)`.
    fn delete_framebuffer(&self, fbo: u32);

    /// `glGetIntegerv(GL_TEXTURE_BINDING_2D)`.
    fn texture_binding(&self) -> u32;

    /// `glGenTextures(1)`.
    fn gen_texture(&self) -> u32;

    /// `glBindTexture(GL_TEXTURE_2D, texture)`.
    fn bind_texture(&self, texture: u32);

    /// `glDeleteTextures(1)`.
    fn delete_texture(&self, texture: u32);

    /// `glFinish`.
    fn finish(&self);

    /// `glGetString(GL_EXTENSIONS)`: the space-separated extension list of
    /// the current context.
    fn extensions(&self) -> String;

    /// Returns `true` if the memory-object entry points resolved. Resolution
    /// alone does not mean the driver supports the extensions.
    fn memory_object_entry_points(&self) -> bool;

    /// `glCreateMemoryObjectsEXT(1)`.
    fn create_memory_object(&self) -> u32;

    /// `glImportMemoryFdEXT` with `GL_HANDLE_TYPE_OPAQUE_FD_EXT`.
    ///
    /// On success GL owns `fd`.
    #[cfg(unix)]
    fn import_memory_fd(&self, memory: u32, size: u64, fd: std::os::fd::OwnedFd);

    /// `glTexStorageMem2DEXT` on the bound `GL_TEXTURE_2D`, `GL_RGBA8`, one
    /// level.
    fn tex_storage_mem_2d(&self, width: u32, height: u32, memory: u32, offset: u64);

    /// `glDeleteMemoryObjectsEXT(1)`.
    fn delete_memory_object(&self, memory: u32);
}

/// Returns `true` if `name` appears in the extension list `extensions`.
fn has_extension(extensions: &str, name: &str) -> bool {
    extensions.split_ascii_whitespace().any(|e| e == name)
}

/// Returns `true` if the current context advertises `GL_EXT_memory_object`
/// and `GL_EXT_memory_object_fd` and their entry points resolved.
///
/// A context must be current on the calling thread.
pub(crate) fn supports_memory_object_fd(gl: &dyn GlesApi) -> bool {
    if !gl.memory_object_entry_points() {
        return false;
    }
    let extensions = gl.extensions();
    has_extension(&extensions, "GL_EXT_memory_object")
        && has_extension(&extensions, "GL_EXT_memory_object_fd")
}
