// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime loading of the system EGL and GLES libraries.

#![expect(unsafe_code, reason = "calling into dynamically loaded EGL and GLES")]

use core::ffi::{CStr, c_char, c_void};
use core::{fmt, mem, ptr};

use libloading::Library;

use crate::api::{
    EGL_OPENGL_ES_API, EglApi, EglConfig, EglContext, EglDisplay, EglError, EglSurface,
    GL_COLOR_ATTACHMENT0, GL_EXTENSIONS, GL_FRAMEBUFFER, GL_FRAMEBUFFER_BINDING, GL_HANDLE_TYPE_OPAQUE_FD_EXT,
    GL_RGBA8, GL_TEXTURE_2D, GL_TEXTURE_BINDING_2D, GlesApi,
};
use crate::config::SurfaceConfig;
use crate::error::SurfaceError;

type EglBoolean = u32;
const EGL_FALSE: EglBoolean = 0;

type EglGetDisplayFn = unsafe extern "system" fn(*mut c_void) -> *mut c_void;
type EglInitializeFn = unsafe extern "system" fn(*mut c_void, *mut i32, *mut i32) -> EglBoolean;
type EglTerminateFn = unsafe extern "system" fn(*mut c_void) -> EglBoolean;
type EglChooseConfigFn = unsafe extern "system" fn(
    *mut c_void,
    *const i32,
    *mut *mut c_void,
    i32,
    *mut i32,
) -> EglBoolean;
type EglBindApiFn = unsafe extern "system" fn(u32) -> EglBoolean;
type EglCreateContextFn =
    unsafe extern "system" fn(*mut c_void, *mut c_void, *mut c_void, *const i32) -> *mut c_void;
type EglDestroyContextFn = unsafe extern "system" fn(*mut c_void, *mut c_void) -> EglBoolean;
type EglMakeCurrentFn =
    unsafe extern "system" fn(*mut c_void, *mut c_void, *mut c_void, *mut c_void) -> EglBoolean;
type EglGetCurrentContextFn = unsafe extern "system" fn() -> *mut c_void;
type EglGetProcAddressFn = unsafe extern "system" fn(*const c_char) -> *const c_void;
type EglGetErrorFn = unsafe extern "system" fn() -> i32;

type GlGetIntegervFn = unsafe extern "system" fn(u32, *mut i32);
type GlGenFn = unsafe extern "system" fn(i32, *mut u32);
type GlDeleteFn = unsafe extern "system" fn(i32, *const u32);
type GlBindFn = unsafe extern "system" fn(u32, u32);
type GlFramebufferTexture2DFn = unsafe extern "system" fn(u32, u32, u32, u32, i32);
type GlCheckFramebufferStatusFn = unsafe extern "system" fn(u32) -> u32;
type GlFinishFn = unsafe extern "system" fn();
type GlGetStringFn = unsafe extern "system" fn(u32) -> *const c_char;
type GlImportMemoryFdFn = unsafe extern "system" fn(u32, u64, u32, i32);
type GlTexStorageMem2DFn = unsafe extern "system" fn(u32, i32, u32, i32, i32, u32, u64);

/// Looks up `name` (NUL-terminated) in `lib`.
fn symbol<T: Copy>(lib: &Library, name: &'static str) -> Result<T, SurfaceError> {
    // SAFETY: every `T` used below is the documented signature of `name`.
    unsafe { lib.get::<T>(name.as_bytes()) }
        .map(|sym| *sym)
        .map_err(|_| SurfaceError::MissingSymbol(name.trim_end_matches('\0')))
}

fn open_first(kind: &'static str, names: &[String]) -> Result<Library, SurfaceError> {
    for name in names {
        // SAFETY: EGL and GLES loaders run no initializers with preconditions.
        match unsafe { Library::new(name) } {
            Ok(lib) => {
                log::debug!("loaded {kind} from {name}");
                return Ok(lib);
            }
            Err(err) => log::trace!("{kind}: {name} unavailable: {err}"),
        }
    }
    Err(SurfaceError::LibraryNotFound {
        kind,
        tried: names.to_vec(),
    })
}

fn size(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[derive(Clone, Copy)]
struct EglFns {
    get_display: EglGetDisplayFn,
    initialize: EglInitializeFn,
    terminate: EglTerminateFn,
    choose_config: EglChooseConfigFn,
    bind_api: EglBindApiFn,
    create_context: EglCreateContextFn,
    destroy_context: EglDestroyContextFn,
    make_current: EglMakeCurrentFn,
    get_current_context: EglGetCurrentContextFn,
    get_proc_address: EglGetProcAddressFn,
    get_error: EglGetErrorFn,
}

impl EglFns {
    fn load(lib: &Library) -> Result<Self, SurfaceError> {
        Ok(Self {
            get_display: symbol(lib, "eglGetDisplay\0")?,
            initialize: symbol(lib, "eglInitialize\0")?,
            terminate: symbol(lib, "eglTerminate\0")?,
            choose_config: symbol(lib, "eglChooseConfig\0")?,
            bind_api: symbol(lib, "eglBindAPI\0")?,
            create_context: symbol(lib, "eglCreateContext\0")?,
            destroy_context: symbol(lib, "eglDestroyContext\0")?,
            make_current: symbol(lib, "eglMakeCurrent\0")?,
            get_current_context: symbol(lib, "eglGetCurrentContext\0")?,
            get_proc_address: symbol(lib, "eglGetProcAddress\0")?,
            get_error: symbol(lib, "eglGetError\0")?,
        })
    }
}

#[derive(Clone, Copy)]
struct GlFns {
    get_integerv: GlGetIntegervFn,
    gen_framebuffers: GlGenFn,
    bind_framebuffer: GlBindFn,
    framebuffer_texture_2d: GlFramebufferTexture2DFn,
    check_framebuffer_status: GlCheckFramebufferStatusFn,
    delete_framebuffers: GlDeleteFn,
    gen_textures: GlGenFn,
    bind_texture: GlBindFn,
    delete_textures: GlDeleteFn,
    finish: GlFinishFn,
    get_string: GlGetStringFn,
}

impl GlFns {
    fn load(lib: &Library) -> Result<Self, SurfaceError> {
        Ok(Self {
            get_integerv: symbol(lib, "glGetIntegerv\0")?,
            gen_framebuffers: symbol(lib, "glGenFramebuffers\0")?,
            bind_framebuffer: symbol(lib, "glBindFramebuffer\0")?,
            framebuffer_texture_2d: symbol(lib, "glFramebufferTexture2D\0")?,
            check_framebuffer_status: symbol(lib, "glCheckFramebufferStatus\0")?,
            delete_framebuffers: symbol(lib, "glDeleteFramebuffers\0")?,
            gen_textures: symbol(lib, "glGenTextures\0")?,
            bind_texture: symbol(lib, "glBindTexture\0")?,
            delete_textures: symbol(lib, "glDeleteTextures\0")?,
            finish: symbol(lib, "glFinish\0")?,
            get_string: symbol(lib, "glGetString\0")?,
        })
    }
}

/// `GL_EXT_memory_object` and `GL_EXT_memory_object_fd` entry points.
///
/// Resolved without a context; whether the driver really supports the
/// extensions is checked against `GL_EXTENSIONS` once a context is current.
#[derive(Clone, Copy)]
struct MemoryObjectFns {
    create_memory_objects: GlGenFn,
    import_memory_fd: GlImportMemoryFdFn,
    tex_storage_mem_2d: GlTexStorageMem2DFn,
    delete_memory_objects: GlDeleteFn,
}

impl MemoryObjectFns {
    fn resolve(egl: &EglFns) -> Option<Self> {
        let lookup = |name: &CStr| {
            // SAFETY: `name` is NUL-terminated; lookup has no other preconditions.
            let p = unsafe { (egl.get_proc_address)(name.as_ptr()) };
            (!p.is_null()).then_some(p)
        };
        let create = lookup(c"glCreateMemoryObjectsEXT")?;
        let import = lookup(c"glImportMemoryFdEXT")?;
        let storage = lookup(c"glTexStorageMem2DEXT")?;
        let delete = lookup(c"glDeleteMemoryObjectsEXT")?;
        // SAFETY: non-null pointers returned for these names have the
        // signatures declared by the extension specifications.
        unsafe {
            Some(Self {
                create_memory_objects: mem::transmute::<*const c_void, GlGenFn>(create),
                import_memory_fd: mem::transmute::<*const c_void, GlImportMemoryFdFn>(import),
                tex_storage_mem_2d: mem::transmute::<*const c_void, GlTexStorageMem2DFn>(storage),
                delete_memory_objects: mem::transmute::<*const c_void, GlDeleteFn>(delete),
            })
        }
    }
}

/// The system EGL and GLES libraries.
///
/// Implements [`EglApi`] and [`GlesApi`]. Function pointers stay valid for as
/// long as this value (which owns both libraries) is alive.
pub struct GlLibrary {
    egl: EglFns,
    gl: GlFns,
    memory: Option<MemoryObjectFns>,
    _egl_lib: Library,
    _gles_lib: Library,
}

impl fmt::Debug for GlLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlLibrary")
            .field("memory_object_entry_points", &self.memory.is_some())
            .finish_non_exhaustive()
    }
}

impl GlLibrary {
    /// Loads EGL and GLES, trying the library names in `config` in order.
    pub fn load(config: &SurfaceConfig) -> Result<Self, SurfaceError> {
        let egl_lib = open_first("EGL", &config.egl_libraries)?;
        let gles_lib = open_first("GLES", &config.gles_libraries)?;
        let egl = EglFns::load(&egl_lib)?;
        let gl = GlFns::load(&gles_lib)?;
        let memory = MemoryObjectFns::resolve(&egl);
        if memory.is_none() {
            log::debug!("GL_EXT_memory_object_fd entry points unavailable");
        }
        Ok(Self {
            egl,
            gl,
            memory,
            _egl_lib: egl_lib,
            _gles_lib: gles_lib,
        })
    }

    fn last_error(&self) -> EglError {
        // SAFETY: no preconditions.
        EglError(unsafe { (self.egl.get_error)() })
    }

    fn check(&self, ok: EglBoolean) -> Result<(), EglError> {
        if ok == EGL_FALSE {
            Err(self.last_error())
        } else {
            Ok(())
        }
    }

    fn get_integer(&self, pname: u32) -> u32 {
        let mut value = 0_i32;
        // SAFETY: `value` is a valid out pointer for a single-valued query.
        unsafe { (self.gl.get_integerv)(pname, &mut value) };
        value.try_into().unwrap_or(0)
    }

    fn gen_one(&self, gen_fn: GlGenFn) -> u32 {
        let mut name = 0_u32;
        // SAFETY: `name` is a valid out pointer for one name.
        unsafe { gen_fn(1, &mut name) };
        name
    }

    fn delete_one(&self, delete_fn: GlDeleteFn, name: u32) {
        // SAFETY: `name` is a valid pointer to one name.
        unsafe { delete_fn(1, &name) };
    }

    fn memory_fns(&self) -> MemoryObjectFns {
        match self.memory {
            Some(fns) => fns,
            None => panic!("memory object entry points used without GL_EXT_memory_object_fd"),
        }
    }
}

impl EglApi for GlLibrary {
    fn default_display(&self) -> Result<EglDisplay, EglError> {
        // SAFETY: `EGL_DEFAULT_DISPLAY` is the null native display.
        let display = unsafe { (self.egl.get_display)(ptr::null_mut()) };
        if display.is_null() {
            Err(self.last_error())
        } else {
            Ok(EglDisplay(display))
        }
    }

    fn initialize(&self, display: EglDisplay) -> Result<(i32, i32), EglError> {
        let (mut major, mut minor) = (0, 0);
        // SAFETY: out pointers are valid; the display came from eglGetDisplay.
        self.check(unsafe { (self.egl.initialize)(display.0, &mut major, &mut minor) })?;
        Ok((major, minor))
    }

    fn terminate(&self, display: EglDisplay) -> Result<(), EglError> {
        // SAFETY: terminating an initialized display has no other preconditions.
        self.check(unsafe { (self.egl.terminate)(display.0) })
    }

    fn choose_config(
        &self,
        display: EglDisplay,
        attribs: &[i32],
    ) -> Result<Option<EglConfig>, EglError> {
        let mut config = ptr::null_mut();
        let mut count = 0;
        // SAFETY: `attribs` is EGL_NONE-terminated; room for one config.
        self.check(unsafe {
            (self.egl.choose_config)(display.0, attribs.as_ptr(), &mut config, 1, &mut count)
        })?;
        Ok((count > 0).then_some(EglConfig(config)))
    }

    fn bind_gles_api(&self) -> Result<(), EglError> {
        // SAFETY: no preconditions.
        self.check(unsafe { (self.egl.bind_api)(EGL_OPENGL_ES_API) })
    }

    fn create_context(
        &self,
        display: EglDisplay,
        config: EglConfig,
        share: EglContext,
        attribs: &[i32],
    ) -> Result<EglContext, EglError> {
        // SAFETY: handles come from this display; `attribs` is EGL_NONE-terminated.
        let context = unsafe {
            (self.egl.create_context)(display.0, config.0, share.0, attribs.as_ptr())
        };
        if context.is_null() {
            Err(self.last_error())
        } else {
            Ok(EglContext(context))
        }
    }

    fn destroy_context(&self, display: EglDisplay, context: EglContext) -> Result<(), EglError> {
        // SAFETY: the context belongs to `display`.
        self.check(unsafe { (self.egl.destroy_context)(display.0, context.0) })
    }

    fn make_current(
        &self,
        display: EglDisplay,
        draw: EglSurface,
        read: EglSurface,
        context: EglContext,
    ) -> Result<(), EglError> {
        // SAFETY: all handles belong to `display` or are null.
        self.check(unsafe { (self.egl.make_current)(display.0, draw.0, read.0, context.0) })
    }

    fn current_context(&self) -> EglContext {
        // SAFETY: no preconditions.
        EglContext(unsafe { (self.egl.get_current_context)() })
    }

    fn proc_address(&self, name: &CStr) -> *const c_void {
        // SAFETY: `name` is NUL-terminated.
        unsafe { (self.egl.get_proc_address)(name.as_ptr()) }
    }
}

impl GlesApi for GlLibrary {
    fn framebuffer_binding(&self) -> u32 {
        self.get_integer(GL_FRAMEBUFFER_BINDING)
    }

    fn gen_framebuffer(&self) -> u32 {
        self.gen_one(self.gl.gen_framebuffers)
    }

    fn bind_framebuffer(&self, fbo: u32) {
        // SAFETY: GL validates names; a context is current on this thread.
        unsafe { (self.gl.bind_framebuffer)(GL_FRAMEBUFFER, fbo) };
    }

    fn framebuffer_texture_2d(&self, texture: u32) {
        // SAFETY: as above.
        unsafe {
            (self.gl.framebuffer_texture_2d)(
                GL_FRAMEBUFFER,
                GL_COLOR_ATTACHMENT0,
                GL_TEXTURE_2D,
                texture,
                0,
            );
        }
    }

    fn check_framebuffer_status(&self) -> u32 {
        // SAFETY: as above.
        unsafe { (self.gl.check_framebuffer_status)(GL_FRAMEBUFFER) }
    }

    fn delete_framebuffer(&self, fbo: u32) {
        self.delete_one(self.gl.delete_framebuffers, fbo);
    }

    fn texture_binding(&self) -> u32 {
        self.get_integer(GL_TEXTURE_BINDING_2D)
    }

    fn gen_texture(&self) -> u32 {
        self.gen_one(self.gl.gen_textures)
    }

    fn bind_texture(&self, texture: u32) {
        // SAFETY: as for `bind_framebuffer`.
        unsafe { (self.gl.bind_texture)(GL_TEXTURE_2D, texture) };
    }

    fn delete_texture(&self, texture: u32) {
        self.delete_one(self.gl.delete_textures, texture);
    }

    fn finish(&self) {
        // SAFETY: no preconditions beyond a current context.
        unsafe { (self.gl.finish)() };
    }

    fn extensions(&self) -> String {
        // SAFETY: GL_EXTENSIONS is a valid name for glGetString in ES 2.0.
        let list = unsafe { (self.gl.get_string)(GL_EXTENSIONS) };
        if list.is_null() {
            return String::new();
        }
        // SAFETY: non-null results are NUL-terminated and owned by GL.
        unsafe { CStr::from_ptr(list) }.to_string_lossy().into_owned()
    }

    fn memory_object_entry_points(&self) -> bool {
        self.memory.is_some()
    }

    fn create_memory_object(&self) -> u32 {
        self.gen_one(self.memory_fns().create_memory_objects)
    }

    #[cfg(unix)]
    fn import_memory_fd(&self, memory: u32, size: u64, fd: std::os::fd::OwnedFd) {
        use std::os::fd::IntoRawFd;

        let import = self.memory_fns().import_memory_fd;
        // SAFETY: GL takes ownership of the descriptor on import.
        unsafe { import(memory, size, GL_HANDLE_TYPE_OPAQUE_FD_EXT, fd.into_raw_fd()) };
    }

    fn tex_storage_mem_2d(&self, width: u32, height: u32, memory: u32, offset: u64) {
        let storage = self.memory_fns().tex_storage_mem_2d;
        // SAFETY: a texture is bound to GL_TEXTURE_2D; `memory` was imported.
        unsafe {
            storage(
                GL_TEXTURE_2D,
                1,
                GL_RGBA8,
                size(width),
                size(height),
                memory,
                offset,
            );
        }
    }

    fn delete_memory_object(&self, memory: u32) {
        self.delete_one(self.memory_fns().delete_memory_objects, memory);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_libraries_report_every_name_tried() {
        let config = SurfaceConfig {
            egl_libraries: vec!["libinlay-no-such-egl.so".into(), "also-missing.so".into()],
            ..SurfaceConfig::gles2()
        };
        match GlLibrary::load(&config) {
            Err(SurfaceError::LibraryNotFound { kind, tried }) => {
                assert_eq!(kind, "EGL");
                assert_eq!(tried, config.egl_libraries);
            }
            other => panic!("expected LibraryNotFound, got {other:?}"),
        }
    }

    #[test]
    fn sizes_saturate_instead_of_wrapping() {
        assert_eq!(size(640), 640);
        assert_eq!(size(u32::MAX), i32::MAX);
    }
}
