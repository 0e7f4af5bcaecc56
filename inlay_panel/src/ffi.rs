// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! C ABI entry points.
//!
//! The host loads the plugin once with [`inlay_plugin_load`], then creates
//! one [`Panel`] per embedded view and drives it from its main thread.
//! Every entry point tolerates a null panel (logged, no effect) and catches
//! panics before they reach the host.
//!
//! The engine launcher is not part of the C interface: the engine binding
//! linked into the same library registers it with
//! [`install_engine_launcher`] before the host calls [`inlay_plugin_load`].

#![expect(
    unsafe_code,
    reason = "C entry points dereference host pointers and call host callbacks"
)]

use core::ffi::{CStr, c_char, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use inlay_gl::{
    EglContext, GlLibrary, GraphicsCapabilities, GraphicsSubsystem, QueueAccessFn, SurfaceConfig,
    VulkanHostHandles,
};
use inlay_runner::ThreadPoster;
use parking_lot::Mutex;

use crate::config::PanelConfig;
use crate::engine::{EngineLauncher, Entrypoint, EntrypointFn, TextureId};
use crate::error::PanelError;
use crate::host::HostEnvironment;
use crate::panel::Panel;

/// Status codes returned across the C boundary.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InlayResult {
    /// Success.
    Ok = 0,
    /// A required pointer was null or a string was not UTF-8.
    InvalidArgument = 1,
    /// The panel is already enabled.
    AlreadyEnabled = 2,
    /// Library, display, context or surface setup failed.
    SurfaceFailed = 3,
    /// The graphics worker did not respond.
    WorkerFailed = 4,
    /// The engine failed to start.
    EngineFailed = 5,
    /// A panic was caught at the boundary.
    Panicked = 6,
    /// No engine launcher is registered.
    NoEngine = 7,
}

impl From<&PanelError> for InlayResult {
    fn from(err: &PanelError) -> Self {
        match err {
            PanelError::AlreadyEnabled => Self::AlreadyEnabled,
            PanelError::ContextUnavailable | PanelError::Surface(_) => Self::SurfaceFailed,
            PanelError::Worker(_) => Self::WorkerFailed,
            PanelError::Engine(_) => Self::EngineFailed,
        }
    }
}

/// The host's renderer.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InlayBackend {
    /// OpenGL ES through EGL.
    Gles = 0,
    /// Vulkan.
    Vulkan = 1,
}

/// A job the host runs on its graphics worker thread.
pub type WorkerJob = unsafe extern "C" fn(data: *mut c_void);

/// Host callback that schedules `job(data)` on the graphics worker thread.
pub type PostToWorkerFn =
    unsafe extern "C" fn(context: *mut c_void, job: WorkerJob, data: *mut c_void);

/// What the host hands over at load time.
#[repr(C)]
#[derive(Debug)]
pub struct InlayHostInterface {
    /// The host's renderer.
    pub backend: InlayBackend,
    /// The host's `EGLContext` to share with (GLES hosts), or null.
    pub share_context: *mut c_void,
    /// `vkGetInstanceProcAddr` (Vulkan hosts).
    pub vk_get_instance_proc_addr: *const c_void,
    /// `VkInstance`.
    pub vk_instance: *mut c_void,
    /// `VkPhysicalDevice`.
    pub vk_physical_device: *mut c_void,
    /// `VkDevice`.
    pub vk_device: *mut c_void,
    /// The host's graphics `VkQueue`.
    pub vk_queue: *mut c_void,
    /// Family index of `vk_queue`.
    pub vk_queue_family_index: u32,
    /// Runs a callback while the host holds off its own use of `vk_queue`.
    pub vk_access_queue: Option<QueueAccessFn>,
    /// Passed back to `vk_access_queue`.
    pub vk_queue_context: *mut c_void,
    /// Passed back to `post_to_worker`.
    pub worker_context: *mut c_void,
    /// Schedules work on the host's graphics worker thread.
    pub post_to_worker: Option<PostToWorkerFn>,
}

impl InlayHostInterface {
    fn capabilities(&self) -> GraphicsCapabilities {
        match self.backend {
            InlayBackend::Gles => GraphicsCapabilities::Gles {
                share_context: EglContext(self.share_context),
            },
            InlayBackend::Vulkan => GraphicsCapabilities::Vulkan(VulkanHostHandles {
                get_instance_proc_addr: self.vk_get_instance_proc_addr,
                instance: self.vk_instance,
                physical_device: self.vk_physical_device,
                device: self.vk_device,
                queue: self.vk_queue,
                queue_family_index: self.vk_queue_family_index,
                access_queue: self.vk_access_queue,
                queue_context: self.vk_queue_context,
            }),
        }
    }
}

type Job = Box<dyn FnOnce() + Send>;

/// The host's graphics worker, reached through its C callback.
struct CWorker {
    context: *mut c_void,
    post: PostToWorkerFn,
}

// SAFETY: the host guarantees `post_to_worker` may be called from any
// thread with its context pointer.
unsafe impl Send for CWorker {}
// SAFETY: as above.
unsafe impl Sync for CWorker {}

unsafe extern "C" fn run_job(data: *mut c_void) {
    // SAFETY: `data` came from `Box::into_raw` in `CWorker::post` and the
    // host runs each job exactly once.
    let job = unsafe { Box::from_raw(data.cast::<Job>()) };
    if panic::catch_unwind(AssertUnwindSafe(move || job())).is_err() {
        log::error!("panic in a graphics worker job");
    }
}

impl ThreadPoster for CWorker {
    fn post(&self, job: Job) {
        let data = Box::into_raw(Box::new(job)).cast::<c_void>();
        // SAFETY: `run_job` takes ownership of `data` when the host runs it.
        unsafe { (self.post)(self.context, run_job, data) };
    }
}

static HOST: Mutex<Option<Arc<HostEnvironment>>> = parking_lot::const_mutex(None);
static LAUNCHER: Mutex<Option<Arc<dyn EngineLauncher>>> = parking_lot::const_mutex(None);

/// Registers the engine launcher used by hosts loaded afterwards.
pub fn install_engine_launcher(launcher: Arc<dyn EngineLauncher>) {
    *LAUNCHER.lock() = Some(launcher);
}

/// Installs a host environment directly, replacing any loaded one.
///
/// Rust embedders use this instead of [`inlay_plugin_load`].
pub fn install_host(host: Arc<HostEnvironment>) {
    if let Some(previous) = HOST.lock().replace(host) {
        previous.shutdown();
    }
}

fn loaded_host() -> Option<Arc<HostEnvironment>> {
    HOST.lock().clone()
}

fn guarded<R>(call: &'static str, body: impl FnOnce() -> R) -> Result<R, InlayResult> {
    panic::catch_unwind(AssertUnwindSafe(body)).map_err(|_| {
        log::error!("{call}: panic caught at the C boundary");
        InlayResult::Panicked
    })
}

/// Runs `body` on the panel behind `panel`.
///
/// # Safety
///
/// `panel` is null or was returned by [`inlay_panel_create`] and not yet
/// disposed.
unsafe fn with_panel<R>(
    panel: *mut Panel,
    call: &'static str,
    body: impl FnOnce(&mut Panel) -> R,
) -> Result<R, InlayResult> {
    // SAFETY: forwarded from the caller.
    let Some(panel) = (unsafe { panel.as_mut() }) else {
        log::warn!("{call}: null panel");
        return Err(InlayResult::InvalidArgument);
    };
    guarded(call, || body(panel))
}

fn load(interface: &InlayHostInterface) -> InlayResult {
    if HOST.lock().is_some() {
        log::warn!("inlay_plugin_load: already loaded");
        return InlayResult::Ok;
    }
    let Some(launcher) = LAUNCHER.lock().clone() else {
        log::error!("inlay_plugin_load: no engine launcher registered");
        return InlayResult::NoEngine;
    };
    let Some(post) = interface.post_to_worker else {
        log::error!("inlay_plugin_load: host provided no worker callback");
        return InlayResult::InvalidArgument;
    };
    let library = match GlLibrary::load(&SurfaceConfig::gles2()) {
        Ok(library) => Arc::new(library),
        Err(err) => {
            log::error!("inlay_plugin_load: {err}");
            return InlayResult::SurfaceFailed;
        }
    };
    install_host(Arc::new(HostEnvironment {
        capabilities: interface.capabilities(),
        graphics: GraphicsSubsystem::new(library.clone(), library),
        worker: Arc::new(CWorker {
            context: interface.worker_context,
            post,
        }),
        launcher,
    }));
    log::debug!("plugin loaded for a {:?} host", interface.backend);
    InlayResult::Ok
}

/// Loads the plugin for the host described by `interface`.
///
/// Loading twice is a no-op.
///
/// # Safety
///
/// `interface` is null or points to a valid [`InlayHostInterface`] whose
/// handles outlive the plugin.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn inlay_plugin_load(interface: *const InlayHostInterface) -> InlayResult {
    // SAFETY: forwarded from the caller.
    let Some(interface) = (unsafe { interface.as_ref() }) else {
        log::error!("inlay_plugin_load: null interface");
        return InlayResult::InvalidArgument;
    };
    guarded("inlay_plugin_load", || load(interface)).unwrap_or_else(|code| code)
}

/// Releases the host environment. Panels still enabled keep the display
/// open until they are disabled.
#[unsafe(no_mangle)]
pub extern "C" fn inlay_plugin_unload() {
    _ = guarded("inlay_plugin_unload", || {
        if let Some(host) = HOST.lock().take() {
            host.shutdown();
            log::debug!("plugin unloaded");
        }
    });
}

/// Creates a disabled panel, or returns null if the plugin is not loaded.
///
/// `entrypoint`, if given, is handed to the engine together with `handle`.
#[unsafe(no_mangle)]
pub extern "C" fn inlay_panel_create(
    handle: usize,
    entrypoint: Option<EntrypointFn>,
) -> *mut Panel {
    guarded("inlay_panel_create", || {
        let Some(host) = loaded_host() else {
            log::error!("inlay_panel_create: plugin not loaded");
            return core::ptr::null_mut();
        };
        let entrypoint = entrypoint.map(|callback| Entrypoint { callback, handle });
        Box::into_raw(Box::new(Panel::new(host, PanelConfig::default(), entrypoint)))
    })
    .unwrap_or(core::ptr::null_mut())
}

/// Disables (if needed) and frees a panel.
///
/// # Safety
///
/// `panel` is null or was returned by [`inlay_panel_create`] and not yet
/// disposed. It must not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn inlay_panel_dispose(panel: *mut Panel) {
    if panel.is_null() {
        log::warn!("inlay_panel_dispose: null panel");
        return;
    }
    // SAFETY: `panel` came from `Box::into_raw` in `inlay_panel_create`.
    let panel = unsafe { Box::from_raw(panel) };
    _ = guarded("inlay_panel_dispose", move || drop(panel));
}

/// Enables the panel, drawing into `target`.
///
/// # Safety
///
/// `panel` as for [`inlay_panel_dispose`]; `assets_path` is null or a
/// NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn inlay_panel_on_enable(
    panel: *mut Panel,
    target: usize,
    width: u32,
    height: u32,
    pixel_ratio: f32,
    assets_path: *const c_char,
) -> InlayResult {
    if assets_path.is_null() {
        log::error!("inlay_panel_on_enable: null assets path");
        return InlayResult::InvalidArgument;
    }
    // SAFETY: non-null and NUL-terminated per the contract.
    let Ok(assets) = unsafe { CStr::from_ptr(assets_path) }.to_str() else {
        log::error!("inlay_panel_on_enable: assets path is not UTF-8");
        return InlayResult::InvalidArgument;
    };
    let assets = PathBuf::from(assets);
    // SAFETY: forwarded from the caller.
    let enabled = unsafe {
        with_panel(panel, "inlay_panel_on_enable", |panel| {
            match panel.enable(target, width, height, pixel_ratio, &assets) {
                Ok(()) => InlayResult::Ok,
                Err(err) => InlayResult::from(&err),
            }
        })
    };
    enabled.unwrap_or_else(|code| code)
}

/// Disables the panel.
///
/// # Safety
///
/// As for [`inlay_panel_dispose`], without the ownership transfer.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn inlay_panel_on_disable(panel: *mut Panel) {
    // SAFETY: forwarded from the caller.
    _ = unsafe { with_panel(panel, "inlay_panel_on_disable", Panel::disable) };
}

/// Points the panel at a new host target.
///
/// # Safety
///
/// As for [`inlay_panel_on_disable`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn inlay_panel_on_render_texture(
    panel: *mut Panel,
    target: usize,
    width: u32,
    height: u32,
    pixel_ratio: f32,
) {
    // SAFETY: forwarded from the caller.
    _ = unsafe {
        with_panel(panel, "inlay_panel_on_render_texture", |panel| {
            panel.render_texture(target, width, height, pixel_ratio);
        })
    };
}

/// Runs one frame pump and returns the nanoseconds spent draining tasks.
///
/// # Safety
///
/// As for [`inlay_panel_on_disable`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn inlay_panel_pump(panel: *mut Panel) -> u64 {
    // SAFETY: forwarded from the caller.
    let spent = unsafe { with_panel(panel, "inlay_panel_pump", |panel| panel.pump().nanos()) };
    spent.unwrap_or(0)
}

/// Registers an external texture. Returns its identifier, or 0 on failure.
///
/// # Safety
///
/// As for [`inlay_panel_on_disable`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn inlay_panel_register_texture(panel: *mut Panel, handle: usize) -> i64 {
    // SAFETY: forwarded from the caller.
    let id = unsafe {
        with_panel(panel, "inlay_panel_register_texture", |panel| {
            panel.register_texture(handle).map_or(0, |id| id.0)
        })
    };
    id.unwrap_or(0)
}

/// Withdraws an external texture.
///
/// # Safety
///
/// As for [`inlay_panel_on_disable`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn inlay_panel_unregister_texture(panel: *mut Panel, id: i64) {
    // SAFETY: forwarded from the caller.
    _ = unsafe {
        with_panel(panel, "inlay_panel_unregister_texture", |panel| {
            panel.unregister_texture(TextureId(id));
        })
    };
}

/// Host mouse button press.
///
/// # Safety
///
/// As for [`inlay_panel_on_disable`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn inlay_panel_on_mouse_down(panel: *mut Panel, x: f64, y: f64, button: i32) {
    // SAFETY: forwarded from the caller.
    _ = unsafe {
        with_panel(panel, "inlay_panel_on_mouse_down", |panel| {
            panel.on_mouse_down(x, y, button);
        })
    };
}

/// Host mouse button release.
///
/// # Safety
///
/// As for [`inlay_panel_on_disable`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn inlay_panel_on_mouse_up(panel: *mut Panel, x: f64, y: f64, button: i32) {
    // SAFETY: forwarded from the caller.
    _ = unsafe {
        with_panel(panel, "inlay_panel_on_mouse_up", |panel| {
            panel.on_mouse_up(x, y, button);
        })
    };
}

/// Host mouse motion.
///
/// # Safety
///
/// As for [`inlay_panel_on_disable`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn inlay_panel_on_mouse_move(panel: *mut Panel, x: f64, y: f64) {
    // SAFETY: forwarded from the caller.
    _ = unsafe {
        with_panel(panel, "inlay_panel_on_mouse_move", |panel| {
            panel.on_mouse_move(x, y);
        })
    };
}

/// The pointer entered the panel.
///
/// # Safety
///
/// As for [`inlay_panel_on_disable`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn inlay_panel_on_mouse_enter(panel: *mut Panel, x: f64, y: f64) {
    // SAFETY: forwarded from the caller.
    _ = unsafe {
        with_panel(panel, "inlay_panel_on_mouse_enter", |panel| {
            panel.on_mouse_enter(x, y);
        })
    };
}

/// The pointer left the panel.
///
/// # Safety
///
/// As for [`inlay_panel_on_disable`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn inlay_panel_on_mouse_leave(panel: *mut Panel, x: f64, y: f64) {
    // SAFETY: forwarded from the caller.
    _ = unsafe {
        with_panel(panel, "inlay_panel_on_mouse_leave", |panel| {
            panel.on_mouse_leave(x, y);
        })
    };
}
