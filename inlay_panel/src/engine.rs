// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The embedded-engine seam.
//!
//! The engine itself (rendering pipeline, widgets, layout) lives outside
//! inlay. The panel talks to it only through [`Engine`], and hands it the
//! capabilities it needs at launch in an [`EngineConfig`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use inlay_core::metrics::ViewportMetrics;
use inlay_core::pointer::PointerEvent;
use inlay_core::vsync::{FrameInterval, VsyncBaton, VsyncBatonQueue};
use inlay_gl::RendererDelegate;
use inlay_runner::TaskRunnerHandle;
use parking_lot::{Mutex, RwLock};

/// An engine-owned task, as handed to a task runner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EngineTask {
    /// Identifier of the runner the engine posted it to.
    pub runner: u64,
    /// Opaque engine task token.
    pub task: u64,
}

/// An external texture identifier. Valid identifiers start at 1.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub i64);

/// A host texture made available to the engine.
///
/// The engine samples `handle` with the resource context bound through the
/// [`RendererDelegate`] it received at launch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExternalTexture {
    /// Identifier the engine refers to the texture by.
    pub id: TextureId,
    /// Host-native texture handle.
    pub handle: usize,
}

/// The engine rejected a call.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine could not be started.
    #[error("engine launch failed: {0}")]
    Launch(String),
    /// The engine refused a dispatched call.
    #[error("engine rejected {call}: {reason}")]
    Rejected {
        /// The refused call.
        call: &'static str,
        /// Engine-provided reason.
        reason: String,
    },
    /// The engine has shut down.
    #[error("engine is not running")]
    NotRunning,
}

/// A running embedded engine.
///
/// Calls arrive from the host's main thread unless noted otherwise.
pub trait Engine: Send + Sync {
    /// Runs a task the engine posted to one of the panel's runners, on that
    /// runner's thread.
    fn run_task(&self, task: EngineTask) -> Result<(), EngineError>;

    /// Acknowledges a vsync request.
    fn on_vsync(&self, baton: VsyncBaton, interval: FrameInterval) -> Result<(), EngineError>;

    /// Delivers pointer events in order.
    fn send_pointer_events(&self, events: &[PointerEvent]) -> Result<(), EngineError>;

    /// Updates the viewport.
    fn set_viewport_metrics(&self, metrics: &ViewportMetrics) -> Result<(), EngineError>;

    /// Runs `task` on the engine's render thread.
    fn post_render_task(&self, task: Box<dyn FnOnce() + Send>) -> Result<(), EngineError>;

    /// Makes an external texture available to the engine.
    fn register_external_texture(&self, texture: ExternalTexture) -> Result<(), EngineError>;

    /// Withdraws an external texture.
    fn unregister_external_texture(&self, id: TextureId) -> Result<(), EngineError>;

    /// Stops the engine. No further calls are made afterwards.
    fn shutdown(&self) -> Result<(), EngineError>;
}

/// Starts engines.
pub trait EngineLauncher: Send + Sync {
    /// Starts an engine with `config`.
    fn launch(&self, config: EngineConfig) -> Result<Arc<dyn Engine>, EngineError>;
}

/// Host callback the engine invokes once its entry point is ready, with the
/// host's panel handle.
pub type EntrypointFn = extern "C" fn(handle: usize);

/// The managed entry point and the handle it expects.
#[derive(Clone, Copy, Debug)]
pub struct Entrypoint {
    /// The callback.
    pub callback: EntrypointFn,
    /// The host's handle for the panel.
    pub handle: usize,
}

impl Entrypoint {
    /// Invokes the callback.
    pub fn invoke(&self) {
        (self.callback)(self.handle);
    }
}

/// The engine's way of asking for a vsync.
///
/// Batons wait in the panel's queue until the next frame pump.
#[derive(Clone)]
pub struct VsyncWaiter {
    queue: Arc<Mutex<VsyncBatonQueue>>,
}

impl fmt::Debug for VsyncWaiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VsyncWaiter")
            .field("pending", &self.queue.lock().len())
            .finish()
    }
}

impl VsyncWaiter {
    pub(crate) fn new(queue: Arc<Mutex<VsyncBatonQueue>>) -> Self {
        Self { queue }
    }

    /// Parks `baton` until the next frame pump. Callable from any thread.
    pub fn request(&self, baton: VsyncBaton) {
        self.queue.lock().push(baton);
    }
}

/// Everything an engine gets at launch.
pub struct EngineConfig {
    /// GL context and surface access.
    pub renderer: Arc<dyn RendererDelegate>,
    /// Runner on the host's main thread. Its task-observer hooks are the
    /// engine's observer hooks.
    pub platform_runner: TaskRunnerHandle<EngineTask>,
    /// Runner on the host's graphics worker thread.
    pub render_runner: TaskRunnerHandle<EngineTask>,
    /// Vsync requests.
    pub vsync: VsyncWaiter,
    /// Location of the engine's assets.
    pub assets_path: PathBuf,
    /// Initial viewport.
    pub metrics: ViewportMetrics,
    /// The managed entry point, if the host registered one.
    pub entrypoint: Option<Entrypoint>,
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("platform_runner", &self.platform_runner)
            .field("render_runner", &self.render_runner)
            .field("assets_path", &self.assets_path)
            .field("metrics", &self.metrics)
            .field("entrypoint", &self.entrypoint)
            .finish_non_exhaustive()
    }
}

/// The running engine, shared with the runners' executors.
///
/// Runners exist before the engine does, so executors look it up here.
#[derive(Clone, Default)]
pub(crate) struct EngineSlot {
    engine: Arc<RwLock<Option<Arc<dyn Engine>>>>,
}

impl EngineSlot {
    pub(crate) fn set(&self, engine: Arc<dyn Engine>) {
        *self.engine.write() = Some(engine);
    }

    pub(crate) fn take(&self) -> Option<Arc<dyn Engine>> {
        self.engine.write().take()
    }

    pub(crate) fn get(&self) -> Option<Arc<dyn Engine>> {
        self.engine.read().clone()
    }

    /// Runs `task` against the engine, logging rejections.
    pub(crate) fn run(&self, task: EngineTask) {
        let Some(engine) = self.get() else {
            log::warn!("dropping task {task:?}: engine not running");
            return;
        };
        if let Err(err) = engine.run_task(task) {
            log::error!("engine task {task:?} failed: {err}");
        }
    }
}
