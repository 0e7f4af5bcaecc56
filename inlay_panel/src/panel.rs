// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The panel: one embedded engine drawing into one host target.

use core::fmt;
use std::path::Path;
use std::sync::Arc;

use inlay_core::metrics::ViewportMetrics;
use inlay_core::pointer::{MouseState, PointerBatch, PointerNormalizer};
use inlay_core::task::QueueKind;
use inlay_core::time::{Duration, HostTime};
use inlay_core::trace::{
    LifecycleEvent, LifecycleStage, PointerTraceEvent, SurfaceRecreatedEvent, TaskDrainEvent,
    TraceSink, Tracer, VsyncDeliveredEvent,
};
use inlay_core::vsync::{FrameInterval, VsyncBatonQueue};
use inlay_gl::SurfaceManager;
use inlay_runner::{TaskExecutor, TaskRunner, discover_worker_thread, time};
use kurbo::Point;
use parking_lot::Mutex;

use crate::config::PanelConfig;
use crate::engine::{
    Engine, EngineConfig, EngineSlot, EngineTask, Entrypoint, ExternalTexture, TextureId,
    VsyncWaiter,
};
use crate::error::PanelError;
use crate::host::HostEnvironment;
use crate::textures::TextureRegistry;

fn tracer(sink: &mut Option<Box<dyn TraceSink + Send>>) -> Tracer<'_> {
    Tracer::from_option(sink.as_deref_mut().map(|s| s as &mut dyn TraceSink))
}

/// Everything that exists only while the panel is enabled.
struct Running {
    engine: Arc<dyn Engine>,
    platform: TaskRunner<EngineTask>,
    render: TaskRunner<EngineTask>,
    surfaces: Arc<SurfaceManager>,
}

/// One embedded engine drawing into one host target.
///
/// All methods are called from the host's main thread; the host serializes
/// them. The engine may request vsyncs from any thread.
///
/// ```text
///   enable:  surfaces ─► surface ─► worker handshake ─► runners ─► engine
///   disable: drain ─► engine shutdown ─► runners ─► surface ─► contexts
/// ```
pub struct Panel {
    host: Arc<HostEnvironment>,
    config: PanelConfig,
    entrypoint: Option<Entrypoint>,
    running: Option<Running>,
    process_events: bool,
    pointer: PointerNormalizer,
    textures: TextureRegistry,
    vsync: Arc<Mutex<VsyncBatonQueue>>,
    engine: EngineSlot,
    recreated: Arc<Mutex<Option<SurfaceRecreatedEvent>>>,
    sink: Option<Box<dyn TraceSink + Send>>,
}

impl fmt::Debug for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Panel")
            .field("enabled", &self.is_enabled())
            .field("process_events", &self.process_events)
            .field("pointer", &self.pointer)
            .field("textures", &self.textures.len())
            .finish_non_exhaustive()
    }
}

impl Panel {
    /// Creates a disabled panel.
    pub fn new(
        host: Arc<HostEnvironment>,
        config: PanelConfig,
        entrypoint: Option<Entrypoint>,
    ) -> Self {
        Self {
            host,
            config,
            entrypoint,
            running: None,
            process_events: false,
            pointer: PointerNormalizer::new(),
            textures: TextureRegistry::new(),
            vsync: Arc::new(Mutex::new(VsyncBatonQueue::new())),
            engine: EngineSlot::default(),
            recreated: Arc::new(Mutex::new(None)),
            sink: None,
        }
    }

    /// Installs (or removes) the trace sink.
    pub fn set_trace_sink(&mut self, sink: Option<Box<dyn TraceSink + Send>>) {
        self.sink = sink;
    }

    /// Returns `true` between a successful `enable` and `disable`.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.running.is_some()
    }

    /// Returns the pointer state.
    #[must_use]
    pub fn mouse_state(&self) -> MouseState {
        self.pointer.state()
    }

    /// Returns the native handle registered under `id`.
    #[must_use]
    pub fn texture_handle(&self, id: TextureId) -> Option<usize> {
        self.textures.handle(id)
    }

    /// Returns the earliest deadline queued on either runner.
    #[must_use]
    pub fn next_task_deadline(&self) -> Option<HostTime> {
        let running = self.running.as_ref()?;
        match (running.platform.next_deadline(), running.render.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Brings up surfaces, runners and the engine, drawing into `target`.
    ///
    /// On failure everything created so far is torn down again.
    pub fn enable(
        &mut self,
        target: usize,
        width: u32,
        height: u32,
        pixel_ratio: f32,
        assets_path: &Path,
    ) -> Result<(), PanelError> {
        if self.running.is_some() {
            return Err(PanelError::AlreadyEnabled);
        }
        let metrics = ViewportMetrics::new(width, height, pixel_ratio);
        let started = self.start(target, width, height, metrics, assets_path);
        let timestamp = time::now();
        match started {
            Ok(running) => {
                self.running = Some(running);
                self.process_events = true;
                log::debug!("panel enabled on target {target:#x} at {width}x{height}");
                tracer(&mut self.sink).lifecycle(&LifecycleEvent {
                    stage: LifecycleStage::Enabled,
                    timestamp,
                });
                Ok(())
            }
            Err(err) => {
                log::error!("panel enable failed: {err}");
                tracer(&mut self.sink).lifecycle(&LifecycleEvent {
                    stage: LifecycleStage::EnableFailed,
                    timestamp,
                });
                Err(err)
            }
        }
    }

    fn start(
        &self,
        target: usize,
        width: u32,
        height: u32,
        metrics: ViewportMetrics,
        assets_path: &Path,
    ) -> Result<Running, PanelError> {
        let host = &self.host;
        let surfaces = Arc::new(SurfaceManager::initialize(
            &host.graphics,
            &host.capabilities,
            &self.config.surface,
        )?);

        if !surfaces.make_current() {
            return Err(PanelError::ContextUnavailable);
        }
        let created = surfaces.create_render_surface(surfaces.target_from_native(
            target, width, height,
        ));
        surfaces.clear_current();
        created?;

        let worker = match discover_worker_thread(&*host.worker) {
            Ok(worker) => worker,
            Err(err) => {
                release_surface(&surfaces);
                return Err(err.into());
            }
        };

        let executor = self.executor();
        let render = TaskRunner::with_waker(
            QueueKind::Render,
            worker,
            Arc::clone(&executor),
            Arc::clone(&host.worker),
        );
        let platform = TaskRunner::for_current_thread(QueueKind::Platform, executor);

        let config = EngineConfig {
            renderer: surfaces.clone(),
            platform_runner: platform.handle(),
            render_runner: render.handle(),
            vsync: VsyncWaiter::new(Arc::clone(&self.vsync)),
            assets_path: assets_path.to_path_buf(),
            metrics,
            entrypoint: self.entrypoint,
        };
        let engine = match host.launcher.launch(config) {
            Ok(engine) => engine,
            Err(err) => {
                drop(render);
                drop(platform);
                release_surface(&surfaces);
                return Err(err.into());
            }
        };
        self.engine.set(Arc::clone(&engine));

        Ok(Running {
            engine,
            platform,
            render,
            surfaces,
        })
    }

    fn executor(&self) -> Arc<dyn TaskExecutor<EngineTask>> {
        let slot = self.engine.clone();
        Arc::new(move |task: EngineTask| slot.run(task))
    }

    /// Tears the panel down in reverse order of `enable`.
    ///
    /// Eligible platform and render tasks and pending vsync batons are
    /// delivered first; the render drain blocks until the graphics worker
    /// ran it. Tasks whose deadline has not come are dropped with a warning.
    /// A disabled panel ignores the call.
    pub fn disable(&mut self) {
        let Some(running) = &self.running else {
            log::debug!("disable on a panel that is not enabled");
            return;
        };
        match running.render.drain_and_wait() {
            Ok(0) => {}
            Ok(executed) => log::debug!("ran {executed} render task(s) before shutdown"),
            Err(err) => log::warn!("final render drain failed: {err}"),
        }
        self.process_messages();
        self.process_vsync();
        self.process_events = false;

        let Some(Running {
            engine,
            platform,
            render,
            surfaces,
        }) = self.running.take()
        else {
            return;
        };

        self.engine.take();
        if let Err(err) = engine.shutdown() {
            log::error!("engine shutdown failed: {err}");
        }
        drop(engine);
        drop(render);
        drop(platform);

        release_surface(&surfaces);
        match Arc::try_unwrap(surfaces) {
            Ok(surfaces) => surfaces.cleanup(),
            Err(_) => log::warn!("surface manager still referenced after engine shutdown"),
        }

        let forgotten = self.textures.clear();
        if forgotten > 0 {
            log::debug!("forgot {forgotten} external texture(s)");
        }
        let stale = self.vsync.lock().take();
        if !stale.is_empty() {
            log::debug!("discarding {} vsync baton(s) requested during shutdown", stale.len());
        }
        drop(stale);
        *self.recreated.lock() = None;

        tracer(&mut self.sink).lifecycle(&LifecycleEvent {
            stage: LifecycleStage::Disabled,
            timestamp: time::now(),
        });
        log::debug!("panel disabled");
    }

    /// Points the panel at a new host target.
    ///
    /// The render surface is rebuilt on the engine's render thread, where the
    /// render context lives; the viewport is updated right away.
    pub fn render_texture(&mut self, target: usize, width: u32, height: u32, pixel_ratio: f32) {
        let Some(running) = &self.running else {
            log::warn!("render_texture on a panel that is not enabled");
            return;
        };

        let surfaces = Arc::clone(&running.surfaces);
        let native = surfaces.target_from_native(target, width, height);
        let recreated = Arc::clone(&self.recreated);
        let recreate = move || {
            if !surfaces.make_current() {
                log::error!("render surface recreation skipped: context unavailable");
                return;
            }
            if surfaces.has_surface() {
                surfaces.destroy_render_surface();
            }
            match surfaces.create_render_surface(native) {
                Ok(fbo) => {
                    *recreated.lock() = Some(SurfaceRecreatedEvent {
                        width,
                        height,
                        fbo,
                        timestamp: time::now(),
                    });
                }
                Err(err) => log::error!("render surface recreation failed: {err}"),
            }
            surfaces.clear_current();
        };
        if let Err(err) = running.engine.post_render_task(Box::new(recreate)) {
            log::error!("could not post surface recreation: {err}");
        }

        let metrics = ViewportMetrics::new(width, height, pixel_ratio);
        if let Err(err) = running.engine.set_viewport_metrics(&metrics) {
            log::error!("viewport update failed: {err}");
        }
    }

    /// One host frame: drains platform tasks and vsync batons, and nudges
    /// the graphics worker if render tasks are waiting.
    ///
    /// Returns the time spent draining platform tasks.
    pub fn pump(&mut self) -> Duration {
        let elapsed = self.process_messages();
        self.process_vsync();
        if let Some(running) = &self.running
            && self.config.wake_worker
            && running.render.has_pending()
        {
            running.render.wake();
        }
        let recreated = self.recreated.lock().take();
        if let Some(event) = recreated {
            tracer(&mut self.sink).surface_recreated(&event);
        }
        elapsed
    }

    /// Drains the platform runner on the calling (main) thread.
    pub fn process_messages(&mut self) -> Duration {
        let Some(running) = &self.running else {
            return Duration::ZERO;
        };
        let outcome = running.platform.process_tasks_at(time::now());
        tracer(&mut self.sink).task_drain(&TaskDrainEvent {
            queue: QueueKind::Platform,
            executed: outcome.executed,
            started: outcome.started,
            elapsed: outcome.elapsed,
        });
        outcome.elapsed
    }

    /// Acknowledges every parked vsync baton with the current frame pair.
    ///
    /// Returns the number of batons delivered.
    pub fn process_vsync(&mut self) -> usize {
        let batch = self.vsync.lock().take();
        if batch.is_empty() {
            return 0;
        }
        let Some(running) = &self.running else {
            log::debug!("discarding {} vsync baton(s): engine not running", batch.len());
            drop(batch);
            return 0;
        };

        let now = time::now();
        let interval = self.config.frame_interval;
        let engine = &running.engine;
        let count = batch.deliver_all(now, interval, |baton, frame| {
            if let Err(err) = engine.on_vsync(baton, frame) {
                log::error!("vsync acknowledgement for {baton:?} failed: {err}");
            }
        });
        let frame = FrameInterval::starting_at(now, interval);
        tracer(&mut self.sink).vsync_delivered(&VsyncDeliveredEvent {
            count,
            frame_start: frame.frame_start,
            frame_target: frame.frame_target,
        });
        count
    }

    /// Registers an external texture with the engine.
    ///
    /// Returns `None` if the panel is not enabled or the engine refuses.
    pub fn register_texture(&mut self, handle: usize) -> Option<TextureId> {
        let Some(running) = &self.running else {
            log::warn!("register_texture on a panel that is not enabled");
            return None;
        };
        let id = self.textures.register(handle);
        match running
            .engine
            .register_external_texture(ExternalTexture { id, handle })
        {
            Ok(()) => Some(id),
            Err(err) => {
                log::error!("engine refused texture {handle:#x}: {err}");
                self.textures.unregister(id);
                None
            }
        }
    }

    /// Withdraws an external texture. Unknown identifiers are ignored.
    pub fn unregister_texture(&mut self, id: TextureId) {
        if self.textures.unregister(id).is_none() {
            log::warn!("unregister of unknown texture {id:?}");
            return;
        }
        if let Some(running) = &self.running
            && let Err(err) = running.engine.unregister_external_texture(id)
        {
            log::error!("engine failed to unregister texture {id:?}: {err}");
        }
    }

    /// Host mouse button press.
    pub fn on_mouse_down(&mut self, x: f64, y: f64, button: i32) {
        if !self.process_events {
            return;
        }
        if let Ok(batch) = self
            .pointer
            .on_mouse_down(Point::new(x, y), button, time::now())
        {
            self.dispatch(&batch);
        }
    }

    /// Host mouse button release.
    pub fn on_mouse_up(&mut self, x: f64, y: f64, button: i32) {
        if !self.process_events {
            return;
        }
        if let Ok(batch) = self
            .pointer
            .on_mouse_up(Point::new(x, y), button, time::now())
        {
            self.dispatch(&batch);
        }
    }

    /// Host mouse motion.
    pub fn on_mouse_move(&mut self, x: f64, y: f64) {
        if !self.process_events {
            return;
        }
        let batch = self.pointer.on_mouse_move(Point::new(x, y), time::now());
        self.dispatch(&batch);
    }

    /// The pointer entered the panel.
    pub fn on_mouse_enter(&mut self, x: f64, y: f64) {
        if !self.process_events {
            return;
        }
        let batch = self.pointer.on_mouse_enter(Point::new(x, y), time::now());
        self.dispatch(&batch);
    }

    /// The pointer left the panel.
    pub fn on_mouse_leave(&mut self, x: f64, y: f64) {
        if !self.process_events {
            return;
        }
        let batch = self.pointer.on_mouse_leave(Point::new(x, y), time::now());
        self.dispatch(&batch);
    }

    fn dispatch(&mut self, batch: &PointerBatch) {
        if batch.is_empty() {
            return;
        }
        let mut tracer = tracer(&mut self.sink);
        for event in batch.as_slice() {
            tracer.pointer_event(&PointerTraceEvent {
                phase: event.phase,
                synthesized: event.synthesized,
                timestamp_micros: event.timestamp_micros,
            });
        }
        if let Some(running) = &self.running
            && let Err(err) = running.engine.send_pointer_events(batch.as_slice())
        {
            log::error!("engine rejected pointer events: {err}");
        }
    }
}

impl Drop for Panel {
    fn drop(&mut self) {
        if self.running.is_some() {
            self.disable();
        }
    }
}

/// Destroys the live render surface with the render context bound.
fn release_surface(surfaces: &SurfaceManager) {
    if !surfaces.make_current() {
        log::error!("render context unavailable; render surface leaked");
        return;
    }
    if surfaces.has_surface() {
        surfaces.destroy_render_surface();
    }
    surfaces.clear_current();
}
