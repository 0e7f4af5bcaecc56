// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Test doubles for the host and the engine.

use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration as StdDuration;

use inlay_core::metrics::ViewportMetrics;
use inlay_core::pointer::PointerEvent;
use inlay_core::trace::{
    LifecycleEvent, LifecycleStage, PointerTraceEvent, SurfaceRecreatedEvent, TaskDrainEvent,
    TraceSink, VsyncDeliveredEvent,
};
use inlay_core::vsync::{FrameInterval, VsyncBaton};
use inlay_gl::testing::FakeGl;
use inlay_gl::{GraphicsCapabilities, GraphicsSubsystem, RendererDelegate};
use inlay_runner::{TaskRunnerHandle, ThreadPoster};
use parking_lot::{Condvar, Mutex};

use crate::config::PanelConfig;
use crate::engine::{
    Engine, EngineConfig, EngineError, EngineLauncher, EngineTask, ExternalTexture, TextureId,
    VsyncWaiter,
};
use crate::host::HostEnvironment;
use crate::panel::Panel;

type Job = Box<dyn FnOnce() + Send>;

/// A dedicated thread standing in for the host's graphics worker.
pub(crate) struct FakeWorker {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    id: ThreadId,
}

impl FakeWorker {
    pub(crate) fn spawn() -> Self {
        let (sender, receiver) = mpsc::channel::<Job>();
        let thread = thread::spawn(move || {
            while let Ok(job) = receiver.recv() {
                job();
            }
        });
        Self {
            id: thread.thread().id(),
            sender: Mutex::new(Some(sender)),
            thread: Mutex::new(Some(thread)),
        }
    }

    pub(crate) fn thread_id(&self) -> ThreadId {
        self.id
    }
}

impl ThreadPoster for FakeWorker {
    fn post(&self, job: Job) {
        if let Some(sender) = &*self.sender.lock() {
            _ = sender.send(job);
        }
    }
}

impl Drop for FakeWorker {
    fn drop(&mut self) {
        self.sender.lock().take();
        if let Some(thread) = self.thread.lock().take() {
            _ = thread.join();
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum EngineCall {
    Task(EngineTask, ThreadId),
    Vsync(VsyncBaton, FrameInterval),
    Pointer(Vec<PointerEvent>),
    Metrics(ViewportMetrics),
    RegisterTexture(ExternalTexture),
    UnregisterTexture(TextureId),
    Shutdown,
}

/// Records every call it receives.
#[derive(Default)]
pub(crate) struct FakeEngine {
    calls: Mutex<Vec<EngineCall>>,
    changed: Condvar,
}

impl FakeEngine {
    fn record(&self, call: EngineCall) -> Result<(), EngineError> {
        self.calls.lock().push(call);
        self.changed.notify_all();
        Ok(())
    }

    pub(crate) fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub(crate) fn tasks(&self) -> Vec<EngineTask> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                EngineCall::Task(task, _) => Some(*task),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn vsyncs(&self) -> Vec<(VsyncBaton, FrameInterval)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                EngineCall::Vsync(baton, frame) => Some((*baton, *frame)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn pointer_batches(&self) -> Vec<Vec<PointerEvent>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                EngineCall::Pointer(events) => Some(events.clone()),
                _ => None,
            })
            .collect()
    }

    /// Waits up to five seconds for `task` to run and returns its thread.
    pub(crate) fn wait_for_task(&self, task: EngineTask) -> Option<ThreadId> {
        let find = |calls: &[EngineCall]| {
            calls.iter().find_map(|c| match c {
                EngineCall::Task(t, thread) if *t == task => Some(*thread),
                _ => None,
            })
        };
        let mut calls = self.calls.lock();
        loop {
            if let Some(thread) = find(&calls) {
                return Some(thread);
            }
            if self
                .changed
                .wait_for(&mut calls, StdDuration::from_secs(5))
                .timed_out()
            {
                return find(&calls);
            }
        }
    }
}

impl Engine for FakeEngine {
    fn run_task(&self, task: EngineTask) -> Result<(), EngineError> {
        self.record(EngineCall::Task(task, thread::current().id()))
    }

    fn on_vsync(&self, baton: VsyncBaton, interval: FrameInterval) -> Result<(), EngineError> {
        self.record(EngineCall::Vsync(baton, interval))
    }

    fn send_pointer_events(&self, events: &[PointerEvent]) -> Result<(), EngineError> {
        self.record(EngineCall::Pointer(events.to_vec()))
    }

    fn set_viewport_metrics(&self, metrics: &ViewportMetrics) -> Result<(), EngineError> {
        self.record(EngineCall::Metrics(*metrics))
    }

    /// Runs `task` on a fresh thread and waits for it.
    fn post_render_task(&self, task: Job) -> Result<(), EngineError> {
        thread::spawn(task)
            .join()
            .map_err(|_| EngineError::Rejected {
                call: "post_render_task",
                reason: "render task panicked".into(),
            })
    }

    fn register_external_texture(&self, texture: ExternalTexture) -> Result<(), EngineError> {
        self.record(EngineCall::RegisterTexture(texture))
    }

    fn unregister_external_texture(&self, id: TextureId) -> Result<(), EngineError> {
        self.record(EngineCall::UnregisterTexture(id))
    }

    fn shutdown(&self) -> Result<(), EngineError> {
        self.record(EngineCall::Shutdown)
    }
}

/// What the last launch was given. Holds the renderer weakly so tests can
/// observe its release.
#[derive(Clone)]
pub(crate) struct Launched {
    pub(crate) renderer: Weak<dyn RendererDelegate>,
    pub(crate) platform: TaskRunnerHandle<EngineTask>,
    pub(crate) render: TaskRunnerHandle<EngineTask>,
    pub(crate) vsync: VsyncWaiter,
    pub(crate) assets_path: PathBuf,
    pub(crate) metrics: ViewportMetrics,
}

pub(crate) struct FakeLauncher {
    engine: Arc<FakeEngine>,
    fail_next: Mutex<bool>,
    launches: Mutex<Vec<Launched>>,
}

impl FakeLauncher {
    pub(crate) fn fail_next(&self) {
        *self.fail_next.lock() = true;
    }

    pub(crate) fn launch_count(&self) -> usize {
        self.launches.lock().len()
    }

    pub(crate) fn launched(&self) -> Launched {
        self.launches
            .lock()
            .last()
            .cloned()
            .expect("engine was never launched")
    }
}

impl EngineLauncher for FakeLauncher {
    fn launch(&self, config: EngineConfig) -> Result<Arc<dyn Engine>, EngineError> {
        if core::mem::take(&mut *self.fail_next.lock()) {
            return Err(EngineError::Launch("refused by test".into()));
        }
        self.launches.lock().push(Launched {
            renderer: Arc::downgrade(&config.renderer),
            platform: config.platform_runner,
            render: config.render_runner,
            vsync: config.vsync,
            assets_path: config.assets_path,
            metrics: config.metrics,
        });
        Ok(self.engine.clone())
    }
}

/// Labels every event it sees.
struct LabelSink(Arc<Mutex<Vec<&'static str>>>);

impl TraceSink for LabelSink {
    fn on_task_drain(&mut self, _: &TaskDrainEvent) {
        self.0.lock().push("task-drain");
    }

    fn on_vsync_delivered(&mut self, _: &VsyncDeliveredEvent) {
        self.0.lock().push("vsync");
    }

    fn on_pointer_event(&mut self, _: &PointerTraceEvent) {
        self.0.lock().push("pointer");
    }

    fn on_surface_recreated(&mut self, _: &SurfaceRecreatedEvent) {
        self.0.lock().push("surface-recreated");
    }

    fn on_lifecycle(&mut self, e: &LifecycleEvent) {
        self.0.lock().push(match e.stage {
            LifecycleStage::Enabled => "enabled",
            LifecycleStage::EnableFailed => "enable-failed",
            LifecycleStage::Disabled => "disabled",
        });
    }
}

/// A panel wired to fakes. The panel is declared first so it is torn down
/// while the worker still runs.
pub(crate) struct Harness {
    pub(crate) panel: Panel,
    pub(crate) gl: Arc<FakeGl>,
    pub(crate) engine: Arc<FakeEngine>,
    pub(crate) launcher: Arc<FakeLauncher>,
    pub(crate) host: Arc<HostEnvironment>,
    pub(crate) worker: Arc<FakeWorker>,
    pub(crate) trace: Arc<Mutex<Vec<&'static str>>>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let gl = Arc::new(FakeGl::new());
        let engine = Arc::new(FakeEngine::default());
        let launcher = Arc::new(FakeLauncher {
            engine: engine.clone(),
            fail_next: Mutex::new(false),
            launches: Mutex::new(Vec::new()),
        });
        let worker = Arc::new(FakeWorker::spawn());
        let host = Arc::new(HostEnvironment {
            capabilities: GraphicsCapabilities::Gles {
                share_context: gl.host_context(),
            },
            graphics: GraphicsSubsystem::new(gl.clone(), gl.clone()),
            worker: worker.clone(),
            launcher: launcher.clone(),
        });
        let trace = Arc::new(Mutex::new(Vec::new()));
        let mut panel = Panel::new(host.clone(), PanelConfig::default(), None);
        panel.set_trace_sink(Some(Box::new(LabelSink(trace.clone()))));
        Self {
            panel,
            gl,
            engine,
            launcher,
            host,
            worker,
            trace,
        }
    }
}
