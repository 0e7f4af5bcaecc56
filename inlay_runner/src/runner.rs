// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The thread-affined task runner.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use hashbrown::HashMap;
use inlay_core::task::{QueueKind, TaskQueue};
use inlay_core::time::{Duration, HostTime};
use parking_lot::Mutex;

use crate::handshake::{HandshakeError, ThreadPoster};
use crate::time;

/// A hook run once per drain pass.
pub type Observer = Arc<dyn Fn() + Send + Sync>;

/// Runs the tasks a [`TaskRunner`] drains.
pub trait TaskExecutor<T>: Send + Sync {
    /// Executes one task on the runner's bound thread.
    fn execute(&self, task: T);
}

impl<T, F> TaskExecutor<T> for F
where
    F: Fn(T) + Send + Sync,
{
    fn execute(&self, task: T) {
        self(task);
    }
}

const IDLE: u8 = 0;
const DRAINING: u8 = 1;
const DISPOSED: u8 = 2;

/// What one drain pass did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrainOutcome {
    /// Drain time used for eligibility.
    pub started: HostTime,
    /// Number of tasks executed.
    pub executed: usize,
    /// Time spent draining, observers included.
    pub elapsed: Duration,
}

struct Shared<T> {
    kind: QueueKind,
    thread: ThreadId,
    queue: Mutex<TaskQueue<T>>,
    observers: Mutex<HashMap<isize, Observer>>,
    state: AtomicU8,
    wake_scheduled: AtomicBool,
    executor: Arc<dyn TaskExecutor<T>>,
    waker: Option<Arc<dyn ThreadPoster>>,
}

impl<T: Send + 'static> Shared<T> {
    fn drain(&self, now: HostTime) -> DrainOutcome {
        assert!(
            thread::current().id() == self.thread,
            "{:?} runner drained off its bound thread",
            self.kind
        );
        let idle = DrainOutcome {
            started: now,
            executed: 0,
            elapsed: Duration::ZERO,
        };
        match self
            .state
            .compare_exchange(IDLE, DRAINING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {}
            Err(DISPOSED) => return idle,
            Err(_) => {
                log::debug!("{:?} runner: ignoring re-entrant drain", self.kind);
                return idle;
            }
        }

        let _guard = DrainGuard {
            state: &self.state,
            kind: self.kind,
        };
        let clock_start = time::now();

        // Snapshot under the lock; tasks posted while these run wait for the
        // next pass.
        let ready = self.queue.lock().drain_eligible(now);
        let executed = ready.len();
        for task in ready {
            self.executor.execute(task);
        }

        let observers: Vec<Observer> = self.observers.lock().values().cloned().collect();
        for observer in &observers {
            observer();
        }

        DrainOutcome {
            started: now,
            executed,
            elapsed: time::now().saturating_duration_since(clock_start),
        }
    }

    fn schedule_wake(self: &Arc<Self>) {
        let Some(waker) = &self.waker else {
            return;
        };
        if self.wake_scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        let weak: Weak<Self> = Arc::downgrade(self);
        waker.post(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.wake_scheduled.store(false, Ordering::Release);
                _ = shared.drain(time::now());
            }
        }));
    }
}

/// Returns a draining runner to idle, also when a task unwinds.
struct DrainGuard<'a> {
    state: &'a AtomicU8,
    kind: QueueKind,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            log::error!(
                "{:?} runner: task panicked; the rest of this pass is dropped",
                self.kind
            );
        }
        // Disposal may have happened from inside a task.
        _ = self
            .state
            .compare_exchange(DRAINING, IDLE, Ordering::AcqRel, Ordering::Acquire);
    }
}

/// A task queue bound to one OS thread.
///
/// Dropping the runner disposes it: pending tasks are dropped with a warning
/// and further posts through outstanding handles are rejected.
pub struct TaskRunner<T> {
    shared: Arc<Shared<T>>,
}

impl<T> fmt::Debug for TaskRunner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunner")
            .field("kind", &self.shared.kind)
            .field("thread", &self.shared.thread)
            .field("pending", &self.shared.queue.lock().len())
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> TaskRunner<T> {
    /// Creates a runner bound to `thread`.
    pub fn new(kind: QueueKind, thread: ThreadId, executor: Arc<dyn TaskExecutor<T>>) -> Self {
        Self::build(kind, thread, executor, None)
    }

    /// Creates a runner bound to the calling thread.
    pub fn for_current_thread(kind: QueueKind, executor: Arc<dyn TaskExecutor<T>>) -> Self {
        Self::new(kind, thread::current().id(), executor)
    }

    /// Creates a runner bound to the thread behind `waker`.
    ///
    /// Posting an eligible task schedules a drain on that thread through
    /// `waker`, so the queue makes progress without a host-side pump.
    pub fn with_waker(
        kind: QueueKind,
        thread: ThreadId,
        executor: Arc<dyn TaskExecutor<T>>,
        waker: Arc<dyn ThreadPoster>,
    ) -> Self {
        Self::build(kind, thread, executor, Some(waker))
    }

    fn build(
        kind: QueueKind,
        thread: ThreadId,
        executor: Arc<dyn TaskExecutor<T>>,
        waker: Option<Arc<dyn ThreadPoster>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                kind,
                thread,
                queue: Mutex::new(TaskQueue::new()),
                observers: Mutex::new(HashMap::new()),
                state: AtomicU8::new(IDLE),
                wake_scheduled: AtomicBool::new(false),
                executor,
                waker,
            }),
        }
    }

    /// Returns a cloneable posting handle.
    #[must_use]
    pub fn handle(&self) -> TaskRunnerHandle<T> {
        TaskRunnerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Returns which engine queue this runner serves.
    #[must_use]
    pub fn kind(&self) -> QueueKind {
        self.shared.kind
    }

    /// Drains every task eligible now and returns the time spent.
    ///
    /// # Panics
    ///
    /// Panics if called off the bound thread.
    pub fn process_tasks(&self) -> Duration {
        self.process_tasks_at(time::now()).elapsed
    }

    /// Drains every task eligible at `now`.
    ///
    /// Each eligible task runs exactly once, in deadline order with ties in
    /// submission order. Observers run once afterwards, even if nothing was
    /// eligible. A call from inside a running task returns immediately.
    ///
    /// # Panics
    ///
    /// Panics if called off the bound thread.
    pub fn process_tasks_at(&self, now: HostTime) -> DrainOutcome {
        self.shared.drain(now)
    }

    /// Returns `true` when called from the bound thread.
    #[must_use]
    pub fn runs_tasks_on_current_thread(&self) -> bool {
        thread::current().id() == self.shared.thread
    }

    /// Returns the earliest pending deadline, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<HostTime> {
        self.shared.queue.lock().next_deadline()
    }

    /// Returns `true` if any task is queued, eligible or not.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.shared.queue.lock().is_empty()
    }

    /// Drains every eligible task on the bound thread and waits for it.
    ///
    /// Called on the bound thread this is a plain drain. Otherwise the drain
    /// is posted through the waker and the caller blocks until it finished.
    /// A runner without a waker cannot be drained from another thread and
    /// reports zero tasks.
    pub fn drain_and_wait(&self) -> Result<usize, HandshakeError> {
        if self.runs_tasks_on_current_thread() {
            return Ok(self.shared.drain(time::now()).executed);
        }
        let Some(waker) = &self.shared.waker else {
            log::warn!(
                "{:?} runner has no waker; cannot drain from {:?}",
                self.shared.kind,
                thread::current().id()
            );
            return Ok(0);
        };
        let (tx, rx) = crossbeam_channel::bounded(1);
        let shared = Arc::clone(&self.shared);
        waker.post(Box::new(move || {
            _ = tx.send(shared.drain(time::now()).executed);
        }));
        rx.recv().map_err(|_| HandshakeError::WorkerGone)
    }

    /// Schedules a drain on the bound thread if tasks are eligible.
    ///
    /// Does nothing for a runner without a waker.
    pub fn wake(&self) {
        if self.shared.queue.lock().has_eligible(time::now()) {
            self.shared.schedule_wake();
        }
    }
}

impl<T> Drop for TaskRunner<T> {
    fn drop(&mut self) {
        self.shared.state.store(DISPOSED, Ordering::Release);
        let dropped = self.shared.queue.lock().clear();
        if !dropped.is_empty() {
            log::warn!(
                "{:?} runner disposed with {} pending task(s)",
                self.shared.kind,
                dropped.len()
            );
        }
        self.shared.observers.lock().clear();
    }
}

/// Posting side of a [`TaskRunner`], shareable across threads.
pub struct TaskRunnerHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for TaskRunnerHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for TaskRunnerHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRunnerHandle")
            .field("kind", &self.shared.kind)
            .field("thread", &self.shared.thread)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> TaskRunnerHandle<T> {
    /// Returns which engine queue the runner serves.
    #[must_use]
    pub fn kind(&self) -> QueueKind {
        self.shared.kind
    }

    /// Returns the engine-facing identifier of the runner.
    #[must_use]
    pub fn identifier(&self) -> u64 {
        self.shared.kind.identifier()
    }

    /// Enqueues `task` to run no earlier than `target`.
    ///
    /// A target at or before now makes the task eligible on the next drain.
    /// Posting to a disposed runner is a caller bug; the task is dropped.
    pub fn post_task(&self, task: T, target: HostTime) {
        if self.shared.state.load(Ordering::Acquire) == DISPOSED {
            log::error!("{:?} runner: task posted after dispose", self.shared.kind);
            debug_assert!(false, "task posted to a disposed runner");
            return;
        }
        self.shared.queue.lock().push(task, target);
        if target <= time::now() {
            self.shared.schedule_wake();
        }
    }

    /// Returns `true` when called from the runner's bound thread.
    #[must_use]
    pub fn runs_tasks_on_current_thread(&self) -> bool {
        thread::current().id() == self.shared.thread
    }

    /// Registers `observer` under `key`, replacing any previous one.
    pub fn add_task_observer(&self, key: isize, observer: Observer) {
        self.shared.observers.lock().insert(key, observer);
    }

    /// Removes the observer under `key`. Unknown keys are ignored.
    pub fn remove_task_observer(&self, key: isize) {
        self.shared.observers.lock().remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    fn recording_runner() -> (TaskRunner<u32>, Arc<Mutex<Vec<u32>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let runner = TaskRunner::for_current_thread(
            QueueKind::Platform,
            Arc::new(move |task: u32| sink.lock().push(task)),
        );
        (runner, log)
    }

    #[test]
    fn drains_in_deadline_then_submission_order() {
        let (runner, log) = recording_runner();
        let handle = runner.handle();
        handle.post_task(1, HostTime(30));
        handle.post_task(2, HostTime(10));
        handle.post_task(3, HostTime(30));
        handle.post_task(4, HostTime::ZERO);
        handle.post_task(5, HostTime(500));

        let outcome = runner.process_tasks_at(HostTime(100));
        assert_eq!(outcome.executed, 4);
        assert_eq!(*log.lock(), vec![4, 2, 1, 3]);
        assert_eq!(runner.next_deadline(), Some(HostTime(500)));
        assert!(runner.has_pending(), "future task stays queued");
    }

    #[test]
    fn tasks_posted_during_drain_wait_for_next_pass() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let slot: Arc<Mutex<Option<TaskRunnerHandle<u32>>>> = Arc::new(Mutex::new(None));
        let (sink, repost) = (Arc::clone(&log), Arc::clone(&slot));
        let runner = TaskRunner::for_current_thread(
            QueueKind::Platform,
            Arc::new(move |task: u32| {
                sink.lock().push(task);
                if task < 3 {
                    if let Some(handle) = repost.lock().as_ref() {
                        handle.post_task(task + 1, HostTime::ZERO);
                    }
                }
            }),
        );
        *slot.lock() = Some(runner.handle());
        runner.handle().post_task(1, HostTime::ZERO);

        assert_eq!(runner.process_tasks_at(HostTime(1)).executed, 1);
        assert_eq!(runner.process_tasks_at(HostTime(1)).executed, 1);
        assert_eq!(runner.process_tasks_at(HostTime(1)).executed, 1);
        assert_eq!(runner.process_tasks_at(HostTime(1)).executed, 0);
        assert_eq!(*log.lock(), vec![1, 2, 3]);
        *slot.lock() = None;
    }

    #[test]
    fn panicking_task_does_not_wedge_the_runner() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let runner = TaskRunner::for_current_thread(
            QueueKind::Platform,
            Arc::new(move |task: u32| {
                assert_ne!(task, 1, "task 1 fails");
                sink.lock().push(task);
            }),
        );
        runner.handle().post_task(1, HostTime::ZERO);
        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            runner.process_tasks_at(HostTime(1))
        }));
        assert!(unwound.is_err());

        runner.handle().post_task(2, HostTime::ZERO);
        assert_eq!(runner.process_tasks_at(HostTime(1)).executed, 1);
        assert_eq!(*log.lock(), vec![2]);
    }

    #[test]
    fn observers_run_once_per_pass_even_when_empty() {
        let (runner, _log) = recording_runner();
        let handle = runner.handle();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        handle.add_task_observer(
            7,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            }),
        );

        _ = runner.process_tasks_at(HostTime(0));
        handle.post_task(1, HostTime::ZERO);
        handle.post_task(2, HostTime::ZERO);
        _ = runner.process_tasks_at(HostTime(0));
        assert_eq!(calls.load(Ordering::Relaxed), 2);

        handle.remove_task_observer(7);
        handle.remove_task_observer(7);
        _ = runner.process_tasks_at(HostTime(0));
        assert_eq!(calls.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn thread_identity_is_checked() {
        let (runner, _log) = recording_runner();
        let handle = runner.handle();
        assert!(runner.runs_tasks_on_current_thread());
        let off_thread = thread::spawn(move || handle.runs_tasks_on_current_thread())
            .join()
            .unwrap();
        assert!(!off_thread, "spawned thread is not the bound thread");
    }

    #[test]
    #[should_panic(expected = "drained off its bound thread")]
    fn draining_off_thread_panics() {
        let other = thread::spawn(|| thread::current().id()).join().unwrap();
        let runner: TaskRunner<u32> =
            TaskRunner::new(QueueKind::Render, other, Arc::new(|_task: u32| {}));
        _ = runner.process_tasks_at(HostTime(0));
    }

    #[test]
    fn drop_discards_pending_tasks() {
        let dropped = Arc::new(AtomicUsize::new(0));
        struct Tracked(Arc<AtomicUsize>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let runner = TaskRunner::for_current_thread(
            QueueKind::Platform,
            Arc::new(|_task: Tracked| {}),
        );
        runner.handle().post_task(Tracked(Arc::clone(&dropped)), HostTime(u64::MAX));
        runner.handle().post_task(Tracked(Arc::clone(&dropped)), HostTime(u64::MAX));
        drop(runner);
        assert_eq!(dropped.load(Ordering::Relaxed), 2);
    }

    struct ChannelWorker {
        jobs: Mutex<mpsc::Sender<Box<dyn FnOnce() + Send>>>,
    }

    impl ThreadPoster for ChannelWorker {
        fn post(&self, job: Box<dyn FnOnce() + Send>) {
            _ = self.jobs.lock().send(job);
        }
    }

    #[test]
    fn waker_drains_on_worker_thread() {
        let (tx, rx) = mpsc::channel::<Box<dyn FnOnce() + Send>>();
        let (id_tx, id_rx) = mpsc::channel();
        let worker = thread::spawn(move || {
            _ = id_tx.send(thread::current().id());
            while let Ok(job) = rx.recv() {
                job();
            }
        });
        let worker_id = id_rx.recv().unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let done_tx = Mutex::new(done_tx);
        let runner = TaskRunner::with_waker(
            QueueKind::Render,
            worker_id,
            Arc::new(move |task: u32| {
                _ = done_tx.lock().send((task, thread::current().id()));
            }),
            Arc::new(ChannelWorker {
                jobs: Mutex::new(tx),
            }),
        );
        runner.handle().post_task(11, HostTime::ZERO);

        let (task, ran_on) = done_rx.recv().unwrap();
        assert_eq!(task, 11);
        assert_eq!(ran_on, worker_id);
        assert!(!runner.runs_tasks_on_current_thread());

        drop(runner);
        worker.join().unwrap();
    }

    #[test]
    fn drain_and_wait_runs_eligible_tasks_on_the_worker() {
        let (tx, rx) = mpsc::channel::<Box<dyn FnOnce() + Send>>();
        let (id_tx, id_rx) = mpsc::channel();
        let worker = thread::spawn(move || {
            _ = id_tx.send(thread::current().id());
            while let Ok(job) = rx.recv() {
                job();
            }
        });
        let worker_id = id_rx.recv().unwrap();

        let ran = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&ran);
        let runner = TaskRunner::with_waker(
            QueueKind::Render,
            worker_id,
            Arc::new(move |task: u32| sink.lock().push((task, thread::current().id()))),
            Arc::new(ChannelWorker {
                jobs: Mutex::new(tx),
            }),
        );
        // Not yet eligible when posted, so no wake is scheduled.
        runner
            .handle()
            .post_task(21, time::now() + Duration(1_000_000));
        thread::sleep(std::time::Duration::from_millis(5));
        assert!(ran.lock().is_empty());

        assert_eq!(runner.drain_and_wait().unwrap(), 1);
        assert_eq!(*ran.lock(), vec![(21, worker_id)]);

        drop(runner);
        worker.join().unwrap();
    }
}
