// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Worker-thread identity handshake.

use std::thread::{self, ThreadId};

/// A facility that runs jobs on one specific host thread.
///
/// The host's graphics worker implements this. Jobs posted from any thread
/// run in order on the worker.
pub trait ThreadPoster: Send + Sync {
    /// Schedules `job` on the target thread.
    fn post(&self, job: Box<dyn FnOnce() + Send>);
}

/// Failure to learn the worker thread's identity.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// The host dropped the handshake job without running it.
    #[error("graphics worker dropped the handshake job without running it")]
    WorkerGone,
}

/// Blocks until a job posted through `poster` reports the thread it ran on.
///
/// This is a one-shot rendezvous; the wait is bounded only by how long the
/// host takes to schedule the job. It must not be called from the worker
/// thread itself.
pub fn discover_worker_thread(poster: &dyn ThreadPoster) -> Result<ThreadId, HandshakeError> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    poster.post(Box::new(move || {
        // The receiver only goes away if the caller already gave up.
        _ = tx.send(thread::current().id());
    }));
    let id = rx.recv().map_err(|_| HandshakeError::WorkerGone)?;
    log::debug!("graphics worker thread discovered: {id:?}");
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    struct SpawnedWorker {
        jobs: parking_lot::Mutex<mpsc::Sender<Box<dyn FnOnce() + Send>>>,
    }

    impl ThreadPoster for SpawnedWorker {
        fn post(&self, job: Box<dyn FnOnce() + Send>) {
            _ = self.jobs.lock().send(job);
        }
    }

    struct Dropper;

    impl ThreadPoster for Dropper {
        fn post(&self, job: Box<dyn FnOnce() + Send>) {
            drop(job);
        }
    }

    #[test]
    fn handshake_reports_worker_identity() {
        let (tx, rx) = mpsc::channel::<Box<dyn FnOnce() + Send>>();
        let worker = thread::spawn(move || {
            let id = thread::current().id();
            while let Ok(job) = rx.recv() {
                job();
            }
            id
        });
        let poster = SpawnedWorker {
            jobs: parking_lot::Mutex::new(tx),
        };

        let discovered = discover_worker_thread(&poster).unwrap();
        assert_ne!(discovered, thread::current().id());

        drop(poster);
        assert_eq!(worker.join().unwrap(), discovered);
    }

    #[test]
    fn dropped_job_is_an_error() {
        assert!(matches!(
            discover_worker_thread(&Dropper),
            Err(HandshakeError::WorkerGone)
        ));
    }
}
