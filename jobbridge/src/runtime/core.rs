use super::Handle;
use super::queue::RunQueue;
use super::worker::Worker;
use crate::cancel::CancellationToken;
use crate::error::BoxError;
use crate::task::Task;
use crate::utils::CatchUnwind;

use std::fmt;
use std::future::Future;
use std::panic::resume_unwind;
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};

/// A pool of worker threads that drives jobs and spawned futures.
///
/// `Runtime` is responsible for:
/// - spawning futures, either detached or as host [`Task`]s,
/// - providing a synchronous entry point via [`block_on`](Self::block_on).
///
/// Dropping the runtime discards every future still queued and joins the
/// workers.
pub struct Runtime {
    /// Spawner shared with the workers.
    handle: Handle,

    /// Join handles of the worker threads.
    workers: Vec<JoinHandle<()>>,
}

impl Runtime {
    /// Creates a pool with `worker_threads` workers named
    /// `{thread_name}-{index}`.
    pub(crate) fn new(worker_threads: usize, thread_name: &str) -> Self {
        let handle = Handle::new(Arc::new(RunQueue::new()));

        let workers = (0..worker_threads)
            .map(|id| {
                let worker = Worker::new(id, handle.clone());
                thread::Builder::new()
                    .name(format!("{thread_name}-{id}"))
                    .spawn(move || worker.run())
                    .unwrap_or_else(|err| panic!("failed to spawn drive pool worker: {err}"))
            })
            .collect();

        tracing::debug!(worker_threads, thread_name, "drive pool started");

        Self { handle, workers }
    }

    /// Returns a spawner for this pool.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Spawns a future whose output nobody observes.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// runtime.spawn_detached(async {
    ///     // background work
    /// });
    /// ```
    pub fn spawn_detached<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn_detached(future);
    }

    /// Spawns a fallible future and returns a [`Task`] for its outcome.
    ///
    /// See [`Handle::spawn`].
    pub fn spawn<F, T, E>(&self, future: F) -> Task<T>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError>,
    {
        self.handle.spawn(future)
    }

    /// Spawns a fallible future that is abandoned once `token` fires.
    ///
    /// See [`Handle::spawn_cancellable`].
    pub fn spawn_cancellable<F, T, E>(&self, token: CancellationToken, future: F) -> Task<T>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError>,
    {
        self.handle.spawn_cancellable(token, future)
    }

    /// Runs a future to completion on the pool, blocking the current
    /// thread.
    ///
    /// The future is spawned onto a worker and its output sent back
    /// through a channel. A panic inside the future is resumed on the
    /// calling thread.
    ///
    /// # Panics
    ///
    /// Panics if the future panics, or if the pool shuts down before the
    /// future completes.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let state = runtime.block_on(async move { job.finished().await });
    /// ```
    pub fn block_on<F>(&self, future: F) -> F::Output
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (transmitter, receiver) = mpsc::channel();

        self.spawn_detached(async move {
            let result = CatchUnwind::new(future).await;
            let _ = transmitter.send(result);
        });

        match receiver.recv() {
            Ok(Ok(output)) => output,
            Ok(Err(panicked)) => resume_unwind(Box::new(panicked.message)),
            Err(_) => panic!("the drive pool shut down before the future completed"),
        }
    }
}

impl Drop for Runtime {
    /// Shuts the pool down.
    ///
    /// 1. Stops task submission and discards queued futures
    /// 2. Joins every worker, except the current thread if the runtime is
    ///    dropped from one of its own workers
    /// 3. Discards the futures of tasks still parked on a waker
    fn drop(&mut self) {
        self.handle.queue().shutdown();

        let current = thread::current().id();
        for worker in self.workers.drain(..) {
            if worker.thread().id() == current {
                continue;
            }
            let _ = worker.join();
        }

        self.handle.queue().release_live();

        tracing::debug!("drive pool stopped");
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("workers", &self.workers.len())
            .field("shutdown", &self.handle.is_shutdown())
            .finish()
    }
}
