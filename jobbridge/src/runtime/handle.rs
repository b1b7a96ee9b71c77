use super::RuntimeBuilder;
use super::context;
use super::core::Runtime;
use super::queue::RunQueue;
use super::runnable::RunnableTask;
use crate::cancel::CancellationToken;
use crate::error::{BoxError, Cancelled};
use crate::task::{Task, TaskSource};
use crate::utils::CatchUnwind;

use std::fmt;
use std::future::{Future, poll_fn};
use std::pin::pin;
use std::sync::{Arc, OnceLock};
use std::task::Poll;

/// A cloneable spawner for a drive pool.
///
/// A handle does not keep the pool's workers alive: once the owning
/// [`Runtime`] is dropped, spawned futures are discarded.
#[derive(Clone)]
pub struct Handle {
    queue: Arc<RunQueue>,
}

impl Handle {
    pub(crate) fn new(queue: Arc<RunQueue>) -> Self {
        Self { queue }
    }

    pub(crate) fn queue(&self) -> &Arc<RunQueue> {
        &self.queue
    }

    /// Returns the handle of the pool the current thread belongs to, or
    /// the process-wide default pool.
    ///
    /// # Panics
    ///
    /// Panics if the default pool has to be started and the operating
    /// system refuses to spawn its worker threads.
    pub fn current() -> Self {
        Self::try_current().unwrap_or_else(|| default_runtime().handle().clone())
    }

    /// Returns the handle of the pool the current thread belongs to.
    ///
    /// Unlike [`current`](Self::current), this never falls back to the
    /// default pool.
    pub fn try_current() -> Option<Self> {
        context::current()
    }

    /// Returns `true` once the owning runtime has been dropped.
    pub fn is_shutdown(&self) -> bool {
        self.queue.is_shutdown()
    }

    /// Spawns a future whose output nobody observes.
    pub(crate) fn spawn_detached<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = RunnableTask::new(Box::pin(future), self.queue.clone());
        self.queue.push(task);
    }

    /// Spawns a fallible future and returns a [`Task`] for its outcome.
    ///
    /// - `Ok(value)` runs the task to completion,
    /// - `Err(error)` faults it, or cancels it when the error carries a
    ///   [`Cancelled`] marker,
    /// - a panic faults it with [`Panicked`](crate::Panicked).
    ///
    /// The future is never polled on the calling thread.
    pub fn spawn<F, T, E>(&self, future: F) -> Task<T>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError>,
    {
        let source = TaskSource::queued();
        let task = source.task();

        self.spawn_detached(async move {
            source.set_running();

            match CatchUnwind::new(future).await {
                Ok(Ok(value)) => source.set_result(value),
                Ok(Err(error)) => source.set_error(error),
                Err(panicked) => source.set_error(panicked),
            };
        });

        task
    }

    /// Like [`spawn`](Self::spawn), but the future is dropped and the task
    /// canceled as soon as `token` is cancelled.
    pub fn spawn_cancellable<F, T, E>(&self, token: CancellationToken, future: F) -> Task<T>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<BoxError>,
    {
        self.spawn(async move {
            let mut cancelled = pin!(token.cancelled());
            let mut future = pin!(future);

            poll_fn(move |cx| {
                if cancelled.as_mut().poll(cx).is_ready() {
                    return Poll::Ready(Err(BoxError::from(Cancelled)));
                }

                future.as_mut().poll(cx).map(|res| res.map_err(Into::into))
            })
            .await
        })
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

/// The pool used when no other pool is current.
fn default_runtime() -> &'static Runtime {
    static DEFAULT: OnceLock<Runtime> = OnceLock::new();

    DEFAULT.get_or_init(|| RuntimeBuilder::new().thread_name("jobbridge-default").build())
}
