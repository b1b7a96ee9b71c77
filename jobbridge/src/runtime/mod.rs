//! The drive pool.
//!
//! Jobs need somewhere to run: a driven awaitable is polled on a pool
//! worker, and a task continuation is scheduled there instead of running
//! inside the job constructor. This module provides exactly that, and
//! nothing of a general runtime: no timers, no IO.
//!
//! It is composed of:
//! - [`RuntimeBuilder`] / [`Runtime`]: an owned pool of worker threads,
//! - [`Handle`]: a cheap, cloneable spawner for a pool,
//! - the run queue, workers and runnable tasks used internally.
//!
//! Code that does not pick a pool explicitly uses [`Handle::current`]:
//! the pool of the current worker thread, or a process-wide default
//! pool started on first use.

mod builder;
mod context;
mod core;
mod handle;
mod queue;
mod runnable;
mod worker;

pub use builder::RuntimeBuilder;
pub use self::core::Runtime;
pub use handle::Handle;

use crate::cancel::CancellationToken;
use crate::error::BoxError;
use crate::task::Task;

use std::future::Future;

/// Spawns a fallible future onto the current pool and returns its task.
///
/// See [`Handle::spawn`].
pub fn spawn<F, T, E>(future: F) -> Task<T>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError>,
{
    Handle::current().spawn(future)
}

/// Spawns a fallible future that is abandoned once `token` is cancelled.
///
/// See [`Handle::spawn_cancellable`].
pub fn spawn_cancellable<F, T, E>(token: CancellationToken, future: F) -> Task<T>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError>,
{
    Handle::current().spawn_cancellable(token, future)
}
