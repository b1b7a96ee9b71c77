//! Jobs: pollable handles over awaitable operations.
//!
//! - [`AwaiterJob`] wraps one operation. It is either *driven* (an
//!   [`Awaitable`](crate::Awaitable) polled on the drive pool) or
//!   *task-backed* (a completion continuation registered on a
//!   [`Task`](crate::Task)).
//! - [`AggregateJob`] combines many jobs into one whose finished state
//!   derives from its children.
//!
//! Both implement [`BackgroundJob`], the common status and control
//! surface.

mod aggregate;
mod awaiter;
mod buffer;
mod state;

pub use aggregate::AggregateJob;
pub use awaiter::AwaiterJob;
pub use state::{Finished, JobState, Listener, ListenerId, StateChange};

use crate::cancel::{Cancellation, CancellationSource};
use crate::runtime::Handle;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Process-unique identifier of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(u64);

impl JobId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The status and control surface shared by every job.
pub trait BackgroundJob: Send + Sync {
    fn id(&self) -> JobId;

    /// Display name; `Job{id}` unless one was given at start.
    fn name(&self) -> &str;

    /// Label of the command that started the job.
    fn command(&self) -> &str;

    /// Kind of job, e.g. `"AwaiterJob"` or `"TaskJob"`.
    fn job_type(&self) -> &str;

    fn state(&self) -> JobState;

    /// Human-readable status text.
    fn status_message(&self) -> String;

    /// Where the job runs.
    fn location(&self) -> String;

    /// Returns `true` while output or errors are waiting to be drained.
    fn has_more_data(&self) -> bool;

    /// Requests the job to stop. Finished jobs ignore the request.
    fn stop(&self);

    /// Registers a callback run after every state transition.
    ///
    /// Callbacks run on the thread applying the transition, after the
    /// job's state lock was released.
    fn subscribe(&self, listener: Listener) -> ListenerId;

    /// Removes a callback. Returns `false` if it was already removed.
    fn unsubscribe(&self, id: ListenerId) -> bool;

    /// Blocks the current thread until the job is finished.
    ///
    /// Do not call this from a drive pool worker that the job itself
    /// needs; use the async `finished()` of the concrete job instead.
    fn wait(&self) -> JobState;

    /// Blocks until the job is finished or `timeout` elapses. Returns
    /// `true` if the job is finished.
    fn wait_timeout(&self, timeout: Duration) -> bool;
}

/// Configuration of a new [`AwaiterJob`].
///
/// # Examples
///
/// ```rust,ignore
/// let source = CancellationSource::new();
/// let options = StartOptions::new()
///     .name("download")
///     .command("Get-Thing")
///     .cancel_with(&source);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub(crate) name: Option<String>,
    pub(crate) location: Option<String>,
    pub(crate) command: String,
    pub(crate) cancellation: Option<Cancellation>,
    pub(crate) runtime: Option<Handle>,
}

impl StartOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the job name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the job location. Defaults to the machine's host name.
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Sets the command label.
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    /// Sets the action invoked by [`BackgroundJob::stop`].
    ///
    /// Without one the job is still marked stopped on request, but the
    /// operation keeps running.
    pub fn cancellation(mut self, cancellation: impl Into<Cancellation>) -> Self {
        self.cancellation = Some(cancellation.into());
        self
    }

    /// Stops the job by cancelling `source`.
    pub fn cancel_with(self, source: &CancellationSource) -> Self {
        self.cancellation(source)
    }

    /// Sets the drive pool the job runs on. Defaults to
    /// [`Handle::current`].
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }
}

/// Configuration of a new [`AggregateJob`].
#[derive(Debug, Clone, Default)]
pub struct AggregateOptions {
    pub(crate) name: Option<String>,
    pub(crate) command: String,
}

impl AggregateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the job name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the command label.
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }
}

/// Default job name.
fn default_name(id: JobId) -> String {
    format!("Job{id}")
}
