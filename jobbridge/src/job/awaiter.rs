use super::buffer::Buffer;
use super::state::{Finished, JobState, Listener, ListenerId, StateCell};
use super::{BackgroundJob, JobId, StartOptions, default_name};
use crate::awaitable::{Awaitable, DriveOutcome, ErasedAwaitable, Operand, OperandKind, ResultType};
use crate::cancel::Cancellation;
use crate::error::{BoxError, Error, InvalidOperand, PoolShutdown, SharedError, TaskError};
use crate::record::{AWAITABLE_JOB_ERROR, ErrorCategory, ErrorRecord, ErrorTarget};
use crate::runtime::Handle;
use crate::task::{Task, TaskStatus, WeakTask};
use crate::utils::{CatchUnwind, lock, machine_name};
use crate::value::Value;

use std::any::type_name;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Verbose note recorded when a job without a cancel action is stopped.
const UNSTOPPABLE_NOTE: &str = "Attempted to stop the job but no cancellation action was \
                                provided. The job will be stopped, but the awaitable action \
                                will continue.";

/// Debug note recorded when a completed task's value cannot be read.
const MISSING_RESULT_NOTE: &str =
    "Expected to get a result from the task but the result could not be retrieved.";

/// Reads the status of the wrapped task without keeping it alive.
type StatusProbe = Box<dyn Fn() -> Option<TaskStatus> + Send + Sync>;

/// A pollable handle over one awaitable operation.
///
/// The job is `Running` as soon as it is returned; the operation is
/// waited on from the drive pool, never inside the constructor. Its
/// outcome lands in the job's buffers:
///
/// - the result, if any, in the output buffer,
/// - a fault as one [`ErrorRecord`] in the error buffer,
/// - diagnostic notes in the verbose and debug buffers.
///
/// Cloning yields another handle to the same job.
///
/// # Examples
///
/// ```rust,ignore
/// let job = AwaiterJob::start_awaitable(from_infallible(async { 42 }), StartOptions::new());
///
/// assert_eq!(job.finished().await, JobState::Completed);
/// let output = job.drain_output();
/// assert_eq!(output[0].downcast_ref::<i32>(), Some(&42));
/// ```
#[derive(Clone)]
pub struct AwaiterJob {
    shared: Arc<Shared>,
}

struct Shared {
    id: JobId,
    name: String,
    command: String,
    location: String,
    job_type: String,

    state: Arc<StateCell>,

    output: Buffer<Value>,
    errors: Buffer<ErrorRecord>,
    verbose: Buffer<String>,
    debug: Buffer<String>,

    /// Present iff the job supports cancellation.
    cancellation: Option<Cancellation>,

    /// Serializes stop requests.
    cancel_lock: Mutex<()>,

    /// Set for task-backed jobs.
    status: Option<StatusProbe>,
}

impl AwaiterJob {
    /// Starts a job over `operand`.
    ///
    /// Host tasks and value tasks are observed through a completion
    /// continuation, any other awaitable is driven on the drive pool.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOperand`] if `operand` is absent or not awaitable.
    pub fn start(operand: impl Into<Option<Operand>>, options: StartOptions) -> Result<Self, Error> {
        let operand = operand.into().ok_or(InvalidOperand::Missing)?;

        match operand.into_kind() {
            OperandKind::Task(task) => Ok(task.start(options)),
            OperandKind::ValueTask(task) => Ok(task.into_task().start(options)),
            OperandKind::Awaitable(awaitable) => Ok(Self::drive(awaitable, options)),
            OperandKind::Opaque { type_name, .. } => {
                Err(InvalidOperand::NotAwaitable { type_name }.into())
            }
        }
    }

    /// Starts a job that drives `awaitable`.
    pub fn start_awaitable<A: Awaitable>(awaitable: A, options: StartOptions) -> Self {
        Self::drive(crate::awaitable::erase(awaitable), options)
    }

    /// Starts a job observing `task`.
    ///
    /// The job holds the task weakly. When `T` is not `()` a copy of the
    /// task's value is published to the output buffer on success; the
    /// task itself keeps its value for every other holder.
    pub fn start_task<T: Clone + Send + 'static>(task: Task<T>, options: StartOptions) -> Self {
        let job_type = match ResultType::of::<T>() {
            Some(result) => format!("TaskJob<{}>", result.name()),
            None => String::from("TaskJob"),
        };

        let weak: WeakTask<T> = task.downgrade();
        let probe: StatusProbe = Box::new(move || weak.status());

        let handle = options.runtime.clone().unwrap_or_else(Handle::current);
        let job = Self::new(options, job_type, Some(probe));
        tracing::debug!(job = %job.id(), task = %task.id(), "task job started");

        // The job finishes from the pool, or inline wherever the pool
        // drops the queued continuation.
        let shared = job.shared.clone();
        task.continue_with(move |task| {
            let settle = Settle::new(move || shared.finish_task(&task));
            handle.spawn_detached(async move { settle.run() });
        });

        job
    }

    fn drive(awaitable: Box<dyn ErasedAwaitable>, options: StartOptions) -> Self {
        let type_name = awaitable.type_name();
        let handle = options.runtime.clone().unwrap_or_else(Handle::current);
        let job = Self::new(options, String::from("AwaiterJob"), None);
        tracing::debug!(job = %job.id(), awaitable = type_name, "awaiter job started");

        let shared = job.shared.clone();
        let abandon = {
            let shared = shared.clone();
            Settle::new(move || shared.abandon(ErrorTarget::awaitable(type_name)))
        };
        let drive = awaitable.into_drive();
        handle.spawn_detached(async move {
            let _abandon = abandon;
            let outcome = match CatchUnwind::new(drive).await {
                Ok(outcome) => outcome,
                Err(panicked) => Err(BoxError::from(panicked)),
            };
            shared.finish_driven(type_name, outcome);
        });

        job
    }

    fn new(options: StartOptions, job_type: String, status: Option<StatusProbe>) -> Self {
        let id = JobId::next();

        Self {
            shared: Arc::new(Shared {
                id,
                name: options.name.unwrap_or_else(|| default_name(id)),
                command: options.command,
                location: options.location.unwrap_or_else(machine_name),
                job_type,
                state: Arc::new(StateCell::new(JobState::Running)),
                output: Buffer::new(),
                errors: Buffer::new(),
                verbose: Buffer::new(),
                debug: Buffer::new(),
                cancellation: options.cancellation,
                cancel_lock: Mutex::new(()),
                status,
            }),
        }
    }

    /// Returns `true` if a cancel action was supplied at start.
    pub fn supports_cancellation(&self) -> bool {
        self.shared.cancellation.is_some()
    }

    /// Resolves with the finished state.
    pub fn finished(&self) -> Finished {
        Finished::new(self.shared.state.clone())
    }

    /// Removes and returns the buffered output, oldest first.
    pub fn drain_output(&self) -> Vec<Value> {
        self.shared.output.drain()
    }

    /// Removes and returns the buffered error records.
    pub fn drain_errors(&self) -> Vec<ErrorRecord> {
        self.shared.errors.drain()
    }

    /// Removes and returns the buffered verbose notes.
    pub fn drain_verbose(&self) -> Vec<String> {
        self.shared.verbose.drain()
    }

    /// Removes and returns the buffered debug notes.
    pub fn drain_debug(&self) -> Vec<String> {
        self.shared.debug.drain()
    }

    pub fn output_len(&self) -> usize {
        self.shared.output.len()
    }

    pub fn error_len(&self) -> usize {
        self.shared.errors.len()
    }

    /// Copies the verbose notes without draining them.
    pub fn verbose(&self) -> Vec<String> {
        self.shared.verbose.snapshot()
    }

    /// Copies the debug notes without draining them.
    pub fn debug(&self) -> Vec<String> {
        self.shared.debug.snapshot()
    }

    /// Registers an internal listener and returns the state it was
    /// registered in.
    pub(crate) fn subscribe_with_state(&self, listener: Listener) -> (ListenerId, JobState) {
        self.shared.state.subscribe(listener)
    }
}

impl Shared {
    /// Applies the outcome of a driven awaitable.
    fn finish_driven(&self, type_name: &'static str, outcome: DriveOutcome) {
        let change = match outcome {
            Ok(value) => self.state.transition_with(|_| {
                if let Some(value) = value {
                    self.output.push(value);
                }
                Some(JobState::Completed)
            }),
            Err(error) => self.state.transition_with(|current| {
                if current == JobState::Stopping {
                    return Some(JobState::Stopped);
                }

                self.errors.push(ErrorRecord::new(
                    SharedError::from(error),
                    AWAITABLE_JOB_ERROR,
                    ErrorCategory::NotSpecified,
                    Some(ErrorTarget::awaitable(type_name)),
                ));
                Some(JobState::Failed)
            }),
        };

        match change {
            Some(change) => {
                tracing::debug!(job = %self.id, state = %change.current, "awaiter job finished");
            }
            None => {
                tracing::trace!(job = %self.id, "job already finished; discarding late outcome");
            }
        }
    }

    /// Applies the outcome of a completed task.
    fn finish_task<T: Clone + Send + 'static>(&self, task: &Task<T>) {
        let outcome = if ResultType::of::<T>().is_some() {
            task.result().map(|value| Some(Value::new(value)))
        } else if let Some(fault) = task.fault() {
            Err(TaskError::Faulted(fault))
        } else if task.is_canceled() {
            Err(TaskError::Canceled)
        } else {
            Ok(None)
        };

        let change = match outcome {
            Ok(value) => self.state.transition_with(|_| {
                if let Some(value) = value {
                    self.output.push(value);
                }
                Some(JobState::Completed)
            }),
            Err(TaskError::Canceled) => self.state.transition_with(|_| Some(JobState::Stopped)),
            Err(TaskError::Faulted(fault)) => self.state.transition_with(|_| {
                self.errors.push(ErrorRecord::new(
                    fault,
                    AWAITABLE_JOB_ERROR,
                    ErrorCategory::NotSpecified,
                    Some(ErrorTarget::task(type_name::<Task<T>>(), task.id())),
                ));
                Some(JobState::Failed)
            }),
            Err(TaskError::Result(error)) => {
                tracing::debug!(job = %self.id, task = %task.id(), %error, "task result could not be read");
                self.state.transition_with(|_| {
                    self.debug.push(format!("{MISSING_RESULT_NOTE}\n{error}"));
                    Some(JobState::Completed)
                })
            }
        };

        match change {
            Some(change) => {
                tracing::debug!(job = %self.id, state = %change.current, "task job finished");
            }
            None => {
                tracing::trace!(job = %self.id, "job already finished; discarding late outcome");
            }
        }
    }

    /// Finishes a job whose drive future was dropped before it finished.
    ///
    /// A stopping job ends `Stopped`; any other running job ends `Failed`
    /// with a [`PoolShutdown`] record. No-op once the job is finished.
    fn abandon(&self, target: ErrorTarget) {
        let change = self.state.transition_with(|current| {
            if current == JobState::Stopping {
                return Some(JobState::Stopped);
            }

            self.errors.push(ErrorRecord::new(
                Arc::new(PoolShutdown),
                AWAITABLE_JOB_ERROR,
                ErrorCategory::OperationStopped,
                Some(target),
            ));
            Some(JobState::Failed)
        });

        if let Some(change) = change {
            tracing::warn!(job = %self.id, state = %change.current, "drive pool shut down before the job finished");
        }
    }

    /// Stops the job.
    ///
    /// With a cancel action the job moves to `Stopping` and the action
    /// runs under the cancellation lock; the operation decides how the
    /// job finishes. Without one the job is marked `Stopped` right away.
    fn stop(&self) {
        let Some(cancellation) = &self.cancellation else {
            let change = self.state.transition_with(|current| {
                (current == JobState::Running).then(|| {
                    self.verbose.push(String::from(UNSTOPPABLE_NOTE));
                    JobState::Stopped
                })
            });
            if change.is_some() {
                tracing::warn!(job = %self.id, "stopped a job without a cancellation action; the operation keeps running");
            }
            return;
        };

        let _guard = lock(&self.cancel_lock);
        if self
            .state
            .transition_if(JobState::Running, JobState::Stopping)
            .is_some()
        {
            tracing::debug!(job = %self.id, "invoking cancellation action");
            cancellation.invoke();
        }
    }
}

/// Runs a settle action exactly once: explicitly through [`run`](Self::run),
/// or when dropped.
///
/// Futures queued on a drive pool are dropped unpolled when the pool
/// shuts down. Moving a `Settle` into such a future guarantees the job
/// it settles still reaches a finished state.
struct Settle<F: FnOnce()> {
    action: Option<F>,
}

impl<F: FnOnce()> Settle<F> {
    fn new(action: F) -> Self {
        Self {
            action: Some(action),
        }
    }

    fn run(mut self) {
        if let Some(action) = self.action.take() {
            action();
        }
    }
}

impl<F: FnOnce()> Drop for Settle<F> {
    fn drop(&mut self) {
        if let Some(action) = self.action.take() {
            action();
        }
    }
}

impl BackgroundJob for AwaiterJob {
    fn id(&self) -> JobId {
        self.shared.id
    }

    fn name(&self) -> &str {
        &self.shared.name
    }

    fn command(&self) -> &str {
        &self.shared.command
    }

    fn job_type(&self) -> &str {
        &self.shared.job_type
    }

    fn state(&self) -> JobState {
        self.shared.state.get()
    }

    /// The wrapped task's status, or an empty string for driven jobs and
    /// reclaimed tasks.
    fn status_message(&self) -> String {
        self.shared
            .status
            .as_ref()
            .and_then(|probe| probe())
            .map(|status| status.to_string())
            .unwrap_or_default()
    }

    fn location(&self) -> String {
        self.shared.location.clone()
    }

    fn has_more_data(&self) -> bool {
        !self.shared.output.is_empty() || !self.shared.errors.is_empty()
    }

    fn stop(&self) {
        self.shared.stop();
    }

    fn subscribe(&self, listener: Listener) -> ListenerId {
        self.shared.state.subscribe(listener).0
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.shared.state.unsubscribe(id)
    }

    fn wait(&self) -> JobState {
        self.shared.state.wait()
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        self.shared.state.wait_timeout(timeout)
    }
}

impl fmt::Debug for AwaiterJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwaiterJob")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("job_type", &self.shared.job_type)
            .field("state", &self.shared.state.get())
            .finish_non_exhaustive()
    }
}
