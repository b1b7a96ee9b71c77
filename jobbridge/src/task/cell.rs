use super::{TaskId, TaskStatus};
use crate::error::{BoxError, ResultError, SharedError, SourceDropped, TaskError, is_cancellation};
use crate::utils::lock;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll, Waker};

/// A callback run once the task completes.
type Continuation<T> = Box<dyn FnOnce(Task<T>) + Send>;

/// How a task ended, or `Pending` while it has not.
enum Outcome<T> {
    Pending,
    Value(T),
    /// The value was handed to a consumer.
    Taken,
    Faulted(SharedError),
    Canceled,
}

/// Everything guarded by the cell's mutex.
struct CellState<T> {
    status: TaskStatus,
    outcome: Outcome<T>,

    /// Wakers of futures awaiting the task.
    waiters: Vec<Waker>,

    /// Callbacks registered through `continue_with`.
    continuations: Vec<Continuation<T>>,
}

/// The shared completion cell behind [`Task`], [`TaskSource`] and
/// [`WeakTask`].
pub(crate) struct TaskCell<T> {
    id: TaskId,
    state: Mutex<CellState<T>>,
}

impl<T: Send + 'static> TaskCell<T> {
    fn new(status: TaskStatus) -> Arc<Self> {
        Arc::new(Self {
            id: TaskId::next(),
            state: Mutex::new(CellState {
                status,
                outcome: Outcome::Pending,
                waiters: Vec::new(),
                continuations: Vec::new(),
            }),
        })
    }

    /// Moves the task to `Running` unless it already completed.
    fn set_running(&self) {
        let mut state = lock(&self.state);
        if !state.status.is_completed() {
            state.status = TaskStatus::Running;
        }
    }

    /// Completes the task. Only the first completion takes effect.
    ///
    /// Wakers and continuations run after the lock is released, on the
    /// completing thread.
    fn complete(self: &Arc<Self>, outcome: Outcome<T>) -> bool {
        let (waiters, continuations) = {
            let mut state = lock(&self.state);
            if state.status.is_completed() {
                return false;
            }

            state.status = match &outcome {
                Outcome::Faulted(_) => TaskStatus::Faulted,
                Outcome::Canceled => TaskStatus::Canceled,
                Outcome::Pending | Outcome::Value(_) | Outcome::Taken => TaskStatus::RanToCompletion,
            };
            state.outcome = outcome;

            (
                std::mem::take(&mut state.waiters),
                std::mem::take(&mut state.continuations),
            )
        };

        tracing::trace!(task = %self.id, "task completed");

        for waker in waiters {
            waker.wake();
        }
        for continuation in continuations {
            continuation(Task { cell: self.clone() });
        }

        true
    }

    /// Takes the value out of a completed task.
    fn take(state: &mut CellState<T>) -> Result<T, TaskError> {
        match std::mem::replace(&mut state.outcome, Outcome::Taken) {
            Outcome::Value(value) => Ok(value),
            Outcome::Taken => Err(ResultError::Taken.into()),
            Outcome::Faulted(err) => {
                state.outcome = Outcome::Faulted(err.clone());
                Err(TaskError::Faulted(err))
            }
            Outcome::Canceled => {
                state.outcome = Outcome::Canceled;
                Err(TaskError::Canceled)
            }
            Outcome::Pending => {
                state.outcome = Outcome::Pending;
                Err(ResultError::NotCompleted.into())
            }
        }
    }

    /// Reads a copy of the value, leaving the outcome in place.
    fn read(state: &CellState<T>) -> Result<T, TaskError>
    where
        T: Clone,
    {
        match &state.outcome {
            Outcome::Value(value) => Ok(value.clone()),
            Outcome::Taken => Err(ResultError::Taken.into()),
            Outcome::Faulted(err) => Err(TaskError::Faulted(err.clone())),
            Outcome::Canceled => Err(TaskError::Canceled),
            Outcome::Pending => Err(ResultError::NotCompleted.into()),
        }
    }
}

/// A shared handle to an asynchronous operation's eventual outcome.
///
/// Cloning a `Task` yields another handle to the same operation. Awaiting
/// a task resolves with a copy of its value once it completes, so any
/// number of holders can await it and each sees the same outcome. Only
/// [`try_take_result`](Self::try_take_result) moves the value out; readers
/// after that observe [`ResultError::Taken`].
///
/// Dropping every `Task` does **not** cancel the operation.
pub struct Task<T> {
    pub(crate) cell: Arc<TaskCell<T>>,
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T: Send + 'static> Task<T> {
    /// A task that already ran to completion with `value`.
    pub fn from_result(value: T) -> Self {
        let source = TaskSource::new();
        let task = source.task();
        source.set_result(value);
        task
    }

    /// A task that already faulted with `error`.
    pub fn from_error(error: impl Into<BoxError>) -> Self {
        let source = TaskSource::new();
        let task = source.task();
        source.set_error(error);
        task
    }

    /// A task that was already canceled.
    pub fn canceled() -> Self {
        let source = TaskSource::new();
        let task = source.task();
        source.set_canceled();
        task
    }

    /// Identifier of the task.
    pub fn id(&self) -> TaskId {
        self.cell.id
    }

    /// Current status.
    pub fn status(&self) -> TaskStatus {
        lock(&self.cell.state).status
    }

    /// Returns `true` once the task ran to completion, faulted, or was
    /// canceled.
    pub fn is_completed(&self) -> bool {
        self.status().is_completed()
    }

    /// Returns `true` if the task completed with a value.
    pub fn is_completed_successfully(&self) -> bool {
        self.status() == TaskStatus::RanToCompletion
    }

    /// Returns `true` if the task was canceled.
    pub fn is_canceled(&self) -> bool {
        self.status() == TaskStatus::Canceled
    }

    /// Returns `true` if the task faulted.
    pub fn is_faulted(&self) -> bool {
        self.status() == TaskStatus::Faulted
    }

    /// The error a faulted task ended with.
    pub fn fault(&self) -> Option<SharedError> {
        match &lock(&self.cell.state).outcome {
            Outcome::Faulted(err) => Some(err.clone()),
            _ => None,
        }
    }

    /// Reads a copy of the value without waiting.
    ///
    /// Unlike [`try_take_result`](Self::try_take_result) the value stays
    /// in the task for every other holder.
    ///
    /// # Errors
    ///
    /// - [`ResultError::NotCompleted`] while the task is pending,
    /// - [`ResultError::Taken`] if a consumer moved the value out,
    /// - [`TaskError::Faulted`] or [`TaskError::Canceled`] for tasks that
    ///   did not run to completion.
    pub fn result(&self) -> Result<T, TaskError>
    where
        T: Clone,
    {
        TaskCell::read(&lock(&self.cell.state))
    }

    /// Takes the value without waiting.
    ///
    /// Fails with [`ResultError::NotCompleted`] while the task is pending
    /// and with [`ResultError::Taken`] if another consumer took the value.
    pub fn try_take_result(&self) -> Result<T, TaskError> {
        let mut state = lock(&self.cell.state);
        TaskCell::take(&mut *state)
    }

    /// Registers `continuation` to run once the task completes.
    ///
    /// The continuation runs on the thread that completes the task, or
    /// immediately on the calling thread if the task already completed.
    pub fn continue_with<F>(&self, continuation: F)
    where
        F: FnOnce(Task<T>) + Send + 'static,
    {
        {
            let mut state = lock(&self.cell.state);
            if !state.status.is_completed() {
                state.continuations.push(Box::new(continuation));
                return;
            }
        }

        continuation(self.clone());
    }

    /// Creates a non-owning reference to the task.
    pub fn downgrade(&self) -> WeakTask<T> {
        WeakTask {
            cell: Arc::downgrade(&self.cell),
        }
    }
}

impl<T: Clone + Send + 'static> Future for Task<T> {
    type Output = Result<T, TaskError>;

    /// Resolves with a copy of the task's value once it completes.
    ///
    /// The waker is registered under the same lock that completion
    /// takes, so a wake-up cannot be missed.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = lock(&self.cell.state);

        if state.status.is_completed() {
            return Poll::Ready(TaskCell::read(&state));
        }

        if !state.waiters.iter().any(|w| w.will_wake(cx.waker())) {
            state.waiters.push(cx.waker().clone());
        }

        Poll::Pending
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = lock(&self.cell.state).status;
        f.debug_struct("Task")
            .field("id", &self.cell.id)
            .field("status", &status)
            .finish()
    }
}

/// A non-owning reference to a [`Task`].
///
/// Holding a `WeakTask` does not keep the task's value alive.
pub struct WeakTask<T> {
    cell: Weak<TaskCell<T>>,
}

impl<T> Clone for WeakTask<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T: Send + 'static> WeakTask<T> {
    /// Recovers the task if it is still alive.
    pub fn upgrade(&self) -> Option<Task<T>> {
        self.cell.upgrade().map(|cell| Task { cell })
    }

    /// Status of the task, or `None` once it was reclaimed.
    pub fn status(&self) -> Option<TaskStatus> {
        self.upgrade().map(|task| task.status())
    }
}

/// The completing side of a [`Task`].
///
/// Dropping a source without completing its task faults the task with
/// [`SourceDropped`].
pub struct TaskSource<T: Send + 'static> {
    cell: Arc<TaskCell<T>>,
}

impl<T: Send + 'static> TaskSource<T> {
    /// Creates a source whose task waits for activation.
    pub fn new() -> Self {
        Self {
            cell: TaskCell::new(TaskStatus::WaitingForActivation),
        }
    }

    /// Creates a source for a task that is queued on a drive pool.
    pub(crate) fn queued() -> Self {
        Self {
            cell: TaskCell::new(TaskStatus::WaitingToRun),
        }
    }

    /// Returns the task completed by this source.
    pub fn task(&self) -> Task<T> {
        Task {
            cell: self.cell.clone(),
        }
    }

    /// Marks the task as being driven.
    pub fn set_running(&self) {
        self.cell.set_running();
    }

    /// Completes the task with `value`.
    pub fn set_result(self, value: T) -> bool {
        self.cell.complete(Outcome::Value(value))
    }

    /// Completes the task with `error`.
    ///
    /// An error carrying a [`Cancelled`](crate::Cancelled) marker in its
    /// source chain cancels the task instead of faulting it.
    pub fn set_error(self, error: impl Into<BoxError>) -> bool {
        let error = error.into();

        if is_cancellation(&*error) {
            self.cell.complete(Outcome::Canceled)
        } else {
            self.cell.complete(Outcome::Faulted(Arc::from(error)))
        }
    }

    /// Completes the task as canceled.
    pub fn set_canceled(self) -> bool {
        self.cell.complete(Outcome::Canceled)
    }
}

impl<T: Send + 'static> Default for TaskSource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Drop for TaskSource<T> {
    fn drop(&mut self) {
        let pending = !lock(&self.cell.state).status.is_completed();
        if pending {
            self.cell
                .complete(Outcome::Faulted(Arc::new(SourceDropped)));
        }
    }
}
