use super::Task;

/// A value-type future: either a value that is already available or a
/// [`Task`] still producing one.
///
/// `ValueTask` is not awaitable on its own. Consumers convert it with
/// [`as_task`](Self::as_task), which allocates a completed task only for
/// the ready case.
pub struct ValueTask<T> {
    repr: Repr<T>,
}

enum Repr<T> {
    Ready(T),
    Task(Task<T>),
}

impl<T: Send + 'static> ValueTask<T> {
    /// A value task that already holds `value`.
    pub fn ready(value: T) -> Self {
        Self {
            repr: Repr::Ready(value),
        }
    }

    /// A value task backed by `task`.
    pub fn from_task(task: Task<T>) -> Self {
        Self {
            repr: Repr::Task(task),
        }
    }

    /// Returns `true` if the value is available without waiting.
    pub fn is_completed(&self) -> bool {
        match &self.repr {
            Repr::Ready(_) => true,
            Repr::Task(task) => task.is_completed(),
        }
    }

    /// Converts into a [`Task`].
    pub fn as_task(self) -> Task<T> {
        match self.repr {
            Repr::Ready(value) => Task::from_result(value),
            Repr::Task(task) => task,
        }
    }
}

impl<T: Send + 'static> From<Task<T>> for ValueTask<T> {
    fn from(task: Task<T>) -> Self {
        Self::from_task(task)
    }
}
