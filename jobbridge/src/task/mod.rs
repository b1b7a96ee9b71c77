//! The host future type.
//!
//! [`Task<T>`] is the concrete future type the job layer knows about.
//! Unlike an arbitrary awaitable it is a shared completion cell: it can
//! be observed from many places, reports a [`TaskStatus`], runs
//! continuations when it completes, and can be referenced weakly.
//!
//! Tasks are completed through a [`TaskSource`], or produced by
//! [`spawn`](crate::spawn) from a future. [`ValueTask<T>`] is the
//! lightweight wrapper that holds either a ready value or a task and
//! converts into a task on demand.

mod cell;
mod value_task;

pub use cell::{Task, TaskSource, WeakTask};
pub use value_task::ValueTask;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identifier of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// The numeric value of the identifier.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Waiting to be completed by its [`TaskSource`].
    WaitingForActivation,
    /// Spawned and queued, not yet polled.
    WaitingToRun,
    /// Being driven.
    Running,
    /// Completed with a value.
    RanToCompletion,
    /// Completed by cancellation.
    Canceled,
    /// Completed with an error.
    Faulted,
}

impl TaskStatus {
    /// Returns `true` for the three completed statuses.
    pub fn is_completed(self) -> bool {
        matches!(self, Self::RanToCompletion | Self::Canceled | Self::Faulted)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WaitingForActivation => "WaitingForActivation",
            Self::WaitingToRun => "WaitingToRun",
            Self::Running => "Running",
            Self::RanToCompletion => "RanToCompletion",
            Self::Canceled => "Canceled",
            Self::Faulted => "Faulted",
        };
        f.write_str(name)
    }
}
