//! Error records stored in a job's error buffer.

use crate::error::{SharedError, innermost};
use crate::task::TaskId;

use std::error::Error as StdError;
use std::fmt;

/// Error identifier used for every fault captured from a wrapped operation.
pub const AWAITABLE_JOB_ERROR: &str = "AwaitableJobError";

/// Coarse classification of an error record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// No more specific category applies.
    NotSpecified,
    /// The operation was stopped before it could finish.
    OperationStopped,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotSpecified => "NotSpecified",
            Self::OperationStopped => "OperationStopped",
        };
        f.write_str(name)
    }
}

/// The object an error record refers to.
///
/// Awaitables are consumed when driven, so the target keeps a description
/// of the operand rather than the operand itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorTarget {
    type_name: &'static str,
    task: Option<TaskId>,
}

impl ErrorTarget {
    /// A driven awaitable of the given type.
    pub(crate) fn awaitable(type_name: &'static str) -> Self {
        Self {
            type_name,
            task: None,
        }
    }

    /// A host task.
    pub(crate) fn task(type_name: &'static str, id: TaskId) -> Self {
        Self {
            type_name,
            task: Some(id),
        }
    }

    /// Type name of the target.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Identifier of the target task, if the target is a task.
    pub fn task_id(&self) -> Option<TaskId> {
        self.task
    }
}

/// One fault captured from a wrapped operation.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    error: SharedError,
    error_id: &'static str,
    category: ErrorCategory,
    target: Option<ErrorTarget>,
}

impl ErrorRecord {
    pub(crate) fn new(
        error: SharedError,
        error_id: &'static str,
        category: ErrorCategory,
        target: Option<ErrorTarget>,
    ) -> Self {
        Self {
            error,
            error_id,
            category,
            target,
        }
    }

    /// The innermost cause of the fault.
    pub fn exception(&self) -> &(dyn StdError + 'static) {
        innermost(&*self.error)
    }

    /// The fault exactly as the operation reported it.
    pub fn error(&self) -> &SharedError {
        &self.error
    }

    /// Fixed identifier of the diagnostic, e.g. [`AWAITABLE_JOB_ERROR`].
    pub fn error_id(&self) -> &'static str {
        self.error_id
    }

    /// Category of the record.
    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// What the error refers to.
    pub fn target(&self) -> Option<&ErrorTarget> {
        self.target.as_ref()
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.error_id, self.category, self.exception())
    }
}
