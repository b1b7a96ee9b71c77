//! Error types.
//!
//! Two families live here. [`Error`] is returned synchronously when a
//! caller hands the job layer something it cannot work with. The
//! remaining types describe how a *wrapped* operation ended; those are
//! never returned across a job boundary but are captured into the job's
//! error buffer (see [`ErrorRecord`](crate::ErrorRecord)).

use crate::utils::payload_message;

use std::any::Any;
use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// A boxed, thread-safe error as produced by awaited operations.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A shared error, cheap to clone into every reader of a fault.
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// Errors raised synchronously by the job API.
#[derive(Debug, Error)]
pub enum Error {
    /// The operand cannot be turned into a job.
    #[error(transparent)]
    InvalidOperand(#[from] InvalidOperand),

    /// An aggregate job was started without children.
    #[error("an aggregate job requires at least one child job")]
    NoChildJobs,
}

/// Why an operand was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidOperand {
    /// No operand was supplied.
    #[error("no awaitable was provided")]
    Missing,

    /// The operand does not expose the awaitable shape.
    #[error(
        "the provided value of type `{type_name}` is not awaitable; it must produce a waiter \
         with both a completion check and a result operation"
    )]
    NotAwaitable {
        /// Type name of the rejected value.
        type_name: &'static str,
    },
}

/// Signals that an operation observed a cancellation request and gave up.
///
/// Futures driven by the crate may return this (boxed) as their error;
/// a spawned [`Task`](crate::Task) that ends with it is `Canceled` rather
/// than `Faulted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("the operation was cancelled")]
pub struct Cancelled;

/// The [`TaskSource`](crate::TaskSource) of a task was dropped before it
/// completed the task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("the task source was dropped before the task completed")]
pub struct SourceDropped;

/// The drive pool shut down before the operation finished.
///
/// Recorded on a job whose drive future was discarded by a dropped
/// [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("the drive pool shut down before the operation completed")]
pub struct PoolShutdown;

/// A driven future panicked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("the operation panicked: {message}")]
pub struct Panicked {
    /// The panic message, when the payload was a string.
    pub message: String,
}

impl Panicked {
    pub(crate) fn from_payload(payload: &(dyn Any + Send)) -> Self {
        Self {
            message: payload_message(payload),
        }
    }
}

/// Why awaiting a [`Task`](crate::Task) did not produce its value.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// The task ended with an error.
    #[error("the task faulted")]
    Faulted(#[source] SharedError),

    /// The task was canceled.
    #[error("the task was canceled")]
    Canceled,

    /// The task succeeded but another consumer already took its value.
    #[error(transparent)]
    Result(#[from] ResultError),
}

/// Reading the value of a successfully completed task failed.
///
/// This is not a failure of the operation itself: the value existed but
/// can no longer be handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResultError {
    /// The value has already been taken by another consumer.
    #[error("the task result has already been taken")]
    Taken,

    /// The task has not completed successfully.
    #[error("the task has not run to completion")]
    NotCompleted,
}

/// Returns `true` if `error` (or anything in its source chain) is a
/// [`Cancelled`] marker.
pub fn is_cancellation(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        if err.is::<Cancelled>() {
            return true;
        }
        current = err.source();
    }
    false
}

/// Walks the source chain of `error` down to its innermost cause.
pub fn innermost<'a>(error: &'a (dyn StdError + 'static)) -> &'a (dyn StdError + 'static) {
    let mut current = error;
    while let Some(source) = current.source() {
        current = source;
    }
    current
}
