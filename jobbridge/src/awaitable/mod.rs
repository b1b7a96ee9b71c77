//! The awaitable protocol.
//!
//! An operation is *awaitable* when it can produce an [`Awaiter`]: a
//! value with a completion check and a result operation. The two
//! capability traits below spell that shape out; anything implementing
//! [`Awaitable`] can be wrapped into a job, and nothing else can.
//!
//! Besides user implementations the module provides adapters for plain
//! futures ([`from_future`], [`from_infallible`]), and [`Task`]
//! implements both traits directly. [`Operand`] erases all of them into a
//! single runtime value that [`classify`] inspects without running it.

mod adapter;
mod detect;

pub use adapter::{FromFuture, FromInfallible, from_future, from_infallible};
pub use detect::{Operand, ResultType, Shape, awaitable_of, classify, is_awaitable, is_value_task};

pub(crate) use detect::{DriveOutcome, ErasedAwaitable, OperandKind, erase};

use crate::error::{BoxError, Cancelled, TaskError};
use crate::runtime::Handle;
use crate::task::Task;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// The waiting side of an awaitable operation.
///
/// `poll_result` follows the [`Future`] contract: it returns
/// `Poll::Pending` after arranging for the waker in `cx` to be woken, and
/// is not called again once it returned `Poll::Ready`.
pub trait Awaiter: Send + 'static {
    /// The value the operation produces; `()` for operations without a
    /// result.
    type Output: Send + 'static;

    /// Returns `true` once the result can be retrieved without waiting.
    fn is_completed(&self) -> bool;

    /// Retrieves the result, or registers the waker if the operation has
    /// not completed.
    fn poll_result(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Self::Output, BoxError>>;
}

/// An operation that can be waited on.
pub trait Awaitable: Send + 'static {
    /// The value the operation produces.
    type Output: Send + 'static;

    /// The awaiter returned by [`get_awaiter`](Self::get_awaiter).
    type Awaiter: Awaiter<Output = Self::Output>;

    /// Produces the awaiter for this operation.
    fn get_awaiter(self) -> Self::Awaiter;
}

impl<T: Clone + Send + 'static> Awaiter for Task<T> {
    type Output = T;

    fn is_completed(&self) -> bool {
        Task::is_completed(self)
    }

    /// A canceled task surfaces as a [`Cancelled`] error, a faulted one
    /// keeps its fault as the error source.
    fn poll_result(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<T, BoxError>> {
        Future::poll(self, cx).map(|res| {
            res.map_err(|err| match err {
                TaskError::Canceled => BoxError::from(Cancelled),
                other => BoxError::from(other),
            })
        })
    }
}

impl<T: Clone + Send + 'static> Awaitable for Task<T> {
    type Output = T;
    type Awaiter = Task<T>;

    fn get_awaiter(self) -> Self::Awaiter {
        self
    }
}

/// Future that polls an [`Awaiter`] to its result.
pub struct Await<W> {
    awaiter: Pin<Box<W>>,
}

impl<W: Awaiter> Await<W> {
    fn new(awaiter: W) -> Self {
        Self {
            awaiter: Box::pin(awaiter),
        }
    }
}

impl<W: Awaiter> Future for Await<W> {
    type Output = Result<W::Output, BoxError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.awaiter.as_mut().poll_result(cx)
    }
}

/// Returns a future resolving with the result of `awaitable`.
///
/// Nothing runs until the returned future is polled.
pub fn wait_for<A: Awaitable>(awaitable: A) -> Await<A::Awaiter> {
    Await::new(awaitable.get_awaiter())
}

/// Drives `awaitable` on the current drive pool and exposes it as a
/// [`Task`].
///
/// A [`Cancelled`] error cancels the task; any other error faults it.
///
/// # Examples
///
/// ```rust,ignore
/// let task = run_as_task(from_infallible(async { 7 }));
/// assert_eq!(task.await.unwrap(), 7);
/// ```
pub fn run_as_task<A: Awaitable>(awaitable: A) -> Task<A::Output> {
    Handle::current().spawn(wait_for(awaitable))
}

/// Drives `awaitable` on the current drive pool and hands its result to
/// `callback` once it is available.
pub fn subscribe<A, F>(awaitable: A, callback: F)
where
    A: Awaitable,
    F: FnOnce(Result<A::Output, BoxError>) + Send + 'static,
{
    let future = wait_for(awaitable);
    Handle::current().spawn_detached(async move { callback(future.await) });
}
