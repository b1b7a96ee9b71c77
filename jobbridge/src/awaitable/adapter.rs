use super::{Awaitable, Awaiter};
use crate::error::BoxError;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Adapts a fallible future into an [`Awaitable`].
///
/// Created by [`from_future`].
pub struct FromFuture<F> {
    future: Pin<Box<F>>,
    completed: bool,
}

/// Adapts an infallible future into an [`Awaitable`].
///
/// Created by [`from_infallible`].
pub struct FromInfallible<F> {
    future: Pin<Box<F>>,
    completed: bool,
}

/// Wraps a future whose output `T` is returned as `Ok(T)`.
pub fn from_future<F, T, E>(future: F) -> FromFuture<F>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError>,
{
    FromFuture {
        future: Box::pin(future),
        completed: false,
    }
}

/// Wraps a future that cannot fail.
pub fn from_infallible<F>(future: F) -> FromInfallible<F>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    FromInfallible {
        future: Box::pin(future),
        completed: false,
    }
}

impl<F, T, E> Awaiter for FromFuture<F>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError>,
{
    type Output = T;

    /// A future reveals completion only by being polled, so this turns
    /// `true` once the result has been produced.
    fn is_completed(&self) -> bool {
        self.completed
    }

    fn poll_result(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<T, BoxError>> {
        let res = std::task::ready!(self.future.as_mut().poll(cx));
        self.completed = true;
        Poll::Ready(res.map_err(Into::into))
    }
}

impl<F, T, E> Awaitable for FromFuture<F>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError>,
{
    type Output = T;
    type Awaiter = Self;

    fn get_awaiter(self) -> Self {
        self
    }
}

impl<F> Awaiter for FromInfallible<F>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    type Output = F::Output;

    fn is_completed(&self) -> bool {
        self.completed
    }

    fn poll_result(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<F::Output, BoxError>> {
        let value = std::task::ready!(self.future.as_mut().poll(cx));
        self.completed = true;
        Poll::Ready(Ok(value))
    }
}

impl<F> Awaitable for FromInfallible<F>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    type Output = F::Output;
    type Awaiter = Self;

    fn get_awaiter(self) -> Self {
        self
    }
}
