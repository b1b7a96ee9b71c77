//! Cooperative cancellation.
//!
//! A job stops the operation it wraps by invoking a [`Cancellation`]
//! action supplied at start. The action can be any callback; the common
//! case adapts a [`CancellationSource`], whose [`CancellationToken`]s are
//! handed to the operation so it can observe the request.

use crate::error::Cancelled;
use crate::utils::lock;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

/// An action that asks a running operation to stop.
///
/// The action must not block: jobs invoke it while holding their
/// cancellation lock.
#[derive(Clone)]
pub struct Cancellation {
    action: Arc<dyn Fn() + Send + Sync>,
}

impl Cancellation {
    /// Wraps a callback.
    pub fn new<F>(action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            action: Arc::new(action),
        }
    }

    /// Invokes the action.
    pub(crate) fn invoke(&self) {
        (self.action)();
    }
}

impl fmt::Debug for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancellation").finish_non_exhaustive()
    }
}

impl From<CancellationSource> for Cancellation {
    /// Adapts `source.cancel()` into a cancellation action.
    fn from(source: CancellationSource) -> Self {
        Self::new(move || source.cancel())
    }
}

impl From<&CancellationSource> for Cancellation {
    fn from(source: &CancellationSource) -> Self {
        source.clone().into()
    }
}

/// Shared cancellation flag plus the wakers of pending waits.
struct Signal {
    cancelled: AtomicBool,
    waiters: Mutex<Vec<Waker>>,
}

/// The owning side of a cancellation signal.
///
/// Cloning yields another owner of the same signal.
#[derive(Clone)]
pub struct CancellationSource {
    signal: Arc<Signal>,
}

impl CancellationSource {
    /// Creates a source that has not been cancelled.
    pub fn new() -> Self {
        Self {
            signal: Arc::new(Signal {
                cancelled: AtomicBool::new(false),
                waiters: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Requests cancellation. Later calls have no effect.
    pub fn cancel(&self) {
        if self.signal.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }

        let waiters = std::mem::take(&mut *lock(&self.signal.waiters));
        for waker in waiters {
            waker.wake();
        }
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.signal.cancelled.load(Ordering::Acquire)
    }

    /// Returns a token observing this source.
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            signal: self.signal.clone(),
        }
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationSource")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// The observing side of a cancellation signal.
#[derive(Clone)]
pub struct CancellationToken {
    signal: Arc<Signal>,
}

impl CancellationToken {
    /// Returns `true` once the source has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.signal.cancelled.load(Ordering::Acquire)
    }

    /// Returns `Err(Cancelled)` once the source has been cancelled.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves once the source has been cancelled.
    pub fn cancelled(&self) -> WaitForCancellation {
        WaitForCancellation {
            signal: self.signal.clone(),
        }
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Future returned by [`CancellationToken::cancelled`].
pub struct WaitForCancellation {
    signal: Arc<Signal>,
}

impl Future for WaitForCancellation {
    type Output = ();

    /// The waker is registered before re-checking the flag so a
    /// concurrent `cancel` cannot be missed.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.signal.cancelled.load(Ordering::Acquire) {
            return Poll::Ready(());
        }

        lock(&self.signal.waiters).push(cx.waker().clone());

        if self.signal.cancelled.load(Ordering::Acquire) {
            return Poll::Ready(());
        }

        Poll::Pending
    }
}
