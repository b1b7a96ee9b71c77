use super::queue::RunQueue;
use crate::utils::payload_message;

use std::cell::UnsafeCell;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll, Wake, Waker};

/// Task is idle and not scheduled.
const IDLE: usize = 0;

/// Task is queued for execution.
const QUEUED: usize = 1;

/// Task is being polled by a worker. At most one worker observes this
/// state at a time.
const RUNNING: usize = 2;

/// The future returned `Poll::Ready` (or panicked) and has been dropped.
const COMPLETED: usize = 3;

/// Task was woken while running and must be re-queued once the current
/// poll returns.
const NOTIFIED: usize = 4;

pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A spawned future plus the scheduling state that guards it.
pub(crate) struct RunnableTask {
    /// The future being driven, `None` once it finished.
    ///
    /// Only the worker that moved `state` to `RUNNING` touches the cell.
    future: UnsafeCell<Option<BoxFuture>>,

    /// One of `IDLE`, `QUEUED`, `RUNNING`, `COMPLETED`, `NOTIFIED`.
    state: AtomicUsize,

    /// Queue the task goes back to when woken.
    queue: Arc<RunQueue>,

    /// Key in the queue's live registry.
    key: usize,
}

// Safety: the future is only accessed by the worker holding the RUNNING
// state, and the boxed future itself is `Send`.
unsafe impl Send for RunnableTask {}
unsafe impl Sync for RunnableTask {}

impl RunnableTask {
    /// Creates a task in the `QUEUED` state and registers it with
    /// `queue`. The caller pushes it.
    pub(crate) fn new(future: BoxFuture, queue: Arc<RunQueue>) -> Arc<Self> {
        Arc::new_cyclic(|task| {
            let key = queue.register(task.clone());
            Self {
                future: UnsafeCell::new(Some(future)),
                state: AtomicUsize::new(QUEUED),
                queue,
                key,
            }
        })
    }

    /// Drops the future of a task that will not be polled again.
    ///
    /// Only an `IDLE` or `QUEUED` task is claimed. A task some worker is
    /// polling stays with that worker, and a completed one has no future
    /// left.
    pub(crate) fn release(&self) {
        let claimed = [IDLE, QUEUED].into_iter().any(|from| {
            self.state
                .compare_exchange(from, COMPLETED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        });
        if !claimed {
            return;
        }

        // Safety: the task moved to COMPLETED from a state no worker polls
        // in, and `run` never touches the future of a completed task.
        let future = unsafe { (*self.future.get()).take() };
        drop(future);
    }

    /// Polls the future once.
    ///
    /// - `Poll::Pending`: back to `IDLE`, or re-queued if woken meanwhile.
    /// - `Poll::Ready` or a panic: the future is dropped and the task is
    ///   `COMPLETED`.
    pub(crate) fn run(self: Arc<Self>) {
        let current = self.state.load(Ordering::Acquire);
        if current != QUEUED && current != NOTIFIED {
            return;
        }

        if self
            .state
            .compare_exchange(current, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let waker = Waker::from(self.clone());
        let mut cx = Context::from_waker(&waker);

        // Safety: the RUNNING state guarantees no other thread is touching
        // the future.
        let slot = unsafe { &mut *self.future.get() };
        let Some(future) = slot.as_mut() else {
            self.state.store(COMPLETED, Ordering::Release);
            return;
        };

        match catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx))) {
            Ok(Poll::Pending) => {
                if self
                    .state
                    .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
                    .is_err()
                {
                    // Woken while running.
                    self.state.store(QUEUED, Ordering::Release);
                    self.queue.push(self.clone());
                }
            }
            Ok(Poll::Ready(())) => {
                *slot = None;
                self.state.store(COMPLETED, Ordering::Release);
            }
            Err(payload) => {
                tracing::error!(
                    panic = %payload_message(payload.as_ref()),
                    "spawned future panicked"
                );
                *slot = None;
                self.state.store(COMPLETED, Ordering::Release);
            }
        }
    }

    /// Schedules the task for another poll.
    ///
    /// An `IDLE` task is queued; a `RUNNING` task is marked `NOTIFIED`
    /// so the worker re-queues it after the current poll.
    fn schedule(self: Arc<Self>) {
        loop {
            match self.state.load(Ordering::Acquire) {
                IDLE => {
                    if self
                        .state
                        .compare_exchange(IDLE, QUEUED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        let queue = self.queue.clone();
                        queue.push(self);
                        return;
                    }
                }
                RUNNING => {
                    if self
                        .state
                        .compare_exchange(RUNNING, NOTIFIED, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        return;
                    }
                }
                _ => return,
            }
        }
    }
}

impl Drop for RunnableTask {
    fn drop(&mut self) {
        self.queue.unregister(self.key);
    }
}

impl Wake for RunnableTask {
    fn wake(self: Arc<Self>) {
        self.schedule();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.clone().schedule();
    }
}
