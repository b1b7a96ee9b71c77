use crate::utils::{Slab, lock};

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::task::{Context, Poll, Waker};
use std::time::Duration;

/// Lifecycle state of a job.
///
/// The state machine is monotonic:
///
/// ```text
/// Running ──► Stopping ──► Stopped
///    │            │
///    │            └──────► Completed | Failed
///    └──────────────────► Stopped | Completed | Failed
/// ```
///
/// Nothing leaves a finished state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    /// The wrapped operation is in flight.
    Running,
    /// A stop was requested and handed to the operation's cancel action.
    Stopping,
    /// The job was stopped.
    Stopped,
    /// The operation completed successfully.
    Completed,
    /// The operation failed.
    Failed,
}

impl JobState {
    /// Returns `true` for `Stopped`, `Completed` and `Failed`.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Stopped | Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Stopped => "Stopped",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One applied state transition, as delivered to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub previous: JobState,
    pub current: JobState,
}

/// Identifies a listener registered with
/// [`BackgroundJob::subscribe`](super::BackgroundJob::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

/// A state change callback.
pub type Listener = Box<dyn Fn(&StateChange) + Send + Sync>;

type SharedListener = Arc<dyn Fn(&StateChange) + Send + Sync>;

struct Inner {
    state: JobState,
    listeners: Slab<SharedListener>,

    /// Wakers of `finished()` futures.
    waiters: Vec<Waker>,
}

/// A change-notifying job state.
///
/// Every transition is a compare-and-set under one mutex. Listeners and
/// wakers are notified after the mutex is released, so a listener may
/// call back into the job.
pub(crate) struct StateCell {
    inner: Mutex<Inner>,

    /// Signalled when the state becomes finished.
    finished: Condvar,
}

impl StateCell {
    pub(crate) fn new(state: JobState) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state,
                listeners: Slab::new(),
                waiters: Vec::new(),
            }),
            finished: Condvar::new(),
        }
    }

    pub(crate) fn get(&self) -> JobState {
        lock(&self.inner).state
    }

    /// Applies the transition chosen by `decide`.
    ///
    /// `decide` runs under the state mutex with the current state and
    /// returns the target state, or `None` to leave the state unchanged.
    /// It is not called once the state is finished. Side effects performed
    /// by `decide` (buffer publication) are therefore visible to anyone
    /// who observes the new state.
    pub(crate) fn transition_with<F>(&self, decide: F) -> Option<StateChange>
    where
        F: FnOnce(JobState) -> Option<JobState>,
    {
        let (change, listeners, waiters) = {
            let mut inner = lock(&self.inner);
            let previous = inner.state;
            if previous.is_finished() {
                return None;
            }

            let current = decide(previous)?;
            if current == previous {
                return None;
            }
            inner.state = current;

            let listeners: Vec<SharedListener> =
                inner.listeners.iter().map(|(_, l)| l.clone()).collect();
            let waiters = if current.is_finished() {
                self.finished.notify_all();
                std::mem::take(&mut inner.waiters)
            } else {
                Vec::new()
            };

            (StateChange { previous, current }, listeners, waiters)
        };

        for waker in waiters {
            waker.wake();
        }
        for listener in listeners {
            listener(&change);
        }

        Some(change)
    }

    /// Moves from `from` to `to`; no-op in any other state.
    pub(crate) fn transition_if(&self, from: JobState, to: JobState) -> Option<StateChange> {
        self.transition_with(|current| (current == from).then_some(to))
    }

    /// Registers `listener` and returns the state at registration time.
    ///
    /// The listener observes every transition applied after that state.
    pub(crate) fn subscribe(&self, listener: Listener) -> (ListenerId, JobState) {
        let mut inner = lock(&self.inner);
        let key = inner.listeners.insert(Arc::from(listener));
        (ListenerId(key), inner.state)
    }

    /// Removes a listener. Returns `false` if it was already removed.
    pub(crate) fn unsubscribe(&self, id: ListenerId) -> bool {
        lock(&self.inner).listeners.remove(id.0).is_some()
    }

    /// Blocks until the state is finished.
    pub(crate) fn wait(&self) -> JobState {
        let inner = lock(&self.inner);
        self.finished
            .wait_while(inner, |inner| !inner.state.is_finished())
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    /// Blocks until the state is finished or `timeout` elapses.
    ///
    /// Returns `true` if the state is finished.
    pub(crate) fn wait_timeout(&self, timeout: Duration) -> bool {
        let inner = lock(&self.inner);
        let (inner, _) = self
            .finished
            .wait_timeout_while(inner, timeout, |inner| !inner.state.is_finished())
            .unwrap_or_else(PoisonError::into_inner);
        inner.state.is_finished()
    }

    /// Polls for a finished state, registering the waker otherwise.
    pub(crate) fn poll_finished(&self, cx: &mut Context<'_>) -> Poll<JobState> {
        let mut inner = lock(&self.inner);
        if inner.state.is_finished() {
            return Poll::Ready(inner.state);
        }

        if !inner.waiters.iter().any(|w| w.will_wake(cx.waker())) {
            inner.waiters.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl fmt::Debug for StateCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("StateCell")
            .field("state", &inner.state)
            .field("listeners", &inner.listeners.len())
            .finish_non_exhaustive()
    }
}

/// Future resolving with a job's finished state.
///
/// Returned by [`AwaiterJob::finished`](super::AwaiterJob::finished) and
/// [`AggregateJob::finished`](super::AggregateJob::finished).
pub struct Finished {
    state: Arc<StateCell>,
}

impl Finished {
    pub(crate) fn new(state: Arc<StateCell>) -> Self {
        Self { state }
    }
}

impl Future for Finished {
    type Output = JobState;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<JobState> {
        self.state.poll_finished(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn finished_state_is_absorbing() {
        let cell = StateCell::new(JobState::Running);

        assert!(cell.transition_if(JobState::Running, JobState::Completed).is_some());
        assert!(cell.transition_with(|_| Some(JobState::Failed)).is_none());
        assert_eq!(cell.get(), JobState::Completed);
    }

    #[test]
    fn listeners_see_each_applied_transition_once() {
        let cell = StateCell::new(JobState::Running);
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = seen.clone();
        let (id, state) = cell.subscribe(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(state, JobState::Running);

        cell.transition_if(JobState::Running, JobState::Stopping);
        cell.transition_if(JobState::Running, JobState::Stopping);
        cell.transition_if(JobState::Stopping, JobState::Stopped);

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert!(cell.unsubscribe(id));
        assert!(!cell.unsubscribe(id));
    }

    #[test]
    fn wait_timeout_reports_unfinished_state() {
        let cell = StateCell::new(JobState::Running);
        assert!(!cell.wait_timeout(Duration::from_millis(10)));

        cell.transition_if(JobState::Running, JobState::Failed);
        assert!(cell.wait_timeout(Duration::from_millis(10)));
        assert_eq!(cell.wait(), JobState::Failed);
    }
}
