use super::awaiter::AwaiterJob;
use super::state::{Finished, JobState, Listener, ListenerId, StateCell};
use super::{AggregateOptions, BackgroundJob, JobId, default_name};
use crate::error::Error;
use crate::utils::lock;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

/// Status text of an aggregate whose children are still in flight.
const PROCESSING: &str = "Processing";

/// A job combining several [`AwaiterJob`]s.
///
/// The aggregate stays `Running` while any child is unfinished. Once the
/// last child finishes it finishes exactly once, in the state derived
/// from all children:
///
/// 1. `Failed` if any child failed,
/// 2. otherwise `Stopped` if any child was stopped,
/// 3. otherwise `Completed`.
///
/// Stopping an aggregate only marks it `Stopping`; it does not stop the
/// children. Use [`children`](Self::children) to stop them.
///
/// # Examples
///
/// ```rust,ignore
/// let parent = AggregateJob::start(vec![first, second], AggregateOptions::new())?;
/// let state = parent.finished().await;
/// ```
#[derive(Clone)]
pub struct AggregateJob {
    shared: Arc<Shared>,
}

struct Shared {
    id: JobId,
    name: String,
    command: String,

    /// Fixed at construction.
    children: Vec<AwaiterJob>,

    state: Arc<StateCell>,

    /// Unfinished children and the listener registered on each.
    unfinished: Mutex<HashMap<JobId, ListenerId>>,
}

impl AggregateJob {
    /// Starts an aggregate over `children`.
    ///
    /// Children that already finished are accounted for immediately; if
    /// every child already finished, the aggregate is returned finished.
    ///
    /// # Errors
    ///
    /// [`Error::NoChildJobs`] if `children` is empty.
    pub fn start(children: Vec<AwaiterJob>, options: AggregateOptions) -> Result<Self, Error> {
        if children.is_empty() {
            return Err(Error::NoChildJobs);
        }

        Ok(Self::with_children(children, options))
    }

    /// Starts an aggregate over a single child.
    pub fn start_one(child: AwaiterJob, options: AggregateOptions) -> Self {
        Self::with_children(vec![child], options)
    }

    fn with_children(children: Vec<AwaiterJob>, options: AggregateOptions) -> Self {
        let id = JobId::next();
        let shared = Arc::new(Shared {
            id,
            name: options.name.unwrap_or_else(|| default_name(id)),
            command: options.command,
            children,
            state: Arc::new(StateCell::new(JobState::Running)),
            unfinished: Mutex::new(HashMap::new()),
        });

        // Listeners of children finishing meanwhile block on this lock
        // until every child is registered.
        let (empty, unfinished_count) = {
            let mut unfinished = lock(&shared.unfinished);

            for child in &shared.children {
                let listener = on_child_change(Arc::downgrade(&shared), child.id());
                let (listener, state) = child.subscribe_with_state(listener);

                if state.is_finished() {
                    child.unsubscribe(listener);
                } else {
                    unfinished.insert(child.id(), listener);
                }
            }

            (unfinished.is_empty(), unfinished.len())
        };

        tracing::debug!(
            job = %id,
            children = shared.children.len(),
            unfinished = unfinished_count,
            "aggregate job started"
        );

        if empty {
            shared.settle();
        }

        Self { shared }
    }

    /// The child jobs, in the order they were given.
    pub fn children(&self) -> &[AwaiterJob] {
        &self.shared.children
    }

    /// Number of children that have not finished yet.
    pub fn unfinished_count(&self) -> usize {
        lock(&self.shared.unfinished).len()
    }

    /// Resolves with the finished state.
    pub fn finished(&self) -> Finished {
        Finished::new(self.shared.state.clone())
    }
}

/// Builds the listener registered on the child `child`.
///
/// The listener holds the aggregate weakly, so children do not keep a
/// dropped aggregate alive.
fn on_child_change(parent: Weak<Shared>, child: JobId) -> Listener {
    Box::new(move |change| {
        if !change.current.is_finished() {
            return;
        }

        if let Some(parent) = parent.upgrade() {
            parent.child_finished(child);
        }
    })
}

impl Shared {
    /// Accounts for a finished child.
    fn child_finished(&self, child: JobId) {
        let (listener, empty) = {
            let mut unfinished = lock(&self.unfinished);
            let Some(listener) = unfinished.remove(&child) else {
                return;
            };
            (listener, unfinished.is_empty())
        };

        if let Some(job) = self.children.iter().find(|job| job.id() == child) {
            job.unsubscribe(listener);
        }

        tracing::trace!(job = %self.id, child = %child, "aggregate child finished");

        if empty {
            self.settle();
        }
    }

    /// Moves the aggregate to the state derived from its children.
    ///
    /// Called once, by whoever observed the registry becoming empty.
    fn settle(&self) {
        let derived = self.derive();

        if let Some(change) = self.state.transition_with(|_| Some(derived)) {
            tracing::debug!(job = %self.id, state = %change.current, "aggregate job finished");
        }
    }

    fn derive(&self) -> JobState {
        let states: Vec<JobState> = self.children.iter().map(|child| child.state()).collect();

        if states.contains(&JobState::Failed) {
            JobState::Failed
        } else if states.contains(&JobState::Stopped) {
            JobState::Stopped
        } else {
            JobState::Completed
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let unfinished = std::mem::take(
            self.unfinished
                .get_mut()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        );

        for (child, listener) in unfinished {
            if let Some(job) = self.children.iter().find(|job| job.id() == child) {
                job.unsubscribe(listener);
            }
        }
    }
}

impl BackgroundJob for AggregateJob {
    fn id(&self) -> JobId {
        self.shared.id
    }

    fn name(&self) -> &str {
        &self.shared.name
    }

    fn command(&self) -> &str {
        &self.shared.command
    }

    fn job_type(&self) -> &str {
        "AggregateJob"
    }

    fn state(&self) -> JobState {
        self.shared.state.get()
    }

    /// `Processing` until the aggregate finishes, then the name of the
    /// finished state.
    fn status_message(&self) -> String {
        let state = self.shared.state.get();
        if state.is_finished() {
            state.to_string()
        } else {
            String::from(PROCESSING)
        }
    }

    /// Distinct child locations, compared case-insensitively, joined with
    /// `", "`.
    fn location(&self) -> String {
        let mut seen: Vec<String> = Vec::new();
        let mut locations: Vec<String> = Vec::new();

        for child in &self.shared.children {
            let location = child.location();
            let key = location.to_lowercase();
            if !seen.contains(&key) {
                seen.push(key);
                locations.push(location);
            }
        }

        locations.join(", ")
    }

    fn has_more_data(&self) -> bool {
        self.shared.children.iter().any(BackgroundJob::has_more_data)
    }

    /// Marks the aggregate `Stopping`. Children are left alone.
    fn stop(&self) {
        if self
            .shared
            .state
            .transition_if(JobState::Running, JobState::Stopping)
            .is_some()
        {
            tracing::debug!(job = %self.shared.id, "aggregate job stopping");
        }
    }

    fn subscribe(&self, listener: Listener) -> ListenerId {
        self.shared.state.subscribe(listener).0
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.shared.state.unsubscribe(id)
    }

    fn wait(&self) -> JobState {
        self.shared.state.wait()
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        self.shared.state.wait_timeout(timeout)
    }
}

impl fmt::Debug for AggregateJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateJob")
            .field("id", &self.shared.id)
            .field("name", &self.shared.name)
            .field("state", &self.shared.state.get())
            .field("children", &self.shared.children.len())
            .field("unfinished", &self.unfinished_count())
            .finish()
    }
}
