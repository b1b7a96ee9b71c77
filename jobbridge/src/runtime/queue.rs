use super::runnable::RunnableTask;
use crate::utils::{Slab, lock};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, Weak};

/// The shared run queue of a drive pool.
///
/// Spawned and woken tasks are pushed here; idle workers block on the
/// condition variable until a task arrives or the pool shuts down.
pub(crate) struct RunQueue {
    /// Tasks ready to be polled, in FIFO order.
    tasks: Mutex<VecDeque<Arc<RunnableTask>>>,

    /// Signalled on push and on shutdown.
    available: Condvar,

    /// Set once the owning runtime is dropped.
    shutdown: AtomicBool,

    /// Every task spawned on the pool and not yet dropped, queued or
    /// parked on a waker.
    live: Mutex<Slab<Weak<RunnableTask>>>,
}

impl RunQueue {
    pub(crate) fn new() -> Self {
        Self {
            tasks: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            shutdown: AtomicBool::new(false),
            live: Mutex::new(Slab::new()),
        }
    }

    /// Registers a new task and returns its key in the live registry.
    pub(crate) fn register(&self, task: Weak<RunnableTask>) -> usize {
        lock(&self.live).insert(task)
    }

    /// Removes a dropped task from the live registry.
    pub(crate) fn unregister(&self, key: usize) {
        lock(&self.live).remove(key);
    }

    /// Pushes a task and wakes one idle worker.
    ///
    /// Tasks pushed after shutdown are dropped.
    pub(crate) fn push(&self, task: Arc<RunnableTask>) {
        {
            let mut tasks = lock(&self.tasks);
            if !self.is_shutdown() {
                tasks.push_back(task);
                drop(tasks);
                self.available.notify_one();
                return;
            }
        }

        tracing::trace!("drive pool is shut down; dropping task");
        task.release();
    }

    /// Blocks until a task is available.
    ///
    /// Returns `None` once the queue is shut down.
    pub(crate) fn next(&self) -> Option<Arc<RunnableTask>> {
        let mut tasks = lock(&self.tasks);

        loop {
            if self.is_shutdown() {
                return None;
            }

            if let Some(task) = tasks.pop_front() {
                return Some(task);
            }

            tasks = self
                .available
                .wait(tasks)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// Stops the queue and wakes every worker.
    ///
    /// Queued tasks are dropped outside the lock, since dropping a task
    /// may drop futures that touch other locks.
    pub(crate) fn shutdown(&self) {
        let pending = {
            let mut tasks = lock(&self.tasks);
            self.shutdown.store(true, Ordering::Release);
            std::mem::take(&mut *tasks)
        };

        self.available.notify_all();
        for task in pending {
            task.release();
        }
    }

    /// Drops the future of every task still alive.
    ///
    /// Run once the workers are joined. Tasks parked on a waker would
    /// otherwise keep their futures until somebody wakes them, which may
    /// be never. A task being polled right now is skipped.
    ///
    /// Futures are dropped outside the registry lock: dropping one
    /// unregisters tasks and may spawn new ones.
    pub(crate) fn release_live(&self) {
        let live: Vec<Arc<RunnableTask>> = lock(&self.live)
            .iter()
            .filter_map(|(_, task)| task.upgrade())
            .collect();

        if !live.is_empty() {
            tracing::debug!(tasks = live.len(), "releasing futures left on the drive pool");
        }

        for task in live {
            task.release();
        }
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}
