use super::Handle;
use super::context::enter_context;

/// A worker thread of a drive pool.
///
/// Workers share a single run queue: each one pops the next ready task,
/// polls it, and blocks on the queue when there is nothing to do.
pub(crate) struct Worker {
    /// Index of the worker inside its pool.
    id: usize,

    /// Handle of the owning pool, installed as the thread's context.
    handle: Handle,
}

impl Worker {
    pub(crate) fn new(id: usize, handle: Handle) -> Self {
        Self { id, handle }
    }

    /// Runs the worker loop until the pool shuts down.
    pub(crate) fn run(self) {
        tracing::trace!(worker = self.id, "drive pool worker started");

        let queue = self.handle.queue().clone();
        enter_context(self.handle, || {
            while let Some(task) = queue.next() {
                task.run();
            }
        });

        tracing::trace!(worker = self.id, "drive pool worker stopped");
    }
}
