use super::Runtime;

use std::thread;

/// Builder for configuring and creating a drive pool.
///
/// # Examples
///
/// ```rust,ignore
/// let runtime = RuntimeBuilder::new()
///     .worker_threads(2)
///     .thread_name("jobs")
///     .build();
/// ```
pub struct RuntimeBuilder {
    /// Number of worker threads polling jobs.
    worker_threads: usize,

    /// Prefix of the worker thread names; the worker index is appended.
    thread_name: String,
}

impl RuntimeBuilder {
    /// Creates a builder with default configuration.
    ///
    /// By default the pool gets one worker per available logical CPU,
    /// falling back to `1` if that count is unavailable.
    pub fn new() -> Self {
        let worker_threads = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            worker_threads,
            thread_name: String::from("jobbridge-worker"),
        }
    }

    /// Sets the number of worker threads.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn worker_threads(mut self, n: usize) -> Self {
        assert!(n > 0, "worker_threads must be > 0");

        self.worker_threads = n;
        self
    }

    /// Sets the name prefix of the worker threads.
    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name = prefix.into();
        self
    }

    /// Builds the pool and starts its workers.
    ///
    /// # Panics
    ///
    /// Panics if the operating system refuses to spawn a worker thread.
    pub fn build(self) -> Runtime {
        Runtime::new(self.worker_threads, &self.thread_name)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
