use crate::utils::lock;

use std::collections::VecDeque;
use std::sync::Mutex;

/// A FIFO buffer that can be appended to and drained concurrently.
///
/// Jobs keep one buffer per stream (output, errors, verbose and debug
/// notes). Producers append while the job is being driven; consumers
/// drain from any thread. Every operation takes the buffer's own lock,
/// so a [`drain`](Self::drain) never interleaves with a
/// [`push`](Self::push).
///
/// # Examples
///
/// ```rust,ignore
/// let buffer = Buffer::new();
/// buffer.push(1);
/// buffer.push(2);
///
/// assert_eq!(buffer.drain(), vec![1, 2]);
/// assert!(buffer.is_empty());
/// ```
pub(crate) struct Buffer<T> {
    /// Buffered items, oldest at the front.
    items: Mutex<VecDeque<T>>,
}

impl<T> Buffer<T> {
    pub(crate) fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn push(&self, item: T) {
        lock(&self.items).push_back(item);
    }

    /// Removes and returns every buffered item.
    ///
    /// # Returns
    ///
    /// The items in the order they were pushed, oldest first. Empty if
    /// nothing was buffered.
    pub(crate) fn drain(&self) -> Vec<T> {
        lock(&self.items).drain(..).collect()
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.items).len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        lock(&self.items).is_empty()
    }
}

impl<T: Clone> Buffer<T> {
    /// Copies the buffered items without removing them.
    pub(crate) fn snapshot(&self) -> Vec<T> {
        lock(&self.items).iter().cloned().collect()
    }
}
