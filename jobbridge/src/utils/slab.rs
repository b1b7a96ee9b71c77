/// A simple slab of reusable slots.
///
/// A `Slab` stores values of type `T` in a contiguous vector and
/// returns stable keys that can be reused after removal.
///
/// It backs the listener registries of jobs and the live-task registry
/// of a drive pool, where keys must stay valid while other entries come
/// and go, and removal must be cheap.
///
/// Keys are reused: a key must not be used after it was passed to
/// [`remove`](Self::remove).
pub(crate) struct Slab<T> {
    /// Storage for items; `None` marks a free slot.
    items: Vec<Option<T>>,
    /// Stack of free keys that can be reused.
    free: Vec<usize>,
}

impl<T> Slab<T> {
    /// Creates an empty `Slab`.
    ///
    /// No slot is allocated until the first insertion.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let slab = Slab::<i32>::new();
    /// assert_eq!(slab.len(), 0);
    /// ```
    pub(crate) const fn new() -> Self {
        Self {
            items: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Inserts a value into the slab and returns its key.
    ///
    /// If a free slot is available, it is reused. Otherwise, the
    /// slab grows by one slot.
    ///
    /// # Arguments
    ///
    /// * `item` - The value to store.
    ///
    /// # Returns
    ///
    /// The key at which the value was inserted.
    pub(crate) fn insert(&mut self, item: T) -> usize {
        if let Some(key) = self.free.pop() {
            self.items[key] = Some(item);
            return key;
        }

        self.items.push(Some(item));
        self.items.len() - 1
    }

    /// Removes and returns the value stored at `key`.
    ///
    /// # Arguments
    ///
    /// * `key` - A key previously returned by [`insert`](Self::insert).
    ///
    /// # Returns
    ///
    /// The removed value, or `None` if the key is out of range or the
    /// slot is already free, so removing twice is harmless.
    pub(crate) fn remove(&mut self, key: usize) -> Option<T> {
        let item = self.items.get_mut(key)?.take()?;
        self.free.push(key);
        Some(item)
    }

    /// Returns the number of occupied slots.
    pub(crate) fn len(&self) -> usize {
        self.items.len() - self.free.len()
    }

    /// Iterates over occupied slots in key order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(key, slot)| slot.as_ref().map(|item| (key, item)))
    }
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self::new()
    }
}
