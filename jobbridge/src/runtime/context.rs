use super::Handle;

use std::cell::RefCell;

thread_local! {
    /// Handle of the pool the current thread works for.
    ///
    /// Set for the whole life of a worker thread, so code running on a
    /// worker spawns onto its own pool without passing handles around.
    static CURRENT: RefCell<Option<Handle>> = const { RefCell::new(None) };
}

/// Enters the context of a drive pool for the current thread.
///
/// This function temporarily installs `handle` as the thread's current
/// pool for the duration of the closure `f`. After the closure
/// completes, the previous context is restored, so nested pools (a
/// `block_on` issued from another pool's worker) unwind correctly.
///
/// # Arguments
///
/// * `handle` - Handle of the pool to install.
/// * `f` - Closure executed inside the pool's context.
///
/// # Returns
///
/// Returns the result of the closure `f`.
pub(crate) fn enter_context<R>(handle: Handle, f: impl FnOnce() -> R) -> R {
    let previous = CURRENT.with(|cell| cell.replace(Some(handle)));
    let out = f();
    CURRENT.with(|cell| cell.replace(previous));
    out
}

/// Returns the pool installed on the current thread, if any.
pub(crate) fn current() -> Option<Handle> {
    CURRENT.with(|cell| cell.borrow().clone())
}
