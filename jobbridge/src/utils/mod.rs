//! Internal helpers shared by the runtime and the job layer.
//!
//! - [`Slab`]: keyed storage with slot reuse, used for listener registries,
//! - [`lock`]: poison-tolerant mutex locking,
//! - [`CatchUnwind`]: turns panics of driven futures into errors,
//! - [`machine_name`]: the default job location.

mod host;
mod panic;
mod slab;
mod sync;

pub(crate) use host::machine_name;
pub(crate) use panic::{CatchUnwind, payload_message};
pub(crate) use slab::Slab;
pub(crate) use sync::lock;
