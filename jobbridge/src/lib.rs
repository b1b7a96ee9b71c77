//! # jobbridge
//!
//! **jobbridge** turns arbitrary asynchronous operations into pollable
//! background *jobs*: handles with a synchronous-style state, buffered
//! output and error channels, and best-effort cancellation.
//!
//! An operation qualifies when it is *awaitable*: it implements the
//! [`Awaitable`] capability trait, or is one of the host future types
//! ([`Task`], [`ValueTask`]). Jobs over many operations are combined with
//! [`AggregateJob`], whose finished state derives from its children under
//! the priority `Failed > Stopped > Completed`.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use jobbridge::{AwaiterJob, CancellationSource, JobState, Operand, StartOptions};
//!
//! #[jobbridge::main]
//! async fn main() {
//!     let source = CancellationSource::new();
//!     let task = jobbridge::spawn_cancellable(source.token(), async {
//!         Ok::<_, jobbridge::BoxError>(String::from("done"))
//!     });
//!
//!     let job = AwaiterJob::start(Operand::from(task), StartOptions::new().cancel_with(&source)).unwrap();
//!     assert_eq!(job.finished().await, JobState::Completed);
//!     println!("{:?}", job.drain_output());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`awaitable`]: the awaitable protocol, adapters and classification
//! - [`task`]: the host future type
//! - [`runtime`]: the drive pool jobs run on

mod cancel;
mod error;
mod job;
mod record;
mod utils;
mod value;

pub mod awaitable;
pub mod runtime;
pub mod task;

pub use awaitable::{Awaitable, Awaiter, Operand, Shape, classify};
pub use cancel::{Cancellation, CancellationSource, CancellationToken, WaitForCancellation};
pub use error::{
    BoxError, Cancelled, Error, InvalidOperand, Panicked, PoolShutdown, ResultError, SharedError,
    SourceDropped, TaskError, innermost, is_cancellation,
};
pub use job::{
    AggregateJob, AggregateOptions, AwaiterJob, BackgroundJob, Finished, JobId, JobState,
    Listener, ListenerId, StartOptions, StateChange,
};
pub use record::{AWAITABLE_JOB_ERROR, ErrorCategory, ErrorRecord, ErrorTarget};
pub use runtime::{Handle, Runtime, RuntimeBuilder, spawn, spawn_cancellable};
pub use task::{Task, TaskId, TaskSource, TaskStatus, ValueTask, WeakTask};
pub use value::Value;

pub use jobbridge_macros::{main, test};
