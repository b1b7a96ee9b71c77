use super::{Awaitable, wait_for};
use crate::error::BoxError;
use crate::job::{AwaiterJob, StartOptions};
use crate::task::{Task, ValueTask};
use crate::value::Value;

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// What the drive of an erased awaitable produces: the boxed result, or
/// `None` for operations without one.
pub(crate) type DriveOutcome = Result<Option<Value>, BoxError>;

type DriveFuture = Pin<Box<dyn Future<Output = DriveOutcome> + Send>>;

/// The type an awaitable produces, when it produces one.
#[derive(Clone, Copy)]
pub struct ResultType {
    id: TypeId,
    name: &'static str,
}

impl ResultType {
    /// Describes `T`, or returns `None` when `T` is `()`.
    pub fn of<T: Any>() -> Option<Self> {
        if TypeId::of::<T>() == TypeId::of::<()>() {
            return None;
        }

        Some(Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        })
    }

    /// Name of the type.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if this describes `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for ResultType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ResultType {}

impl fmt::Debug for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// How an [`Operand`] can be waited on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// The value cannot be waited on.
    NotAwaitable,
    /// The value can be waited on and produces no result.
    Awaitable,
    /// The value can be waited on and produces a result of the given type.
    AwaitableOf(ResultType),
}

/// An arbitrary value offered to the job layer.
///
/// An operand is one of:
/// - a host [`Task`],
/// - a [`ValueTask`], converted to a task before it is waited on,
/// - any [`Awaitable`],
/// - an opaque value with no awaitable capability.
///
/// # Examples
///
/// ```rust,ignore
/// let operand = Operand::from(spawn(async { Ok::<_, BoxError>(3) }));
/// assert!(is_awaitable(Some(&operand)));
///
/// assert_eq!(classify(Some(&Operand::opaque(3))), Shape::NotAwaitable);
/// ```
pub struct Operand {
    kind: OperandKind,
}

pub(crate) enum OperandKind {
    Task(Box<dyn ErasedTask>),
    ValueTask(Box<dyn ErasedValueTask>),
    Awaitable(Box<dyn ErasedAwaitable>),
    Opaque {
        type_name: &'static str,
        value: Box<dyn Any + Send>,
    },
}

impl Operand {
    /// Wraps a host task.
    pub fn task<T: Clone + Send + 'static>(task: Task<T>) -> Self {
        Self {
            kind: OperandKind::Task(Box::new(task)),
        }
    }

    /// Wraps a value task.
    pub fn value_task<T: Clone + Send + 'static>(task: ValueTask<T>) -> Self {
        Self {
            kind: OperandKind::ValueTask(Box::new(task)),
        }
    }

    /// Wraps an awaitable that is driven on the drive pool.
    pub fn awaitable<A: Awaitable>(awaitable: A) -> Self {
        Self {
            kind: OperandKind::Awaitable(Box::new(Driven(awaitable))),
        }
    }

    /// Wraps a value that cannot be waited on.
    pub fn opaque<T: Any + Send>(value: T) -> Self {
        Self {
            kind: OperandKind::Opaque {
                type_name: type_name::<T>(),
                value: Box::new(value),
            },
        }
    }

    /// Name of the wrapped value's type.
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            OperandKind::Task(task) => task.type_name(),
            OperandKind::ValueTask(task) => task.type_name(),
            OperandKind::Awaitable(awaitable) => awaitable.type_name(),
            OperandKind::Opaque { type_name, .. } => *type_name,
        }
    }

    /// Converts a value task into a host task operand.
    ///
    /// Any other operand is returned unchanged.
    pub fn into_task(self) -> Self {
        match self.kind {
            OperandKind::ValueTask(task) => Self {
                kind: OperandKind::Task(task.into_task()),
            },
            kind => Self { kind },
        }
    }

    /// Returns the value of an opaque operand.
    ///
    /// Any awaitable operand is handed back unchanged as the error.
    pub fn into_opaque(self) -> Result<Box<dyn Any + Send>, Self> {
        match self.kind {
            OperandKind::Opaque { value, .. } => Ok(value),
            kind => Err(Self { kind }),
        }
    }

    pub(crate) fn into_kind(self) -> OperandKind {
        self.kind
    }

    fn result_type(&self) -> Option<Option<ResultType>> {
        match &self.kind {
            OperandKind::Task(task) => Some(task.result_type()),
            OperandKind::ValueTask(task) => Some(task.result_type()),
            OperandKind::Awaitable(awaitable) => Some(awaitable.result_type()),
            OperandKind::Opaque { .. } => None,
        }
    }
}

impl<T: Clone + Send + 'static> From<Task<T>> for Operand {
    fn from(task: Task<T>) -> Self {
        Self::task(task)
    }
}

impl<T: Clone + Send + 'static> From<ValueTask<T>> for Operand {
    fn from(task: ValueTask<T>) -> Self {
        Self::value_task(task)
    }
}

impl fmt::Debug for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operand")
            .field("type", &self.type_name())
            .field("shape", &classify(Some(self)))
            .finish()
    }
}

/// Classifies `operand` without waiting on it.
///
/// An absent operand is [`Shape::NotAwaitable`].
pub fn classify(operand: Option<&Operand>) -> Shape {
    match operand.and_then(Operand::result_type) {
        None => Shape::NotAwaitable,
        Some(None) => Shape::Awaitable,
        Some(Some(result)) => Shape::AwaitableOf(result),
    }
}

/// Returns `true` if `operand` can be waited on.
pub fn is_awaitable(operand: Option<&Operand>) -> bool {
    classify(operand) != Shape::NotAwaitable
}

/// Returns the result type of `operand` if it is awaitable and produces a
/// result.
pub fn awaitable_of(operand: Option<&Operand>) -> Option<ResultType> {
    match classify(operand) {
        Shape::AwaitableOf(result) => Some(result),
        Shape::NotAwaitable | Shape::Awaitable => None,
    }
}

/// Returns `true` if `operand` wraps a [`ValueTask`].
pub fn is_value_task(operand: &Operand) -> bool {
    matches!(operand.kind, OperandKind::ValueTask(_))
}

/// A host task with its result type erased.
pub(crate) trait ErasedTask: Send {
    fn type_name(&self) -> &'static str;

    fn result_type(&self) -> Option<ResultType>;

    /// Starts a job observing the task.
    fn start(self: Box<Self>, options: StartOptions) -> AwaiterJob;
}

impl<T: Clone + Send + 'static> ErasedTask for Task<T> {
    fn type_name(&self) -> &'static str {
        type_name::<Task<T>>()
    }

    fn result_type(&self) -> Option<ResultType> {
        ResultType::of::<T>()
    }

    fn start(self: Box<Self>, options: StartOptions) -> AwaiterJob {
        AwaiterJob::start_task(*self, options)
    }
}

/// A value task with its result type erased.
pub(crate) trait ErasedValueTask: Send {
    fn type_name(&self) -> &'static str;

    fn result_type(&self) -> Option<ResultType>;

    fn into_task(self: Box<Self>) -> Box<dyn ErasedTask>;
}

impl<T: Clone + Send + 'static> ErasedValueTask for ValueTask<T> {
    fn type_name(&self) -> &'static str {
        type_name::<ValueTask<T>>()
    }

    fn result_type(&self) -> Option<ResultType> {
        ResultType::of::<T>()
    }

    fn into_task(self: Box<Self>) -> Box<dyn ErasedTask> {
        Box::new((*self).as_task())
    }
}

/// An awaitable with its types erased.
pub(crate) trait ErasedAwaitable: Send {
    fn type_name(&self) -> &'static str;

    fn result_type(&self) -> Option<ResultType>;

    /// Returns the future that waits for the awaitable and boxes its
    /// result.
    fn into_drive(self: Box<Self>) -> DriveFuture;
}

struct Driven<A>(A);

/// Erases the types of `awaitable`.
pub(crate) fn erase<A: Awaitable>(awaitable: A) -> Box<dyn ErasedAwaitable> {
    Box::new(Driven(awaitable))
}

impl<A: Awaitable> ErasedAwaitable for Driven<A> {
    fn type_name(&self) -> &'static str {
        type_name::<A>()
    }

    fn result_type(&self) -> Option<ResultType> {
        ResultType::of::<A::Output>()
    }

    fn into_drive(self: Box<Self>) -> DriveFuture {
        let wait = wait_for(self.0);
        let has_result = ResultType::of::<A::Output>().is_some();

        Box::pin(async move {
            let output = wait.await?;
            Ok::<_, BoxError>(has_result.then(|| Value::new(output)))
        })
    }
}
