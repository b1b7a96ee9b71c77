mod common;

use jobbridge::awaitable::{from_future, from_infallible, run_as_task, subscribe};
use jobbridge::{
    BoxError, CancellationSource, Handle, Panicked, ResultError, RuntimeBuilder, SourceDropped,
    Task, TaskError, TaskSource, TaskStatus,
};

use std::sync::mpsc;
use std::time::Duration;

#[test]
fn block_on_returns_the_output() {
    let runtime = RuntimeBuilder::new().worker_threads(2).build();

    assert_eq!(runtime.block_on(async { 40 + 2 }), 42);
}

#[test]
#[should_panic(expected = "worker_threads must be > 0")]
fn zero_workers_is_rejected() {
    let _ = RuntimeBuilder::new().worker_threads(0);
}

#[test]
fn workers_carry_their_pool_as_current() {
    let runtime = common::serial_runtime();

    assert!(Handle::try_current().is_none());
    assert!(runtime.block_on(async { Handle::try_current().is_some() }));
}

#[jobbridge::test]
async fn spawned_task_is_readable_by_every_holder_until_taken() {
    let task = jobbridge::spawn(async { Ok::<_, BoxError>(String::from("value")) });
    let other = task.clone();

    assert_eq!(task.await.unwrap(), "value");
    assert_eq!(other.status(), TaskStatus::RanToCompletion);
    assert_eq!(other.result().unwrap(), "value");

    assert_eq!(other.try_take_result().unwrap(), "value");
    assert!(matches!(
        other.await,
        Err(TaskError::Result(ResultError::Taken))
    ));
}

#[jobbridge::test]
async fn panicking_future_faults_and_the_pool_survives() {
    let task: Task<()> = jobbridge::spawn(async {
        if true {
            panic!("worker must survive");
        }
        Ok::<_, BoxError>(())
    });

    match task.clone().await {
        Err(TaskError::Faulted(fault)) => {
            let panicked = fault.downcast_ref::<Panicked>().unwrap();
            assert_eq!(panicked.message, "worker must survive");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(task.is_faulted());

    let after = jobbridge::spawn(async { Ok::<_, BoxError>(1) });
    assert_eq!(after.await.unwrap(), 1);
}

#[jobbridge::test]
async fn cancellation_token_cancels_the_task() {
    let source = CancellationSource::new();
    let task = jobbridge::spawn_cancellable(source.token(), async {
        std::future::pending::<()>().await;
        Ok::<_, BoxError>(())
    });

    source.cancel();

    assert!(matches!(task.clone().await, Err(TaskError::Canceled)));
    assert!(task.is_canceled());
}

#[jobbridge::test]
async fn dropped_source_faults_the_task() {
    let source = TaskSource::<u8>::new();
    let task = source.task();
    drop(source);

    match task.await {
        Err(TaskError::Faulted(fault)) => assert!(fault.is::<SourceDropped>()),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[jobbridge::test]
async fn awaitables_run_as_tasks() {
    let task = run_as_task(from_infallible(async { 'x' }));
    assert_eq!(task.await.unwrap(), 'x');

    let failing = run_as_task(from_future(async { Err::<(), _>(common::outer("nope")) }));
    assert!(matches!(failing.await, Err(TaskError::Faulted(_))));
}

#[test]
fn subscribe_delivers_the_result() {
    let runtime = common::serial_runtime();
    let (sender, receiver) = mpsc::channel();

    runtime.block_on(async move {
        subscribe(from_infallible(async { 7_u8 }), move |result| {
            let _ = sender.send(result.ok());
        });
    });

    assert_eq!(receiver.recv_timeout(Duration::from_secs(5)), Ok(Some(7)));
}

#[test]
fn continuations_run_once_on_completion() {
    let source = TaskSource::<u8>::new();
    let task = source.task();
    let (sender, receiver) = mpsc::channel();

    task.continue_with(move |task| {
        let _ = sender.send(task.status());
    });
    assert!(receiver.try_recv().is_err());

    source.set_result(3);
    assert_eq!(receiver.try_recv(), Ok(TaskStatus::RanToCompletion));
    assert!(receiver.try_recv().is_err());
}

#[test]
fn dropping_the_runtime_discards_queued_work() {
    let runtime = common::serial_runtime();
    let handle = runtime.handle().clone();
    drop(runtime);

    assert!(handle.is_shutdown());

    let task = handle.spawn(async { Ok::<_, BoxError>(()) });
    assert!(task.is_faulted());
    assert!(task.fault().unwrap().is::<SourceDropped>());
}

#[test]
fn innermost_walks_to_the_root_cause() {
    let error = common::outer("root cause");

    assert_eq!(jobbridge::innermost(&error).to_string(), "root cause");
    assert!(jobbridge::innermost(&error).is::<std::io::Error>());
}
