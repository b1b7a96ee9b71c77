mod common;

use jobbridge::awaitable::from_infallible;
use jobbridge::{
    AggregateJob, AggregateOptions, AwaiterJob, BackgroundJob, Error, JobState, StartOptions,
    TaskSource,
};

use std::sync::{Mutex, mpsc};
use std::thread;
use std::time::Duration;

fn task_child<T: Clone + Send + 'static>(source: &TaskSource<T>) -> AwaiterJob {
    AwaiterJob::start_task(source.task(), StartOptions::new())
}

#[test]
fn empty_child_set_is_rejected() {
    let err = AggregateJob::start(Vec::new(), AggregateOptions::new()).unwrap_err();
    assert!(matches!(err, Error::NoChildJobs));
}

#[jobbridge::test]
async fn completes_when_every_child_completes() {
    common::init_tracing();

    let first = TaskSource::<u8>::new();
    let second = TaskSource::<u8>::new();
    let parent = AggregateJob::start(
        vec![task_child(&first), task_child(&second)],
        AggregateOptions::new().name("pair"),
    )
    .unwrap();

    assert_eq!(parent.name(), "pair");
    assert_eq!(parent.state(), JobState::Running);
    assert_eq!(parent.status_message(), "Processing");
    assert_eq!(parent.unfinished_count(), 2);

    first.set_result(1);
    parent.children()[0].finished().await;
    assert_eq!(parent.state(), JobState::Running);

    second.set_result(2);
    assert_eq!(parent.finished().await, JobState::Completed);
    assert_eq!(parent.unfinished_count(), 0);
    assert_eq!(parent.status_message(), "Completed");
    assert!(parent.has_more_data());
}

#[jobbridge::test]
async fn failure_outranks_stop_and_completion() {
    let ok = TaskSource::<()>::new();
    let stopped = TaskSource::<()>::new();
    let failed = TaskSource::<()>::new();

    let parent = AggregateJob::start(
        vec![task_child(&ok), task_child(&stopped), task_child(&failed)],
        AggregateOptions::new(),
    )
    .unwrap();

    ok.set_result(());
    stopped.set_canceled();
    failed.set_error(common::outer("bad"));

    assert_eq!(parent.finished().await, JobState::Failed);
    assert!(parent.has_more_data());
}

#[jobbridge::test]
async fn stop_outranks_completion() {
    let ok = TaskSource::<()>::new();
    let stopped = TaskSource::<()>::new();

    let parent = AggregateJob::start(
        vec![task_child(&ok), task_child(&stopped)],
        AggregateOptions::new(),
    )
    .unwrap();

    stopped.set_canceled();
    ok.set_result(());

    assert_eq!(parent.finished().await, JobState::Stopped);
}

#[jobbridge::test]
async fn already_finished_children_finish_the_parent_immediately() {
    let first = AwaiterJob::start_awaitable(from_infallible(async { 1 }), StartOptions::new());
    let second = AwaiterJob::start_awaitable(from_infallible(async { 2 }), StartOptions::new());
    first.finished().await;
    second.finished().await;

    let parent = AggregateJob::start(vec![first, second], AggregateOptions::new()).unwrap();

    assert_eq!(parent.state(), JobState::Completed);
}

#[jobbridge::test]
async fn stop_marks_the_parent_only() {
    let source = TaskSource::<()>::new();
    let parent = AggregateJob::start_one(task_child(&source), AggregateOptions::new());

    parent.stop();
    assert_eq!(parent.state(), JobState::Stopping);
    assert_eq!(parent.children()[0].state(), JobState::Running);

    source.set_result(());
    assert_eq!(parent.finished().await, JobState::Completed);
}

#[test]
fn location_is_the_distinct_union_of_child_locations() {
    let sources: Vec<TaskSource<()>> = (0..3).map(|_| TaskSource::new()).collect();
    let children = ["alpha", "ALPHA", "beta"]
        .into_iter()
        .zip(&sources)
        .map(|(location, source)| {
            AwaiterJob::start_task(source.task(), StartOptions::new().location(location))
        })
        .collect();

    let parent = AggregateJob::start(children, AggregateOptions::new()).unwrap();

    assert_eq!(parent.location(), "alpha, beta");
    assert_eq!(parent.job_type(), "AggregateJob");
}

#[test]
fn concurrent_children_finish_the_parent_exactly_once() {
    let runtime = jobbridge::RuntimeBuilder::new().worker_threads(4).build();
    let sources: Vec<TaskSource<usize>> = (0..64).map(|_| TaskSource::new()).collect();
    let children = sources
        .iter()
        .map(|source| {
            AwaiterJob::start_task(
                source.task(),
                StartOptions::new().runtime(runtime.handle().clone()),
            )
        })
        .collect();

    let parent = AggregateJob::start(children, AggregateOptions::new()).unwrap();

    let (finished, finishes) = mpsc::channel();
    let finished = Mutex::new(finished);
    parent.subscribe(Box::new(move |change| {
        if change.current.is_finished() {
            let _ = finished.lock().unwrap().send(change.current);
        }
    }));

    let threads: Vec<_> = sources
        .into_iter()
        .enumerate()
        .map(|(i, source)| thread::spawn(move || source.set_result(i)))
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    assert!(parent.wait_timeout(Duration::from_secs(10)));
    assert_eq!(parent.state(), JobState::Completed);
    assert_eq!(parent.unfinished_count(), 0);
    assert_eq!(
        finishes.recv_timeout(Duration::from_secs(5)),
        Ok(JobState::Completed)
    );
    assert!(finishes.recv_timeout(Duration::from_millis(50)).is_err());
    assert!(parent.children().iter().all(|child| child.output_len() == 1));
}
