mod common;

use jobbridge::awaitable::{from_future, from_infallible};
use jobbridge::{
    AWAITABLE_JOB_ERROR, AwaiterJob, BackgroundJob, BoxError, Cancellation, CancellationSource,
    Cancelled, ErrorCategory, JobState, PoolShutdown, StartOptions, StateChange,
};

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const UNSTOPPABLE_NOTE: &str = "Attempted to stop the job but no cancellation action was \
                                provided. The job will be stopped, but the awaitable action \
                                will continue.";

#[jobbridge::test]
async fn result_lands_in_output() {
    common::init_tracing();

    let job = AwaiterJob::start_awaitable(from_infallible(async { 42_i32 }), StartOptions::new());

    assert_eq!(job.finished().await, JobState::Completed);
    assert!(job.has_more_data());
    assert_eq!(job.output_len(), 1);

    let output = job.drain_output();
    assert_eq!(output[0].downcast_ref::<i32>(), Some(&42));
    assert!(!job.has_more_data());
    assert_eq!(job.error_len(), 0);
}

#[jobbridge::test]
async fn unit_awaitable_completes_without_output() {
    let job = AwaiterJob::start_awaitable(from_infallible(async {}), StartOptions::new());

    assert_eq!(job.finished().await, JobState::Completed);
    assert!(!job.has_more_data());
}

#[jobbridge::test]
async fn failure_is_recorded_once() {
    let job = AwaiterJob::start_awaitable(
        from_future(async { Err::<u8, _>(common::outer("disk on fire")) }),
        StartOptions::new(),
    );

    assert_eq!(job.finished().await, JobState::Failed);
    assert!(job.drain_output().is_empty());

    let errors = job.drain_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_id(), AWAITABLE_JOB_ERROR);
    assert_eq!(errors[0].category(), ErrorCategory::NotSpecified);
    assert_eq!(errors[0].exception().to_string(), "disk on fire");
    assert!(errors[0].target().unwrap().task_id().is_none());
}

#[jobbridge::test]
async fn panic_fails_the_job() {
    let job = AwaiterJob::start_awaitable(
        from_infallible(async {
            panic!("boom");
        }),
        StartOptions::new(),
    );

    assert_eq!(job.finished().await, JobState::Failed);

    let errors = job.drain_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].exception().to_string().contains("boom"));
}

#[jobbridge::test]
async fn custom_awaiter_is_driven() {
    let (manual, handle) = common::manual::<&'static str>();
    let job = AwaiterJob::start_awaitable(manual, StartOptions::new());

    assert_eq!(job.state(), JobState::Running);
    handle.complete("ready");

    assert_eq!(job.finished().await, JobState::Completed);
    assert_eq!(job.drain_output()[0].downcast_ref::<&str>(), Some(&"ready"));
}

#[test]
fn job_is_running_before_the_pool_polls_it() {
    common::init_tracing();
    let runtime = common::serial_runtime();

    // Occupy the only worker until the job has been inspected.
    let (release, blocked) = mpsc::channel::<()>();
    runtime.spawn_detached(async move {
        let _ = blocked.recv();
    });

    let job = AwaiterJob::start_awaitable(
        from_infallible(async { 1_u8 }),
        StartOptions::new().runtime(runtime.handle().clone()),
    );
    assert_eq!(job.state(), JobState::Running);
    assert!(!job.wait_timeout(Duration::from_millis(20)));

    release.send(()).unwrap();
    assert!(job.wait_timeout(Duration::from_secs(5)));
    assert_eq!(job.state(), JobState::Completed);
}

#[test]
fn stop_without_cancellation_marks_stopped_and_drops_late_result() {
    let runtime = common::serial_runtime();
    let (manual, handle) = common::manual::<u32>();

    let job = AwaiterJob::start_awaitable(
        manual,
        StartOptions::new().runtime(runtime.handle().clone()),
    );
    assert!(!job.supports_cancellation());

    job.stop();
    assert_eq!(job.state(), JobState::Stopped);
    assert_eq!(job.verbose(), vec![String::from(UNSTOPPABLE_NOTE)]);

    handle.complete(7);
    common::flush(&runtime);

    assert_eq!(job.state(), JobState::Stopped);
    assert_eq!(job.output_len(), 0);
    assert_eq!(job.error_len(), 0);
    assert_eq!(job.drain_verbose().len(), 1);
}

#[test]
fn stop_without_cancellation_leaves_the_operation_running() {
    let runtime = common::serial_runtime();
    let source = CancellationSource::new();
    let token = source.token();
    let (ended, ended_rx) = mpsc::channel();

    let job = AwaiterJob::start_awaitable(
        from_future(async move {
            token.cancelled().await;
            let _ = ended.send(());
            Err::<(), _>(Cancelled)
        }),
        StartOptions::new().runtime(runtime.handle().clone()),
    );
    common::flush(&runtime);

    job.stop();
    common::flush(&runtime);

    assert_eq!(job.state(), JobState::Stopped);
    assert!(!source.is_cancelled());
    assert!(ended_rx.try_recv().is_err());

    // Only the owner of the source ends the operation.
    source.cancel();
    assert!(ended_rx.recv_timeout(Duration::from_secs(5)).is_ok());
    common::flush(&runtime);

    assert_eq!(job.state(), JobState::Stopped);
    assert_eq!(job.error_len(), 0);
}

#[test]
fn dropping_the_pool_fails_a_parked_job() {
    let runtime = common::serial_runtime();
    let (manual, _handle) = common::manual::<u8>();

    let job = AwaiterJob::start_awaitable(
        manual,
        StartOptions::new().runtime(runtime.handle().clone()),
    );
    common::flush(&runtime);
    assert_eq!(job.state(), JobState::Running);

    drop(runtime);

    assert!(job.wait_timeout(Duration::from_secs(5)));
    assert_eq!(job.state(), JobState::Failed);

    let errors = job.drain_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].exception().is::<PoolShutdown>());
    assert_eq!(errors[0].category(), ErrorCategory::OperationStopped);
    assert_eq!(errors[0].error_id(), AWAITABLE_JOB_ERROR);
}

#[test]
fn dropping_the_pool_stops_a_stopping_job() {
    let runtime = common::serial_runtime();
    let (manual, _handle) = common::manual::<u8>();

    let job = AwaiterJob::start_awaitable(
        manual,
        StartOptions::new()
            .cancellation(Cancellation::new(|| {}))
            .runtime(runtime.handle().clone()),
    );
    common::flush(&runtime);

    job.stop();
    assert_eq!(job.state(), JobState::Stopping);

    drop(runtime);

    assert!(job.wait_timeout(Duration::from_secs(5)));
    assert_eq!(job.state(), JobState::Stopped);
    assert_eq!(job.error_len(), 0);
}

#[test]
fn job_on_a_dropped_pool_fails_at_once() {
    let runtime = common::serial_runtime();
    let handle = runtime.handle().clone();
    drop(runtime);

    let job = AwaiterJob::start_awaitable(
        from_infallible(async { 1_u8 }),
        StartOptions::new().runtime(handle),
    );

    assert!(job.wait_timeout(Duration::from_secs(5)));
    assert_eq!(job.state(), JobState::Failed);
    assert_eq!(job.error_len(), 1);
}

#[jobbridge::test]
async fn stop_with_cancellation_ends_stopped() {
    let source = CancellationSource::new();
    let token = source.token();

    let job = AwaiterJob::start_awaitable(
        from_future(async move {
            token.cancelled().await;
            Err::<(), _>(Cancelled)
        }),
        StartOptions::new().cancel_with(&source),
    );
    assert!(job.supports_cancellation());

    job.stop();
    assert!(source.is_cancelled());

    assert_eq!(job.finished().await, JobState::Stopped);
    assert_eq!(job.error_len(), 0);
    assert!(job.verbose().is_empty());
}

#[jobbridge::test]
async fn failure_after_stop_request_is_swallowed() {
    let source = CancellationSource::new();
    let token = source.token();

    let job = AwaiterJob::start_awaitable(
        from_future(async move {
            token.cancelled().await;
            Err::<(), _>(common::outer("connection reset"))
        }),
        StartOptions::new().cancel_with(&source),
    );

    job.stop();

    assert_eq!(job.finished().await, JobState::Stopped);
    assert_eq!(job.error_len(), 0);
}

#[test]
fn stop_invokes_the_action_once() {
    let runtime = common::serial_runtime();
    let (manual, handle) = common::manual::<()>();

    let calls = Arc::new(Mutex::new(0));
    let counter = calls.clone();
    let job = AwaiterJob::start_awaitable(
        manual,
        StartOptions::new()
            .cancellation(Cancellation::new(move || *counter.lock().unwrap() += 1))
            .runtime(runtime.handle().clone()),
    );

    job.stop();
    job.stop();
    assert_eq!(job.state(), JobState::Stopping);
    assert_eq!(*calls.lock().unwrap(), 1);

    // Success while stopping still completes the job.
    handle.complete(());
    assert!(job.wait_timeout(Duration::from_secs(5)));
    assert_eq!(job.state(), JobState::Completed);

    job.stop();
    assert_eq!(*calls.lock().unwrap(), 1);
    assert_eq!(job.state(), JobState::Completed);
}

#[test]
fn listeners_observe_transitions() {
    let runtime = common::serial_runtime();
    let (manual, handle) = common::manual::<u8>();
    let source = CancellationSource::new();

    let job = AwaiterJob::start_awaitable(
        manual,
        StartOptions::new()
            .cancel_with(&source)
            .runtime(runtime.handle().clone()),
    );

    let seen = Arc::new(Mutex::new(Vec::<StateChange>::new()));
    let sink = seen.clone();
    let id = job.subscribe(Box::new(move |change| sink.lock().unwrap().push(*change)));

    job.stop();
    handle.fail(BoxError::from(Cancelled));
    assert_eq!(job.wait(), JobState::Stopped);

    let seen = seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            StateChange {
                previous: JobState::Running,
                current: JobState::Stopping,
            },
            StateChange {
                previous: JobState::Stopping,
                current: JobState::Stopped,
            },
        ]
    );
    assert!(job.unsubscribe(id));
}

#[jobbridge::test]
async fn descriptive_properties() {
    let job = AwaiterJob::start_awaitable(
        from_infallible(async {}),
        StartOptions::new().location("rack-7").command("Invoke-Thing"),
    );

    assert_eq!(job.name(), format!("Job{}", job.id()));
    assert_eq!(job.location(), "rack-7");
    assert_eq!(job.command(), "Invoke-Thing");
    assert_eq!(job.job_type(), "AwaiterJob");
    assert_eq!(job.status_message(), "");

    let named = AwaiterJob::start_awaitable(from_infallible(async {}), StartOptions::new().name("sync"));
    assert_eq!(named.name(), "sync");
    assert!(!named.location().is_empty());
    assert!(named.id() > job.id());

    job.finished().await;
    named.finished().await;
}
