mod common;

use jobbridge::awaitable::{
    ResultType, awaitable_of, from_future, from_infallible, is_awaitable, is_value_task,
};
use jobbridge::{
    AwaiterJob, BoxError, Error, InvalidOperand, Operand, Shape, StartOptions, Task, TaskSource,
    ValueTask, classify,
};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[test]
fn absent_and_opaque_values_are_not_awaitable() {
    assert_eq!(classify(None), Shape::NotAwaitable);
    assert!(!is_awaitable(None));

    let operand = Operand::opaque(17_u8);
    assert_eq!(classify(Some(&operand)), Shape::NotAwaitable);
    assert_eq!(awaitable_of(Some(&operand)), None);
}

#[test]
fn opaque_values_can_be_recovered() {
    let value = Operand::opaque(String::from("payload")).into_opaque().unwrap();
    assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("payload"));

    let task = Operand::from(Task::from_result(1_u8));
    let task = task.into_opaque().unwrap_err();
    assert!(is_awaitable(Some(&task)));
}

#[test]
fn tasks_report_their_result_type() {
    let typed = Operand::from(Task::from_result(3_i32));
    assert_eq!(
        classify(Some(&typed)),
        Shape::AwaitableOf(ResultType::of::<i32>().unwrap())
    );
    assert!(awaitable_of(Some(&typed)).unwrap().is::<i32>());

    let unit = Operand::from(Task::from_result(()));
    assert_eq!(classify(Some(&unit)), Shape::Awaitable);
    assert!(is_awaitable(Some(&unit)));
}

#[test]
fn adapted_futures_are_awaitable() {
    let with_result = Operand::awaitable(from_future(async { Ok::<_, BoxError>(String::new()) }));
    assert_eq!(
        awaitable_of(Some(&with_result)).map(|t| t.name()),
        Some(std::any::type_name::<String>())
    );

    let without_result = Operand::awaitable(from_infallible(async {}));
    assert_eq!(classify(Some(&without_result)), Shape::Awaitable);

    let (manual, _handle) = common::manual::<u64>();
    let manual = Operand::awaitable(manual);
    assert!(awaitable_of(Some(&manual)).unwrap().is::<u64>());
}

#[test]
fn classification_does_not_run_the_operation() {
    let polled = Arc::new(AtomicBool::new(false));

    let flag = polled.clone();
    let operand = Operand::awaitable(from_infallible(async move {
        flag.store(true, Ordering::SeqCst);
        5
    }));

    assert!(is_awaitable(Some(&operand)));
    assert!(awaitable_of(Some(&operand)).is_some());
    assert!(!polled.load(Ordering::SeqCst));
}

#[test]
fn value_tasks_convert_through_into_task() {
    let operand = Operand::from(ValueTask::ready(9_i64));
    assert!(is_value_task(&operand));
    assert!(awaitable_of(Some(&operand)).unwrap().is::<i64>());

    let converted = operand.into_task();
    assert!(!is_value_task(&converted));
    assert!(awaitable_of(Some(&converted)).unwrap().is::<i64>());

    let source = TaskSource::<i64>::new();
    let pending = ValueTask::from_task(source.task());
    assert!(!pending.is_completed());
    assert!(is_value_task(&Operand::from(pending)));
}

#[test]
fn start_rejects_missing_operand() {
    let err = AwaiterJob::start(None::<Operand>, StartOptions::new()).unwrap_err();

    assert!(matches!(err, Error::InvalidOperand(InvalidOperand::Missing)));
}

#[test]
fn start_rejects_non_awaitable_operand() {
    let err = AwaiterJob::start(Operand::opaque(String::from("nope")), StartOptions::new())
        .unwrap_err();

    match err {
        Error::InvalidOperand(InvalidOperand::NotAwaitable { type_name }) => {
            assert_eq!(type_name, std::any::type_name::<String>());
        }
        other => panic!("unexpected error: {other}"),
    }
}
