#![allow(dead_code)]

use jobbridge::{Awaitable, Awaiter, BoxError, Runtime, RuntimeBuilder};

use std::pin::Pin;
use std::sync::{Arc, Mutex, Once};
use std::task::{Context, Poll, Waker};

use tracing_subscriber::EnvFilter;

/// Installs a test subscriber once per test binary. Set `RUST_LOG` to see
/// job logs.
pub fn init_tracing() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A single-worker pool, so futures run in the order they are queued.
pub fn serial_runtime() -> Runtime {
    RuntimeBuilder::new()
        .worker_threads(1)
        .thread_name("jobbridge-test")
        .build()
}

/// Waits until every future queued on a single-worker pool before this
/// call has been polled.
pub fn flush(runtime: &Runtime) {
    runtime.block_on(async {});
}

struct ManualState<T> {
    result: Option<Result<T, BoxError>>,
    waker: Option<Waker>,
}

/// An awaitable completed by hand through its [`ManualHandle`].
pub struct Manual<T> {
    state: Arc<Mutex<ManualState<T>>>,
}

pub struct ManualHandle<T> {
    state: Arc<Mutex<ManualState<T>>>,
}

pub fn manual<T>() -> (Manual<T>, ManualHandle<T>) {
    let state = Arc::new(Mutex::new(ManualState {
        result: None,
        waker: None,
    }));

    (
        Manual {
            state: state.clone(),
        },
        ManualHandle { state },
    )
}

impl<T> ManualHandle<T> {
    pub fn complete(&self, value: T) {
        self.finish(Ok(value));
    }

    pub fn fail(&self, error: impl Into<BoxError>) {
        self.finish(Err(error.into()));
    }

    fn finish(&self, result: Result<T, BoxError>) {
        let waker = {
            let mut state = self.state.lock().unwrap();
            state.result = Some(result);
            state.waker.take()
        };

        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl<T: Send + 'static> Awaiter for Manual<T> {
    type Output = T;

    fn is_completed(&self) -> bool {
        self.state.lock().unwrap().result.is_some()
    }

    fn poll_result(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<T, BoxError>> {
        let mut state = self.state.lock().unwrap();

        match state.result.take() {
            Some(result) => Poll::Ready(result),
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

impl<T: Send + 'static> Awaitable for Manual<T> {
    type Output = T;
    type Awaiter = Self;

    fn get_awaiter(self) -> Self {
        self
    }
}

/// An error with a source, for checking that records expose the
/// innermost cause.
#[derive(Debug, thiserror::Error)]
#[error("request failed")]
pub struct Outer {
    #[source]
    pub inner: std::io::Error,
}

pub fn outer(message: &str) -> Outer {
    Outer {
        inner: std::io::Error::other(message.to_owned()),
    }
}
