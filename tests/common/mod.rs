// Common test utilities and helpers for the test suite

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use taskdag::{action_fn, Action};

/// Shared, append-only record of action invocations, for ordering asserts.
pub type Log = Arc<Mutex<Vec<&'static str>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

/// Action that does nothing and succeeds.
pub fn noop() -> impl Action {
    action_fn(|| async { Ok(()) })
}

/// Action that appends `name` to the log when it runs.
pub fn recording(log: &Log, name: &'static str) -> impl Action {
    let log = Arc::clone(log);
    action_fn(move || {
        let log = Arc::clone(&log);
        async move {
            log.lock().push(name);
            Ok(())
        }
    })
}

/// Action that increments a counter when it runs.
pub fn counting(counter: &Arc<AtomicUsize>) -> impl Action {
    let counter = Arc::clone(counter);
    action_fn(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

/// Action that sleeps for `delay` before incrementing a counter. Used to
/// widen race windows in the parallel tests.
pub fn slow_counting(counter: &Arc<AtomicUsize>, delay: Duration) -> impl Action {
    let counter = Arc::clone(counter);
    action_fn(move || {
        let counter = Arc::clone(&counter);
        async move {
            tokio::time::sleep(delay).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

/// Action that always fails with `message`.
pub fn failing(message: &'static str) -> impl Action {
    action_fn(move || async move { Err(message.into()) })
}

/// Action that fails on the first `failures` invocations, then succeeds.
pub fn flaky(counter: &Arc<AtomicUsize>, failures: usize) -> impl Action {
    let counter = Arc::clone(counter);
    action_fn(move || {
        let counter = Arc::clone(&counter);
        async move {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            if attempt < failures {
                Err("flaky attempt".into())
            } else {
                Ok(())
            }
        }
    })
}

/// Spawner for `perform_parallel` on the Tokio runtime.
pub fn tokio_spawner(fut: futures::future::BoxFuture<'static, ()>) {
    tokio::spawn(fut);
}

/// Initialize a tracing subscriber for tests (idempotent).
#[cfg(feature = "tracing")]
pub fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::TRACE)
            .try_init()
            .ok();
    });
}
