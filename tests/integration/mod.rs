//! Integration tests for odbc-relay.

pub mod concurrency_test;
pub mod config_test;
pub mod coordinator_test;

use odbc_relay::config::ExecutionConfig;
use odbc_relay::db::MockDriver;
use odbc_relay::execution::{ExecutionCoordinator, ExecutionOutcome, Foreground};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

/// Outcomes captured by completion consumers, with the thread each ran on.
pub type Delivered = Arc<Mutex<Vec<(ExecutionOutcome, ThreadId)>>>;

/// Builds a coordinator over `driver` on the current runtime.
pub fn coordinator(
    driver: &Arc<MockDriver>,
    config: &ExecutionConfig,
) -> (ExecutionCoordinator<MockDriver>, Foreground) {
    let (foreground, handle) = Foreground::new();
    let coordinator = ExecutionCoordinator::new(Arc::clone(driver), handle, config).unwrap();
    (coordinator, foreground)
}

/// Returns a store and a consumer that records into it.
pub fn recorder() -> (Delivered, impl FnOnce(ExecutionOutcome) + Send + 'static) {
    let store: Delivered = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&store);
    let consumer = move |outcome: ExecutionOutcome| {
        let thread = std::thread::current().id();
        sink.lock().unwrap().push((outcome, thread));
    };
    (store, consumer)
}

/// Runs one statement to completion and returns its outcome.
pub async fn run_one(
    driver: &Arc<MockDriver>,
    connection_string: &str,
    sql: &str,
) -> (ExecutionOutcome, ThreadId) {
    let (coordinator, mut foreground) = coordinator(driver, &ExecutionConfig::default());
    let (store, consumer) = recorder();

    coordinator.execute(connection_string, sql, "test", consumer);
    assert!(foreground.run_next().await);

    let mut delivered = store.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    delivered.remove(0)
}
