//! End-to-end execution tests.
//!
//! Each test drives a coordinator from the test thread, which acts as the
//! foreground context, while the pipeline runs on blocking worker threads.

use super::{coordinator, recorder, run_one};
use odbc_relay::config::ExecutionConfig;
use odbc_relay::db::{FailPoint, MockDriver, MockTable, ResourceKind};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn two_row_driver() -> MockDriver {
    MockDriver::new().with_table(
        "SELECT id, name FROM t",
        MockTable::new(["id", "name"])
            .row([Some("1"), Some("Alice")])
            .row([Some("2"), Some("Bob")]),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_select_delivers_column_major_result() {
    let driver = Arc::new(two_row_driver());
    let test_thread = std::thread::current().id();

    let (outcome, callback_thread) = run_one(&driver, "DSN=demo", "SELECT id, name FROM t").await;

    assert!(outcome.success);
    assert_eq!(outcome.error_message, "");
    let result_set = outcome.result_set.unwrap();
    assert_eq!(result_set.column_names(), vec!["id", "name"]);
    assert_eq!(result_set.column_values("id"), ["1", "2"]);
    assert_eq!(result_set.column_values("name"), ["Alice", "Bob"]);
    assert!(result_set.affected_rows() == -1 || result_set.affected_rows() == 2);
    assert_eq!(result_set.tag().as_str(), "test");
    assert!(result_set.is_consistent());

    assert_eq!(callback_thread, test_thread);
    assert!(!driver.call_threads().is_empty());
    assert!(driver.call_threads().iter().all(|t| *t != test_thread));
    assert_eq!(driver.live_handles(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_select_with_known_row_count_reports_it() {
    let driver = Arc::new(MockDriver::new().with_table(
        "SELECT id, name FROM t",
        MockTable::new(["id", "name"])
            .row([Some("1"), Some("Alice")])
            .row([Some("2"), Some("Bob")])
            .with_affected_rows(2),
    ));

    let (outcome, _) = run_one(&driver, "DSN=demo", "SELECT id, name FROM t").await;

    let result_set = outcome.into_result().unwrap();
    assert_eq!(result_set.affected_rows(), 2);
    assert_eq!(result_set.row_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_invalid_connection_reports_connect_failure() {
    let driver = Arc::new(two_row_driver());

    let (outcome, _) = run_one(&driver, "not a connection string", "SELECT id, name FROM t").await;

    assert!(!outcome.success);
    assert!(outcome.result_set.is_none());
    assert!(
        outcome.error_message.starts_with("Failed to connect"),
        "unexpected message: {}",
        outcome.error_message
    );
    assert_eq!(driver.live_handles(), 0);
    assert_eq!(driver.invalid_releases(), 0);
    assert_eq!(driver.allocated(ResourceKind::Statement), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rejected_connection_releases_partial_handles() {
    let driver = Arc::new(two_row_driver().reject_connection("DSN=down"));

    let (outcome, _) = run_one(&driver, "DSN=down", "SELECT id, name FROM t").await;

    assert!(!outcome.success);
    assert!(outcome.error_message.contains("08001"));
    assert_eq!(driver.allocated(ResourceKind::Connection), 1);
    assert_eq!(driver.released(ResourceKind::Connection), 1);
    assert_eq!(driver.released(ResourceKind::Environment), 1);
    assert_eq!(driver.disconnects(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_fetch_failure_mid_stream_yields_no_result_set() {
    let driver = Arc::new(
        MockDriver::new()
            .with_table(
                "SELECT n FROM numbers",
                MockTable::new(["n"])
                    .row([Some("1")])
                    .row([Some("2")])
                    .row([Some("3")]),
            )
            .fail_at(FailPoint::Fetch(1)),
    );

    let (outcome, _) = run_one(&driver, "DSN=demo", "SELECT n FROM numbers").await;

    assert!(!outcome.success);
    assert!(outcome.result_set.is_none());
    assert!(outcome.error_message.starts_with("Failed to fetch rows"));
    assert_eq!(driver.disconnects(), 1);
    assert_eq!(driver.live_handles(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_execute_failure_reports_driver_diagnostic() {
    let driver = Arc::new(two_row_driver());

    let (outcome, _) = run_one(&driver, "DSN=demo", "SELECT * FROM missing").await;

    assert!(!outcome.success);
    assert!(outcome.error_message.starts_with("Failed to execute"));
    assert!(outcome.error_message.contains("42S02"));
    assert_eq!(driver.live_handles(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_null_values_become_null_text() {
    let driver = Arc::new(MockDriver::demo());

    let (outcome, _) = run_one(&driver, "DSN=demo", "SELECT id, name, email FROM users").await;

    let result_set = outcome.into_result().unwrap();
    assert_eq!(result_set.row_count(), 3);
    assert_eq!(result_set.column_values("email")[1], "NULL");
    assert_eq!(result_set.row(1), Some(vec!["2", "Bob", "NULL"]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_update_reports_affected_rows_without_columns() {
    let driver = Arc::new(MockDriver::demo());

    let (outcome, _) = run_one(&driver, "DSN=demo", "UPDATE users SET active = 1").await;

    let result_set = outcome.into_result().unwrap();
    assert_eq!(result_set.column_count(), 0);
    assert_eq!(result_set.row_count(), 0);
    assert_eq!(result_set.affected_rows(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_empty_statement_is_rejected_without_driver_calls() {
    let driver = Arc::new(MockDriver::demo());

    let (outcome, _) = run_one(&driver, "DSN=demo", "").await;

    assert!(!outcome.success);
    assert!(outcome.result_set.is_none());
    assert!(outcome.error_message.starts_with("Invalid statement"));
    assert_eq!(driver.call_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_owner_gets_no_callback_and_handles_are_released() {
    let driver = Arc::new(MockDriver::demo().with_latency(Duration::from_millis(100)));
    let (coordinator, mut foreground) = coordinator(&driver, &ExecutionConfig::default());
    let (store, consumer) = recorder();

    let task = coordinator.execute("DSN=demo", "SELECT COUNT(*) FROM users", "gone", consumer);
    drop(coordinator);
    task.await.unwrap();

    assert_eq!(foreground.run_pending(), 0);
    assert!(store.lock().unwrap().is_empty());
    assert_eq!(driver.live_handles(), 0);
    assert_eq!(driver.disconnects(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_consumer_still_cleans_up() {
    let driver = Arc::new(MockDriver::demo());
    let (coordinator, mut foreground) = coordinator(&driver, &ExecutionConfig::default());

    let task = coordinator.execute_statement("DSN=demo", "SELECT COUNT(*) FROM users", "x", None);
    task.await.unwrap();

    assert_eq!(foreground.run_pending(), 1);
    assert_eq!(driver.live_handles(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timeout_delivers_failure_and_releases_later() {
    let driver = Arc::new(MockDriver::demo().with_latency(Duration::from_millis(1500)));
    let config = ExecutionConfig {
        statement_timeout_secs: 1,
        ..ExecutionConfig::default()
    };
    let (coordinator, mut foreground) = coordinator(&driver, &config);
    let (store, consumer) = recorder();

    coordinator.execute("DSN=demo", "SELECT COUNT(*) FROM users", "slow", consumer);
    assert!(foreground.run_next().await);

    {
        let delivered = store.lock().unwrap();
        let (outcome, _) = &delivered[0];
        assert!(!outcome.success);
        assert!(outcome.error_message.starts_with("Statement timed out"));
    }

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(driver.live_handles(), 0);
    assert_eq!(foreground.run_pending(), 0);
    assert_eq!(store.lock().unwrap().len(), 1);
}
