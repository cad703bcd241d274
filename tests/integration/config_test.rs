//! Configuration-driven execution tests.

use super::{coordinator, recorder, run_one};
use odbc_relay::config::{Config, ExecutionConfig};
use odbc_relay::connection::HandleRetention;
use odbc_relay::db::{MockDriver, MockTable, ResourceKind};
use odbc_relay::error::RelayError;
use odbc_relay::execution::{ExecutionCoordinator, Foreground};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::Arc;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_value_capacity_from_config_truncates_values() {
    let file = write_config(
        r#"
[execution]
value_capacity = 4

[connections]
default = "DSN=demo"
"#,
    );
    let config = Config::load_from_file(file.path()).unwrap();
    let connection_string = config.get_connection(None).unwrap().to_string();

    let driver = Arc::new(MockDriver::demo());
    let (coordinator, mut foreground) = coordinator(&driver, &config.execution);
    let (store, consumer) = recorder();

    coordinator.execute(
        connection_string,
        "SELECT id, name, email FROM users",
        "short",
        consumer,
    );
    assert!(foreground.run_next().await);

    let delivered = store.lock().unwrap();
    let result_set = delivered[0].0.result_set.as_ref().unwrap();
    assert_eq!(result_set.column_values("name"), ["Ali", "Bob", "Car"]);
    assert_eq!(result_set.column_values("email")[1], "NULL");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_default_capacity_keeps_short_values() {
    let driver = Arc::new(MockDriver::new().with_table(
        "SELECT note FROM notes",
        MockTable::new(["note"]).row([Some("x".repeat(60))]),
    ));

    let (outcome, _) = run_one(&driver, "DSN=demo", "SELECT note FROM notes").await;

    let result_set = outcome.into_result().unwrap();
    assert_eq!(result_set.column_values("note")[0].len(), 49);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_statement_only_retention_still_executes() {
    let file = write_config("[execution]\nhandle_retention = \"statement_only\"\n");
    let config = Config::load_from_file(file.path()).unwrap();
    assert_eq!(
        config.execution.handle_retention,
        HandleRetention::StatementOnly
    );

    let driver = Arc::new(MockDriver::demo());
    let (coordinator, mut foreground) = coordinator(&driver, &config.execution);
    let (store, consumer) = recorder();

    coordinator.execute("DSN=demo", "SELECT COUNT(*) FROM users", "count", consumer);
    assert!(foreground.run_next().await);

    let delivered = store.lock().unwrap();
    assert!(delivered[0].0.success);
    assert_eq!(driver.released(ResourceKind::Environment), 1);
    assert_eq!(driver.live_handles(), 0);
}

#[tokio::test]
async fn test_invalid_execution_config_is_rejected() {
    let file = write_config("[execution]\nvalue_capacity = 1\n");
    let err = Config::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, RelayError::Config(_)));

    let execution = ExecutionConfig {
        value_capacity: 0,
        ..ExecutionConfig::default()
    };
    let (_foreground, handle) = Foreground::new();
    let result = ExecutionCoordinator::new(Arc::new(MockDriver::demo()), handle, &execution);
    assert!(matches!(result, Err(RelayError::Config(_))));
}
