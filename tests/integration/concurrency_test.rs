//! Concurrent execution tests.
//!
//! Calls share one coordinator and one driver but must never observe each
//! other's handles or results.

use super::{coordinator, recorder};
use odbc_relay::config::ExecutionConfig;
use odbc_relay::db::{MockDriver, MockTable, ResourceKind};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const SITES: &str = "SELECT region FROM sites";

fn regional_driver() -> MockDriver {
    MockDriver::new()
        .with_table_for("DSN=east", SITES, MockTable::new(["region"]).row([Some("east")]))
        .with_table_for(
            "DSN=west",
            SITES,
            MockTable::new(["region"])
                .row([Some("west")])
                .row([Some("west-2")]),
        )
        .with_connect_latency("DSN=east", Duration::from_millis(200))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_calls_see_their_own_results() {
    let driver = Arc::new(regional_driver());
    let (coordinator, mut foreground) = coordinator(&driver, &ExecutionConfig::default());
    let (east, east_consumer) = recorder();
    let (west, west_consumer) = recorder();

    coordinator.execute("DSN=east", SITES, "east", east_consumer);
    coordinator.execute("DSN=west", SITES, "west", west_consumer);

    assert!(foreground.run_next().await);
    // The slow connection cannot have finished first.
    assert_eq!(east.lock().unwrap().len(), 0);
    assert_eq!(west.lock().unwrap().len(), 1);

    assert!(foreground.run_next().await);

    let east = east.lock().unwrap();
    let east_set = east[0].0.result_set.as_ref().unwrap();
    assert_eq!(east_set.tag().as_str(), "east");
    assert_eq!(east_set.column_values("region"), ["east"]);

    let west = west.lock().unwrap();
    let west_set = west[0].0.result_set.as_ref().unwrap();
    assert_eq!(west_set.tag().as_str(), "west");
    assert_eq!(west_set.column_values("region"), ["west", "west-2"]);

    assert_eq!(driver.live_handles(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_calls_each_delivered_once() {
    const CALLS: usize = 16;
    let driver = Arc::new(MockDriver::demo().with_latency(Duration::from_millis(10)));
    let (coordinator, mut foreground) = coordinator(&driver, &ExecutionConfig::default());

    let mut stores = Vec::new();
    for i in 0..CALLS {
        let (store, consumer) = recorder();
        let sql = if i % 2 == 0 {
            "SELECT COUNT(*) FROM users"
        } else {
            "SELECT id, name, email FROM users"
        };
        coordinator.execute("DSN=demo", sql, format!("call-{i}"), consumer);
        stores.push(store);
    }

    for _ in 0..CALLS {
        assert!(foreground.run_next().await);
    }
    assert_eq!(foreground.run_pending(), 0);

    let mut tags = HashSet::new();
    for (i, store) in stores.iter().enumerate() {
        let delivered = store.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        let result_set = delivered[0].0.result_set.as_ref().unwrap();
        assert_eq!(result_set.tag().as_str(), format!("call-{i}"));
        let expected_rows = if i % 2 == 0 { 1 } else { 3 };
        assert_eq!(result_set.row_count(), expected_rows);
        tags.insert(result_set.tag().clone());
    }
    assert_eq!(tags.len(), CALLS);

    assert_eq!(driver.allocated(ResourceKind::Statement), CALLS);
    assert_eq!(driver.released(ResourceKind::Statement), CALLS);
    assert_eq!(driver.disconnects(), CALLS);
    assert_eq!(driver.invalid_releases(), 0);
    assert_eq!(driver.live_handles(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failure_does_not_affect_sibling_call() {
    let driver = Arc::new(MockDriver::demo().reject_connection("DSN=broken"));
    let (coordinator, mut foreground) = coordinator(&driver, &ExecutionConfig::default());
    let (good, good_consumer) = recorder();
    let (bad, bad_consumer) = recorder();

    coordinator.execute("DSN=demo", "SELECT COUNT(*) FROM users", "good", good_consumer);
    coordinator.execute("DSN=broken", "SELECT COUNT(*) FROM users", "bad", bad_consumer);

    assert!(foreground.run_next().await);
    assert!(foreground.run_next().await);

    assert!(good.lock().unwrap()[0].0.success);
    let bad = bad.lock().unwrap();
    assert!(!bad[0].0.success);
    assert!(bad[0].0.error_message.starts_with("Failed to connect"));
    assert_eq!(driver.live_handles(), 0);
}
