//! Statement preparation and execution.
//!
//! Runs a single, fully formed SQL text against an open connection handle.

use std::sync::Arc;

use tracing::debug;

use crate::connection::ConnectionHandle;
use crate::db::{Driver, UNKNOWN_AFFECTED_ROWS};
use crate::error::{RelayError, Result};

/// Prepares and executes one statement per call. No retries.
pub struct StatementExecutor<D: Driver> {
    driver: Arc<D>,
}

impl<D: Driver> StatementExecutor<D> {
    /// Creates a new statement executor.
    pub fn new(driver: Arc<D>) -> Self {
        Self { driver }
    }

    /// Prepares `sql` on the handle's statement and executes it.
    ///
    /// Empty text is rejected before any driver call.
    pub fn prepare_and_execute(&self, handle: &ConnectionHandle<D>, sql: &str) -> Result<()> {
        if sql.is_empty() {
            return Err(RelayError::invalid_input("statement text is empty"));
        }

        let stmt = handle
            .statement()
            .ok_or_else(|| RelayError::internal("no statement handle allocated"))?;

        self.driver
            .prepare(stmt, sql)
            .map_err(|d| RelayError::prepare(d.to_string()))?;
        debug!(sql_len = sql.len(), "Statement prepared");

        self.driver
            .execute(stmt)
            .map_err(|d| RelayError::execute(d.to_string()))?;
        debug!("Statement executed");

        Ok(())
    }

    /// Best-effort affected-row count of the last execution.
    ///
    /// Returns `-1` when the driver fails or reports a negative count.
    pub fn affected_rows(&self, handle: &ConnectionHandle<D>) -> i64 {
        let Some(stmt) = handle.statement() else {
            return UNKNOWN_AFFECTED_ROWS;
        };
        match self.driver.row_count(stmt) {
            Ok(count) if count >= 0 => count,
            Ok(_) => UNKNOWN_AFFECTED_ROWS,
            Err(diag) => {
                debug!(%diag, "Row count unavailable");
                UNKNOWN_AFFECTED_ROWS
            }
        }
    }
}
