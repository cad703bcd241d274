//! Result materialization.
//!
//! Reads column metadata and every row of an executed statement into
//! column-major text storage. Materialization is all-or-nothing: any failure
//! discards what was already read for the call.

use std::sync::Arc;

use tracing::debug;

use crate::connection::ConnectionHandle;
use crate::db::{ColumnDescriptor, ColumnValues, Driver, Fetch, NULL_TEXT};
use crate::error::{RelayError, Result};

/// Default value buffer size in bytes, terminator included.
///
/// Values longer than `DEFAULT_VALUE_CAPACITY - 1` bytes are truncated.
pub const DEFAULT_VALUE_CAPACITY: usize = 50;

/// Column metadata and values read from one result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Materialized {
    pub columns: Vec<ColumnDescriptor>,
    pub values: Vec<ColumnValues>,
}

impl Materialized {
    /// Number of rows read.
    pub fn row_count(&self) -> usize {
        self.values.first().map(ColumnValues::len).unwrap_or(0)
    }
}

/// Reads the result of an executed statement.
pub struct ResultReader<D: Driver> {
    driver: Arc<D>,
    value_capacity: usize,
}

impl<D: Driver> ResultReader<D> {
    /// Creates a reader with the default value capacity.
    pub fn new(driver: Arc<D>) -> Self {
        Self::with_value_capacity(driver, DEFAULT_VALUE_CAPACITY)
    }

    /// Creates a reader whose value buffer holds `value_capacity` bytes.
    pub fn with_value_capacity(driver: Arc<D>, value_capacity: usize) -> Self {
        Self {
            driver,
            value_capacity,
        }
    }

    pub fn value_capacity(&self) -> usize {
        self.value_capacity
    }

    /// Describes every column, then fetches every row.
    ///
    /// Column names and values have trailing whitespace trimmed; a NULL
    /// becomes the text `"NULL"`.
    pub fn read_rows(&self, handle: &ConnectionHandle<D>) -> Result<Materialized> {
        let stmt = handle
            .statement()
            .ok_or_else(|| RelayError::internal("no statement handle allocated"))?;

        let count = self.driver.num_result_cols(stmt).map_err(|d| {
            RelayError::metadata(format!("Could not get the number of columns: {d}"))
        })?;

        let mut columns = Vec::with_capacity(usize::from(count));
        for ordinal in 1..=count {
            let name = self.driver.describe_col(stmt, ordinal).map_err(|d| {
                RelayError::metadata(format!("Could not describe column {ordinal}: {d}"))
            })?;
            columns.push(ColumnDescriptor::new(name.trim_end(), ordinal));
        }

        let mut values = vec![ColumnValues::new(); columns.len()];
        let mut rows = 0usize;
        loop {
            match self.driver.fetch(stmt) {
                Ok(Fetch::Row) => {}
                Ok(Fetch::Done) => break,
                Err(d) => {
                    return Err(RelayError::fetch(format!(
                        "Could not fetch row {}: {d}",
                        rows + 1
                    )));
                }
            }

            for (column, ordinal) in values.iter_mut().zip(1..=count) {
                let value = self
                    .driver
                    .get_data(stmt, ordinal, self.value_capacity)
                    .map_err(|d| {
                        RelayError::fetch(format!("Could not get column {ordinal} data: {d}"))
                    })?;
                column.push(self.normalize(value));
            }
            rows += 1;
        }

        debug!(columns = columns.len(), rows, "Result materialized");
        Ok(Materialized { columns, values })
    }

    fn normalize(&self, value: Option<String>) -> String {
        match value {
            None => NULL_TEXT.to_string(),
            Some(text) => {
                if text.len() + 1 >= self.value_capacity {
                    debug!(capacity = self.value_capacity, "Value may be truncated");
                }
                text.trim_end().to_string()
            }
        }
    }
}
