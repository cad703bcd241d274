//! Result types for odbc-relay.
//!
//! A `ResultSet` is materialized column-major: one `ColumnDescriptor` and one
//! `ColumnValues` per result column, all value sequences sharing the row count.

use serde::Serialize;
use std::fmt;

/// Text stored for a driver-reported NULL.
///
/// A NULL and a literal `"NULL"` string are indistinguishable after
/// materialization.
pub const NULL_TEXT: &str = "NULL";

/// Affected-row count used when the driver cannot report one.
pub const UNKNOWN_AFFECTED_ROWS: i64 = -1;

/// Name and 1-based ordinal of a result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    /// Column name with trailing whitespace removed.
    pub name: String,

    /// 1-based position reported by the driver.
    pub ordinal: u16,
}

impl ColumnDescriptor {
    /// Creates a new column descriptor.
    pub fn new(name: impl Into<String>, ordinal: u16) -> Self {
        Self {
            name: name.into(),
            ordinal,
        }
    }
}

/// All fetched values of one column, one entry per row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ColumnValues(Vec<String>);

impl ColumnValues {
    /// Creates an empty value sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one row's value.
    pub fn push(&mut self, value: impl Into<String>) {
        self.0.push(value.into());
    }

    /// Number of rows held.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no rows were fetched.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the values as a slice.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Consumes the sequence, returning the inner vector.
    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for ColumnValues {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

impl<'a> From<Vec<&'a str>> for ColumnValues {
    fn from(values: Vec<&'a str>) -> Self {
        Self(values.into_iter().map(String::from).collect())
    }
}

/// Opaque caller label attached verbatim to a result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StatementTag(String);

impl StatementTag {
    /// Creates a tag from any string-like value.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StatementTag {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

impl From<String> for StatementTag {
    fn from(tag: String) -> Self {
        Self(tag)
    }
}

impl fmt::Display for StatementTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fully materialized output of one statement execution.
///
/// Built once on the foreground context and handed to the caller by value;
/// it holds no reference back to the coordinator that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSet {
    columns: Vec<ColumnDescriptor>,
    values: Vec<ColumnValues>,
    affected_rows: i64,
    tag: StatementTag,
}

impl ResultSet {
    /// Creates a result set from materialized columns and values.
    pub fn new(
        columns: Vec<ColumnDescriptor>,
        values: Vec<ColumnValues>,
        affected_rows: i64,
        tag: StatementTag,
    ) -> Self {
        Self {
            columns,
            values,
            affected_rows,
            tag,
        }
    }

    /// Column descriptors in driver order.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Column names in driver order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Per-column value sequences, parallel to `columns()`.
    pub fn values(&self) -> &[ColumnValues] {
        &self.values
    }

    /// Affected-row count, or `-1` when unknown.
    pub fn affected_rows(&self) -> i64 {
        self.affected_rows
    }

    /// The caller's correlation tag.
    pub fn tag(&self) -> &StatementTag {
        &self.tag
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of fetched rows.
    pub fn row_count(&self) -> usize {
        self.values.first().map(ColumnValues::len).unwrap_or(0)
    }

    /// Returns true when descriptor and value counts match and every column
    /// holds the same number of rows.
    pub fn is_consistent(&self) -> bool {
        self.columns.len() == self.values.len()
            && self.values.iter().all(|v| v.len() == self.row_count())
    }

    /// Returns every row value of the named column.
    ///
    /// An unknown name or an internally inconsistent result set both yield an
    /// empty slice. The first column with a matching name wins.
    pub fn column_values(&self, name: &str) -> &[String] {
        if self.columns.is_empty() || self.columns.len() != self.values.len() {
            return &[];
        }

        self.columns
            .iter()
            .position(|c| c.name == name)
            .map(|idx| self.values[idx].as_slice())
            .unwrap_or(&[])
    }

    /// Returns the values of one row across all columns, or `None` when out of range.
    pub fn row(&self, index: usize) -> Option<Vec<&str>> {
        if index >= self.row_count() {
            return None;
        }
        self.values
            .iter()
            .map(|col| col.as_slice().get(index).map(String::as_str))
            .collect()
    }
}
