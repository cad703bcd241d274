//! Driver abstraction layer for odbc-relay.
//!
//! The call-level connectivity API is expressed as the synchronous [`Driver`]
//! trait so the pipeline can run against a native ODBC driver manager or the
//! in-memory [`MockDriver`] interchangeably.

mod mock;
#[cfg(feature = "odbc")]
mod odbc;
mod types;

pub use mock::{
    FailPoint, MockConn, MockDriver, MockEnv, MockStmt, MockTable, ResourceEvent, ResourceKind,
};
#[cfg(feature = "odbc")]
pub use odbc::OdbcDriver;
pub use types::{
    ColumnDescriptor, ColumnValues, ResultSet, StatementTag, NULL_TEXT, UNKNOWN_AFFECTED_ROWS,
};

use std::fmt;

/// Diagnostic record retrieved from the driver after a failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Five-character SQLSTATE, empty if the driver returned none.
    pub state: String,

    /// Driver-specific native error code.
    pub native_error: i32,

    /// Human-readable diagnostic text.
    pub message: String,
}

impl Diagnostic {
    /// Creates a diagnostic with the given state and message.
    pub fn new(state: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            native_error: 0,
            message: message.into(),
        }
    }

    /// Sets the native error code.
    pub fn with_native_error(mut self, native_error: i32) -> Self {
        self.native_error = native_error;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.state.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "[{}] {}", self.state, self.message)
        }
    }
}

/// Result of a single driver call.
pub type DriverResult<T> = std::result::Result<T, Diagnostic>;

/// Outcome of advancing the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    /// The cursor now points at a row.
    Row,
    /// No more rows.
    Done,
}

/// Decodes at most `limit` bytes of a text value.
///
/// A multi-byte character cut short by the limit is dropped rather than
/// decoded as a replacement character. Bytes that are invalid for any other
/// reason are still replaced.
pub(crate) fn decode_truncated(bytes: &[u8], limit: usize) -> String {
    let bytes = &bytes[..bytes.len().min(limit)];
    String::from_utf8_lossy(complete_prefix(bytes)).into_owned()
}

/// Strips a trailing incomplete UTF-8 sequence.
fn complete_prefix(bytes: &[u8]) -> &[u8] {
    // A sequence is at most four bytes, so its lead byte is within the last four.
    let tail = bytes.len().saturating_sub(4);
    for start in (tail..bytes.len()).rev() {
        let width = match bytes[start] {
            0x80..=0xBF => continue,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        if bytes.len() - start < width {
            return &bytes[..start];
        }
        return bytes;
    }
    bytes
}

/// Call-level interface to a connectivity driver.
///
/// Every method is a blocking call. Releasing a handle takes it by value, so
/// a handle can be released at most once.
pub trait Driver: Send + Sync + 'static {
    /// Environment handle.
    type Env: Send;
    /// Connection handle.
    type Conn: Send;
    /// Statement handle.
    type Stmt: Send;

    /// Allocates an environment.
    fn alloc_env(&self) -> DriverResult<Self::Env>;

    /// Declares ODBC 3 behaviour on the environment.
    fn set_odbc_version(&self, env: &Self::Env) -> DriverResult<()>;

    /// Allocates a connection within an environment.
    fn alloc_connection(&self, env: &Self::Env) -> DriverResult<Self::Conn>;

    /// Connects using a driver-specific connection string.
    fn driver_connect(&self, conn: &Self::Conn, connection_string: &str) -> DriverResult<()>;

    /// Allocates a statement bound to an open connection.
    fn alloc_statement(&self, conn: &Self::Conn) -> DriverResult<Self::Stmt>;

    fn prepare(&self, stmt: &Self::Stmt, text: &str) -> DriverResult<()>;

    fn execute(&self, stmt: &Self::Stmt) -> DriverResult<()>;

    /// Rows affected by the last executed statement, negative if unknown.
    fn row_count(&self, stmt: &Self::Stmt) -> DriverResult<i64>;

    fn num_result_cols(&self, stmt: &Self::Stmt) -> DriverResult<u16>;

    /// Name of the 1-based column as reported by the driver.
    fn describe_col(&self, stmt: &Self::Stmt, column: u16) -> DriverResult<String>;

    fn fetch(&self, stmt: &Self::Stmt) -> DriverResult<Fetch>;

    /// Reads the current row's value of a 1-based column as text.
    ///
    /// The value is written into a buffer of `capacity` bytes including the
    /// terminator, so at most `capacity - 1` bytes survive. Returns `None`
    /// for a NULL indicator.
    fn get_data(
        &self,
        stmt: &Self::Stmt,
        column: u16,
        capacity: usize,
    ) -> DriverResult<Option<String>>;

    /// Closes the session of a connected connection handle.
    fn disconnect(&self, conn: &Self::Conn);

    fn free_statement(&self, stmt: Self::Stmt);

    fn free_connection(&self, conn: Self::Conn);

    fn free_env(&self, env: Self::Env);
}
