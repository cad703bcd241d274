//! Mock driver for testing.
//!
//! Provides an in-memory, scriptable implementation of [`Driver`] that records
//! every handle allocation and release so resource contracts can be asserted.

use super::{decode_truncated, Diagnostic, Driver, DriverResult, Fetch};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::Duration;

/// A canned result served for one statement text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
    affected_rows: i64,
}

impl MockTable {
    /// Creates a query result with the given column names and no rows.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            affected_rows: -1,
        }
    }

    /// Creates a result with no columns that reports `affected_rows`, as a
    /// driver does for INSERT/UPDATE/DELETE.
    pub fn affecting(affected_rows: i64) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            affected_rows,
        }
    }

    /// Appends a row; `None` entries are reported as NULL.
    pub fn row<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        self.rows
            .push(values.into_iter().map(|v| v.map(Into::into)).collect());
        self
    }

    /// Overrides the affected-row count reported after execution.
    pub fn with_affected_rows(mut self, affected_rows: i64) -> Self {
        self.affected_rows = affected_rows;
        self
    }
}

/// Kind of driver resource tracked by the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Environment,
    Connection,
    Statement,
}

/// A resource lifecycle event recorded by the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceEvent {
    Allocated(ResourceKind, u64),
    Released(ResourceKind, u64),
    Connected(u64),
    Disconnected(u64),
}

/// Points at which the mock can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    AllocEnv,
    SetVersion,
    AllocConnection,
    AllocStatement,
    Prepare,
    Execute,
    RowCount,
    NumResultCols,
    /// Describing the given 1-based column.
    DescribeCol(u16),
    /// The fetch that would position on the given 0-based row.
    Fetch(usize),
    /// Reading the given 1-based column of the given 0-based row.
    GetData { row: usize, column: u16 },
}

/// Environment handle issued by [`MockDriver`].
#[derive(Debug)]
pub struct MockEnv(u64);

/// Connection handle issued by [`MockDriver`].
#[derive(Debug)]
pub struct MockConn(u64);

/// Statement handle issued by [`MockDriver`].
#[derive(Debug)]
pub struct MockStmt(u64);

#[derive(Debug, Default)]
struct ConnState {
    connection_string: Option<String>,
    connected: bool,
}

#[derive(Debug)]
struct StmtState {
    connection_string: String,
    prepared: Option<String>,
    result: Option<MockTable>,
    cursor: Option<usize>,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    envs: HashSet<u64>,
    conns: HashMap<u64, ConnState>,
    stmts: HashMap<u64, StmtState>,
    events: Vec<ResourceEvent>,
    call_threads: Vec<ThreadId>,
    invalid_releases: usize,
}

impl MockState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// An in-memory driver that serves predefined tables.
///
/// Connection strings are accepted when they name a `DSN=` or `DRIVER=`
/// and are not explicitly rejected. Statements are looked up by their exact
/// text (surrounding whitespace ignored), first among the tables registered
/// for the statement's connection string, then among the global ones.
#[derive(Debug, Default)]
pub struct MockDriver {
    tables: HashMap<String, MockTable>,
    scoped_tables: HashMap<(String, String), MockTable>,
    rejected: HashSet<String>,
    fail_points: HashSet<FailPoint>,
    latency: Option<Duration>,
    connect_latency: HashMap<String, Duration>,
    state: Mutex<MockState>,
}

impl MockDriver {
    /// Creates a mock driver with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock driver seeded with a small `users` table.
    pub fn demo() -> Self {
        Self::new()
            .with_table(
                "SELECT id, name, email FROM users",
                MockTable::new(["id", "name", "email"])
                    .row([Some("1"), Some("Alice"), Some("alice@example.com")])
                    .row([Some("2"), Some("Bob"), None])
                    .row([Some("3"), Some("Carol"), Some("carol@example.com")]),
            )
            .with_table(
                "SELECT COUNT(*) FROM users",
                MockTable::new(["count"]).row([Some("3")]),
            )
            .with_table("UPDATE users SET active = 1", MockTable::affecting(3))
    }

    /// Registers a result for a statement text on every connection.
    pub fn with_table(mut self, statement: impl Into<String>, table: MockTable) -> Self {
        self.tables.insert(normalize(&statement.into()), table);
        self
    }

    /// Registers a result for a statement text on one connection string only.
    pub fn with_table_for(
        mut self,
        connection_string: impl Into<String>,
        statement: impl Into<String>,
        table: MockTable,
    ) -> Self {
        self.scoped_tables.insert(
            (connection_string.into(), normalize(&statement.into())),
            table,
        );
        self
    }

    /// Makes `driver_connect` fail for the given connection string.
    pub fn reject_connection(mut self, connection_string: impl Into<String>) -> Self {
        self.rejected.insert(connection_string.into());
        self
    }

    /// Makes the driver fail at the given point.
    pub fn fail_at(mut self, point: FailPoint) -> Self {
        self.fail_points.insert(point);
        self
    }

    /// Adds a blocking delay to every `execute` call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Adds a blocking delay to `driver_connect` for one connection string.
    pub fn with_connect_latency(
        mut self,
        connection_string: impl Into<String>,
        latency: Duration,
    ) -> Self {
        self.connect_latency.insert(connection_string.into(), latency);
        self
    }

    /// Every resource event recorded so far, in order.
    pub fn events(&self) -> Vec<ResourceEvent> {
        self.state().events.clone()
    }

    /// Number of handles of the given kind allocated so far.
    pub fn allocated(&self, kind: ResourceKind) -> usize {
        self.count(|e| matches!(e, ResourceEvent::Allocated(k, _) if *k == kind))
    }

    /// Number of handles of the given kind released so far.
    pub fn released(&self, kind: ResourceKind) -> usize {
        self.count(|e| matches!(e, ResourceEvent::Released(k, _) if *k == kind))
    }

    /// Number of `disconnect` calls so far.
    pub fn disconnects(&self) -> usize {
        self.count(|e| matches!(e, ResourceEvent::Disconnected(_)))
    }

    /// Handles currently allocated and not yet released.
    pub fn live_handles(&self) -> usize {
        let state = self.state();
        state.envs.len() + state.conns.len() + state.stmts.len()
    }

    /// Releases of handles the mock did not know about (double frees).
    pub fn invalid_releases(&self) -> usize {
        self.state().invalid_releases
    }

    /// Total number of driver calls made.
    pub fn call_count(&self) -> usize {
        self.state().call_threads.len()
    }

    /// Threads driver calls ran on, in call order.
    pub fn call_threads(&self) -> Vec<ThreadId> {
        self.state().call_threads.clone()
    }

    fn count(&self, pred: impl Fn(&ResourceEvent) -> bool) -> usize {
        self.state().events.iter().filter(|e| pred(e)).count()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Records the call and returns the locked state.
    fn enter(&self) -> MutexGuard<'_, MockState> {
        let mut state = self.state();
        state.call_threads.push(thread::current().id());
        state
    }

    fn check(&self, point: FailPoint, state: &str, message: &str) -> DriverResult<()> {
        if self.fail_points.contains(&point) {
            return Err(Diagnostic::new(state, message));
        }
        Ok(())
    }

    fn lookup(&self, connection_string: &str, statement: &str) -> Option<MockTable> {
        let key = normalize(statement);
        self.scoped_tables
            .get(&(connection_string.to_string(), key.clone()))
            .or_else(|| self.tables.get(&key))
            .cloned()
    }
}

fn normalize(statement: &str) -> String {
    statement.trim().to_string()
}

fn names_data_source(connection_string: &str) -> bool {
    let upper = connection_string.to_ascii_uppercase();
    upper.contains("DSN=") || upper.contains("DRIVER=")
}

fn invalid_handle() -> Diagnostic {
    Diagnostic::new("HY000", "Invalid handle")
}

impl Driver for MockDriver {
    type Env = MockEnv;
    type Conn = MockConn;
    type Stmt = MockStmt;

    fn alloc_env(&self) -> DriverResult<MockEnv> {
        let mut state = self.enter();
        self.check(FailPoint::AllocEnv, "HY001", "Memory allocation error")?;
        let id = state.next_id();
        state.envs.insert(id);
        state
            .events
            .push(ResourceEvent::Allocated(ResourceKind::Environment, id));
        Ok(MockEnv(id))
    }

    fn set_odbc_version(&self, env: &MockEnv) -> DriverResult<()> {
        let state = self.enter();
        if !state.envs.contains(&env.0) {
            return Err(invalid_handle());
        }
        self.check(FailPoint::SetVersion, "HY092", "Invalid attribute/option identifier")
    }

    fn alloc_connection(&self, env: &MockEnv) -> DriverResult<MockConn> {
        let mut state = self.enter();
        if !state.envs.contains(&env.0) {
            return Err(invalid_handle());
        }
        self.check(FailPoint::AllocConnection, "HY001", "Memory allocation error")?;
        let id = state.next_id();
        state.conns.insert(id, ConnState::default());
        state
            .events
            .push(ResourceEvent::Allocated(ResourceKind::Connection, id));
        Ok(MockConn(id))
    }

    fn driver_connect(&self, conn: &MockConn, connection_string: &str) -> DriverResult<()> {
        if let Some(latency) = self.connect_latency.get(connection_string) {
            thread::sleep(*latency);
        }

        let mut state = self.enter();
        let Some(conn_state) = state.conns.get_mut(&conn.0) else {
            return Err(invalid_handle());
        };
        if self.rejected.contains(connection_string) {
            return Err(Diagnostic::new(
                "08001",
                "Client unable to establish connection",
            ));
        }
        if !names_data_source(connection_string) {
            return Err(Diagnostic::new(
                "IM002",
                "Data source name not found and no default driver specified",
            ));
        }
        conn_state.connection_string = Some(connection_string.to_string());
        conn_state.connected = true;
        state.events.push(ResourceEvent::Connected(conn.0));
        Ok(())
    }

    fn alloc_statement(&self, conn: &MockConn) -> DriverResult<MockStmt> {
        let mut state = self.enter();
        let connection_string = match state.conns.get(&conn.0) {
            Some(ConnState {
                connection_string: Some(cs),
                connected: true,
            }) => cs.clone(),
            Some(_) => return Err(Diagnostic::new("08003", "Connection not open")),
            None => return Err(invalid_handle()),
        };
        self.check(FailPoint::AllocStatement, "HY001", "Memory allocation error")?;
        let id = state.next_id();
        state.stmts.insert(
            id,
            StmtState {
                connection_string,
                prepared: None,
                result: None,
                cursor: None,
            },
        );
        state
            .events
            .push(ResourceEvent::Allocated(ResourceKind::Statement, id));
        Ok(MockStmt(id))
    }

    fn prepare(&self, stmt: &MockStmt, text: &str) -> DriverResult<()> {
        let mut state = self.enter();
        let stmt_state = state.stmts.get_mut(&stmt.0).ok_or_else(invalid_handle)?;
        self.check(
            FailPoint::Prepare,
            "42000",
            "Syntax error or access violation",
        )?;
        stmt_state.prepared = Some(text.to_string());
        stmt_state.result = None;
        stmt_state.cursor = None;
        Ok(())
    }

    fn execute(&self, stmt: &MockStmt) -> DriverResult<()> {
        if let Some(latency) = self.latency {
            thread::sleep(latency);
        }

        let mut state = self.enter();
        let stmt_state = state.stmts.get_mut(&stmt.0).ok_or_else(invalid_handle)?;
        let Some(text) = stmt_state.prepared.clone() else {
            return Err(Diagnostic::new("HY010", "Function sequence error"));
        };
        self.check(FailPoint::Execute, "40001", "Serialization failure")?;
        let table = self
            .lookup(&stmt_state.connection_string, &text)
            .ok_or_else(|| {
                Diagnostic::new("42S02", format!("Base table or view not found: {text}"))
            })?;
        stmt_state.result = Some(table);
        Ok(())
    }

    fn row_count(&self, stmt: &MockStmt) -> DriverResult<i64> {
        let state = self.enter();
        let stmt_state = state.stmts.get(&stmt.0).ok_or_else(invalid_handle)?;
        self.check(FailPoint::RowCount, "HY010", "Function sequence error")?;
        stmt_state
            .result
            .as_ref()
            .map(|t| t.affected_rows)
            .ok_or_else(|| Diagnostic::new("HY010", "Function sequence error"))
    }

    fn num_result_cols(&self, stmt: &MockStmt) -> DriverResult<u16> {
        let state = self.enter();
        let stmt_state = state.stmts.get(&stmt.0).ok_or_else(invalid_handle)?;
        self.check(FailPoint::NumResultCols, "HY010", "Function sequence error")?;
        let table = stmt_state
            .result
            .as_ref()
            .ok_or_else(|| Diagnostic::new("HY010", "Function sequence error"))?;
        u16::try_from(table.columns.len())
            .map_err(|_| Diagnostic::new("HY000", "Too many result columns"))
    }

    fn describe_col(&self, stmt: &MockStmt, column: u16) -> DriverResult<String> {
        let state = self.enter();
        let stmt_state = state.stmts.get(&stmt.0).ok_or_else(invalid_handle)?;
        self.check(
            FailPoint::DescribeCol(column),
            "HY000",
            "General error describing column",
        )?;
        stmt_state
            .result
            .as_ref()
            .and_then(|t| t.columns.get(usize::from(column).wrapping_sub(1)))
            .cloned()
            .ok_or_else(|| Diagnostic::new("07009", "Invalid descriptor index"))
    }

    fn fetch(&self, stmt: &MockStmt) -> DriverResult<Fetch> {
        let mut state = self.enter();
        let stmt_state = state.stmts.get_mut(&stmt.0).ok_or_else(invalid_handle)?;
        let Some(table) = stmt_state.result.as_ref() else {
            return Err(Diagnostic::new("24000", "Invalid cursor state"));
        };
        let next = stmt_state.cursor.map_or(0, |c| c + 1);
        if next >= table.rows.len() {
            stmt_state.cursor = Some(table.rows.len());
            return Ok(Fetch::Done);
        }
        self.check(FailPoint::Fetch(next), "08S01", "Communication link failure")?;
        stmt_state.cursor = Some(next);
        Ok(Fetch::Row)
    }

    fn get_data(
        &self,
        stmt: &MockStmt,
        column: u16,
        capacity: usize,
    ) -> DriverResult<Option<String>> {
        let state = self.enter();
        let stmt_state = state.stmts.get(&stmt.0).ok_or_else(invalid_handle)?;
        let (Some(table), Some(row)) = (stmt_state.result.as_ref(), stmt_state.cursor) else {
            return Err(Diagnostic::new("24000", "Invalid cursor state"));
        };
        self.check(
            FailPoint::GetData { row, column },
            "22003",
            "Numeric value out of range",
        )?;
        let value = table
            .rows
            .get(row)
            .and_then(|r| r.get(usize::from(column).wrapping_sub(1)))
            .ok_or_else(|| Diagnostic::new("07009", "Invalid descriptor index"))?;
        Ok(value
            .as_deref()
            .map(|v| decode_truncated(v.as_bytes(), capacity.saturating_sub(1))))
    }

    fn disconnect(&self, conn: &MockConn) {
        let mut state = self.enter();
        if let Some(conn_state) = state.conns.get_mut(&conn.0) {
            conn_state.connected = false;
        }
        state.events.push(ResourceEvent::Disconnected(conn.0));
    }

    fn free_statement(&self, stmt: MockStmt) {
        let mut state = self.enter();
        if state.stmts.remove(&stmt.0).is_some() {
            state
                .events
                .push(ResourceEvent::Released(ResourceKind::Statement, stmt.0));
        } else {
            state.invalid_releases += 1;
        }
    }

    fn free_connection(&self, conn: MockConn) {
        let mut state = self.enter();
        if state.conns.remove(&conn.0).is_some() {
            state
                .events
                .push(ResourceEvent::Released(ResourceKind::Connection, conn.0));
        } else {
            state.invalid_releases += 1;
        }
    }

    fn free_env(&self, env: MockEnv) {
        let mut state = self.enter();
        if state.envs.remove(&env.0) {
            state
                .events
                .push(ResourceEvent::Released(ResourceKind::Environment, env.0));
        } else {
            state.invalid_releases += 1;
        }
    }
}
