//! Connection manager for driver session lifecycle.
//!
//! Owns the environment/connection/statement handle triple of one call.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::Driver;
use crate::error::{RelayError, Result};

/// Which handles stay allocated after a successful connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleRetention {
    /// Keep connection and environment alive until disconnect.
    #[default]
    KeepParents,
    /// Release connection and environment right after the statement is
    /// allocated. Only safe for drivers that keep a statement usable without
    /// its parent connection.
    StatementOnly,
}

/// The handle triple of one in-flight execution.
///
/// Handles are released exactly once: either through
/// [`ConnectionManager::disconnect`] or, if the handle is dropped first, on drop.
pub struct ConnectionHandle<D: Driver> {
    driver: Arc<D>,
    env: Option<D::Env>,
    conn: Option<D::Conn>,
    stmt: Option<D::Stmt>,
    connected: bool,
}

impl<D: Driver> ConnectionHandle<D> {
    fn new(driver: Arc<D>) -> Self {
        Self {
            driver,
            env: None,
            conn: None,
            stmt: None,
            connected: false,
        }
    }

    /// The statement handle, if one was allocated.
    pub fn statement(&self) -> Option<&D::Stmt> {
        self.stmt.as_ref()
    }

    /// Returns true if the connection handle is still held.
    pub fn has_connection(&self) -> bool {
        self.conn.is_some()
    }

    /// Returns true if the environment handle is still held.
    pub fn has_environment(&self) -> bool {
        self.env.is_some()
    }

    /// Releases whatever handles are still held, each independently.
    fn release(&mut self) {
        if let Some(stmt) = self.stmt.take() {
            self.driver.free_statement(stmt);
        }
        if let Some(conn) = self.conn.take() {
            if self.connected {
                self.driver.disconnect(&conn);
                self.connected = false;
            }
            self.driver.free_connection(conn);
        }
        if let Some(env) = self.env.take() {
            self.driver.free_env(env);
        }
    }
}

impl<D: Driver> Drop for ConnectionHandle<D> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<D: Driver> fmt::Debug for ConnectionHandle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("env", &self.env.is_some())
            .field("conn", &self.conn.is_some())
            .field("stmt", &self.stmt.is_some())
            .field("connected", &self.connected)
            .finish()
    }
}

/// Opens and closes driver sessions.
pub struct ConnectionManager<D: Driver> {
    driver: Arc<D>,
    retention: HandleRetention,
}

impl<D: Driver> ConnectionManager<D> {
    /// Creates a new connection manager.
    pub fn new(driver: Arc<D>, retention: HandleRetention) -> Self {
        Self { driver, retention }
    }

    /// Returns the configured retention policy.
    pub fn retention(&self) -> HandleRetention {
        self.retention
    }

    /// Allocates the handle triple and connects.
    ///
    /// On any failure the handles allocated so far are released before the
    /// error is returned.
    pub fn connect(&self, connection_string: &str) -> Result<ConnectionHandle<D>> {
        let driver = &self.driver;
        let mut handle = ConnectionHandle::new(Arc::clone(driver));

        let env = driver
            .alloc_env()
            .map_err(|d| RelayError::allocation(format!("environment handle: {d}")))?;
        let env = handle.env.insert(env);

        driver
            .set_odbc_version(env)
            .map_err(|d| RelayError::allocation(format!("ODBC version attribute: {d}")))?;

        let conn = driver
            .alloc_connection(env)
            .map_err(|d| RelayError::allocation(format!("connection handle: {d}")))?;
        let conn = handle.conn.insert(conn);

        if let Err(diag) = driver.driver_connect(conn, connection_string) {
            debug!(state = %diag.state, "Driver connect failed");
            return Err(RelayError::connect(diag.to_string()));
        }
        handle.connected = true;

        let stmt = driver
            .alloc_statement(conn)
            .map_err(|d| RelayError::allocation(format!("statement handle: {d}")))?;
        handle.stmt = Some(stmt);

        if self.retention == HandleRetention::StatementOnly {
            if let Some(conn) = handle.conn.take() {
                driver.free_connection(conn);
            }
            if let Some(env) = handle.env.take() {
                driver.free_env(env);
            }
            handle.connected = false;
        }

        debug!(?handle, "Connected");
        Ok(handle)
    }

    /// Releases the statement, disconnects and releases the connection, and
    /// releases the environment, skipping whichever are absent.
    pub fn disconnect(&self, mut handle: ConnectionHandle<D>) {
        handle.release();
        debug!("Disconnected");
    }
}
