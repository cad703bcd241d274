//! odbc-relay - asynchronous statement execution over ODBC-style drivers.
//!
//! A statement is connected, executed and fully materialized on a background
//! worker; the caller receives exactly one outcome on its own foreground
//! context, unless it has gone away by then.

pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod execution;
pub mod logging;
pub mod output;
pub mod query;
