//! Connection management for odbc-relay.
//!
//! Centralizes the driver session lifecycle of a single call.

pub mod manager;

pub use manager::{ConnectionHandle, ConnectionManager, HandleRetention};
