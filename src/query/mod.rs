//! Statement execution and result reading for odbc-relay.
//!
//! These run synchronously on the background context; neither knows about
//! threading.

pub mod executor;
pub mod reader;

pub use executor::StatementExecutor;
pub use reader::{Materialized, ResultReader, DEFAULT_VALUE_CAPACITY};
