//! Background execution and foreground delivery for odbc-relay.
//!
//! This is the only part of the crate that knows about threads: driver work
//! runs on tokio's blocking pool, completions run on the caller's
//! [`Foreground`].

pub mod coordinator;
pub mod foreground;
pub mod outcome;

pub use coordinator::ExecutionCoordinator;
pub use foreground::{Foreground, ForegroundHandle};
pub use outcome::{CallId, ExecutionOutcome, OnComplete};
