//! Completion payload delivered to callers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::db::ResultSet;

/// Unique identifier for one `execute_statement` call, used in log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(u64);

impl CallId {
    /// Generates a new unique call ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the completion consumer receives, exactly once per call.
///
/// On failure there is no result set and `error_message` is non-empty; on
/// success `error_message` is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub result_set: Option<ResultSet>,
    pub success: bool,
    pub error_message: String,
}

impl ExecutionOutcome {
    /// Successful completion carrying a result set.
    pub fn succeeded(result_set: ResultSet) -> Self {
        Self {
            result_set: Some(result_set),
            success: true,
            error_message: String::new(),
        }
    }

    /// Failed completion carrying the first error's message.
    pub fn failed(error_message: impl Into<String>) -> Self {
        Self {
            result_set: None,
            success: false,
            error_message: error_message.into(),
        }
    }

    /// Converts into a `Result`, for callers that prefer `?`.
    pub fn into_result(self) -> std::result::Result<ResultSet, String> {
        match (self.success, self.result_set) {
            (true, Some(result_set)) => Ok(result_set),
            _ => Err(self.error_message),
        }
    }
}

/// Single-shot completion consumer; consumed when invoked.
pub type OnComplete = Box<dyn FnOnce(ExecutionOutcome) + Send + 'static>;
