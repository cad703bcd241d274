//! Asynchronous statement execution.
//!
//! Each call runs connect → execute → read → disconnect on its own background
//! task and then posts exactly one completion to the foreground context.
//! Nothing is shared between calls except the driver itself.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, warn, Instrument};

use super::foreground::ForegroundHandle;
use super::outcome::{CallId, ExecutionOutcome, OnComplete};
use crate::config::ExecutionConfig;
use crate::connection::{ConnectionManager, HandleRetention};
use crate::db::{Driver, ResultSet, StatementTag};
use crate::error::{RelayError, Result};
use crate::query::{Materialized, ResultReader, StatementExecutor};

/// Per-call pipeline settings, copied into every background task.
#[derive(Debug, Clone, Copy)]
struct Settings {
    retention: HandleRetention,
    value_capacity: usize,
    statement_timeout: Option<Duration>,
}

impl From<&ExecutionConfig> for Settings {
    fn from(config: &ExecutionConfig) -> Self {
        Self {
            retention: config.handle_retention,
            value_capacity: config.value_capacity,
            statement_timeout: config.statement_timeout(),
        }
    }
}

/// Everything the background step collected for a successful call.
#[derive(Debug)]
struct PipelineOutput {
    materialized: Materialized,
    affected_rows: i64,
}

/// Runs statements off the caller's thread and reports back on the foreground.
///
/// Dropping the coordinator (or calling [`shutdown`](Self::shutdown)) marks
/// its owner as gone: calls still in flight finish their driver work and clean
/// up, but their completion consumers never run.
pub struct ExecutionCoordinator<D: Driver> {
    driver: Arc<D>,
    settings: Settings,
    runtime: Handle,
    foreground: ForegroundHandle,
    alive: CancellationToken,
}

impl<D: Driver> ExecutionCoordinator<D> {
    /// Creates a coordinator on the current tokio runtime.
    pub fn new(
        driver: Arc<D>,
        foreground: ForegroundHandle,
        config: &ExecutionConfig,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| {
            RelayError::internal("coordinator must be created inside a tokio runtime")
        })?;
        Self::with_runtime(driver, foreground, config, runtime)
    }

    /// Creates a coordinator that spawns its background work on `runtime`.
    pub fn with_runtime(
        driver: Arc<D>,
        foreground: ForegroundHandle,
        config: &ExecutionConfig,
        runtime: Handle,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            driver,
            settings: Settings::from(config),
            runtime,
            foreground,
            alive: CancellationToken::new(),
        })
    }

    /// Starts executing `sql` and returns immediately.
    ///
    /// `on_complete` runs at most once, on the foreground context, unless the
    /// coordinator is gone by then. The returned handle resolves when the
    /// background step has finished (delivered, abandoned, or timed out).
    pub fn execute_statement(
        &self,
        connection_string: impl Into<String>,
        sql: impl Into<String>,
        tag: impl Into<StatementTag>,
        on_complete: Option<OnComplete>,
    ) -> JoinHandle<()> {
        let id = CallId::new();
        let connection_string = connection_string.into();
        let sql = sql.into();
        let tag = tag.into();
        let driver = Arc::clone(&self.driver);
        let settings = self.settings;
        let foreground = self.foreground.clone();
        let alive = self.alive.clone();
        let span = debug_span!("call", id = %id, tag = %tag);

        debug!(parent: &span, "Dispatching statement");

        let pipeline_span = span.clone();
        self.runtime.spawn(
            async move {
                let started = Instant::now();
                let blocking = tokio::task::spawn_blocking(move || {
                    let _entered = pipeline_span.enter();
                    run_pipeline(driver, settings, &connection_string, &sql)
                });

                let joined = match settings.statement_timeout {
                    Some(limit) => match tokio::time::timeout(limit, blocking).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            warn!(?limit, "Statement timed out; its result will be discarded");
                            Ok(Err(RelayError::timeout(format!(
                                "no result after {} seconds",
                                limit.as_secs_f64()
                            ))))
                        }
                    },
                    None => blocking.await,
                };
                let result = joined.unwrap_or_else(|e| {
                    Err(RelayError::internal(format!("background task failed: {e}")))
                });

                debug!(
                    elapsed = ?started.elapsed(),
                    ok = result.is_ok(),
                    "Background step finished"
                );
                deliver(id, result, tag, on_complete, &foreground, &alive);
            }
            .instrument(span),
        )
    }

    /// Convenience wrapper around [`execute_statement`](Self::execute_statement)
    /// taking the consumer as a plain closure.
    pub fn execute<F>(
        &self,
        connection_string: impl Into<String>,
        sql: impl Into<String>,
        tag: impl Into<StatementTag>,
        on_complete: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(ExecutionOutcome) + Send + 'static,
    {
        self.execute_statement(connection_string, sql, tag, Some(Box::new(on_complete)))
    }

    /// Marks the owner as gone; pending completions will not be delivered.
    pub fn shutdown(&self) {
        self.alive.cancel();
    }

    /// Returns false once the coordinator has been shut down.
    pub fn is_alive(&self) -> bool {
        !self.alive.is_cancelled()
    }
}

impl<D: Driver> Drop for ExecutionCoordinator<D> {
    fn drop(&mut self) {
        self.alive.cancel();
    }
}

/// The blocking connect → execute → read → disconnect sequence of one call.
///
/// Disconnect runs whenever connect succeeded; connect releases its own
/// partial allocations when it fails.
fn run_pipeline<D: Driver>(
    driver: Arc<D>,
    settings: Settings,
    connection_string: &str,
    sql: &str,
) -> Result<PipelineOutput> {
    if sql.is_empty() {
        return Err(RelayError::invalid_input("statement text is empty"));
    }

    let manager = ConnectionManager::new(Arc::clone(&driver), settings.retention);
    let handle = manager.connect(connection_string)?;

    if handle.statement().is_none() {
        manager.disconnect(handle);
        return Err(RelayError::internal(
            "connect reported success without a statement handle",
        ));
    }

    let executor = StatementExecutor::new(Arc::clone(&driver));
    let reader = ResultReader::with_value_capacity(driver, settings.value_capacity);

    let result = executor.prepare_and_execute(&handle, sql).and_then(|()| {
        let affected_rows = executor.affected_rows(&handle);
        let materialized = reader.read_rows(&handle)?;
        Ok(PipelineOutput {
            materialized,
            affected_rows,
        })
    });

    manager.disconnect(handle);
    result
}

/// Posts the call's completion to the foreground unless the owner is gone.
fn deliver(
    id: CallId,
    result: Result<PipelineOutput>,
    tag: StatementTag,
    on_complete: Option<OnComplete>,
    foreground: &ForegroundHandle,
    alive: &CancellationToken,
) {
    if alive.is_cancelled() {
        debug!("Owner gone before delivery; completion abandoned");
        return;
    }

    let alive = alive.clone();
    let posted = foreground.post(move || {
        if alive.is_cancelled() {
            debug!(call = %id, "Owner gone before completion ran; skipped");
            return;
        }

        let Some(on_complete) = on_complete else {
            warn!(
                call = %id,
                "Statement execution completed but no completion consumer was registered"
            );
            return;
        };

        let outcome = match result {
            Ok(output) => ExecutionOutcome::succeeded(ResultSet::new(
                output.materialized.columns,
                output.materialized.values,
                output.affected_rows,
                tag,
            )),
            Err(e) => {
                debug!(call = %id, category = e.category(), "Delivering failure");
                ExecutionOutcome::failed(e.to_string())
            }
        };
        on_complete(outcome);
    });

    if !posted {
        debug!("Foreground closed; completion abandoned");
    }
}
