//! odbc-relay - run SQL statements through an ODBC driver.

mod cli;

use cli::Cli;
use odbc_relay::config::{Config, ExecutionConfig, CONNECTION_ENV_VAR};
use odbc_relay::db::{Driver, MockDriver};
use odbc_relay::error::{RelayError, Result};
use odbc_relay::execution::{ExecutionCoordinator, Foreground};
use odbc_relay::logging;
use odbc_relay::output::{OutcomeFormatter, OutputFormat};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{error, info};

/// Connection string used with `--mock-db` when none is configured.
const MOCK_CONNECTION: &str = "DSN=demo";

fn main() {
    let cli = Cli::parse_args();
    logging::init_stderr_logging(if cli.verbose { "debug" } else { "warn" });

    match run(&cli) {
        Ok(0) => {}
        Ok(failed) => {
            info!("{} statement(s) failed", failed);
            std::process::exit(1);
        }
        Err(e) => {
            error!("{}: {}", e.category(), e);
            std::process::exit(2);
        }
    }
}

/// Runs every requested statement and returns how many failed.
fn run(cli: &Cli) -> Result<usize> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    cli.apply_overrides(&mut config.execution)?;

    let format = cli.output_format()?;
    let connection_string = resolve_connection(cli, &config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| RelayError::internal(format!("Failed to start the runtime: {e}")))?;

    if cli.mock_db {
        let driver = Arc::new(MockDriver::demo());
        return execute_all(
            &runtime,
            driver,
            &config.execution,
            &connection_string,
            cli,
            format,
        );
    }
    run_native(&runtime, &config.execution, &connection_string, cli, format)
}

#[cfg(feature = "odbc")]
fn run_native(
    runtime: &tokio::runtime::Runtime,
    execution: &ExecutionConfig,
    connection_string: &str,
    cli: &Cli,
    format: OutputFormat,
) -> Result<usize> {
    let driver = Arc::new(odbc_relay::db::OdbcDriver::new());
    execute_all(runtime, driver, execution, connection_string, cli, format)
}

#[cfg(not(feature = "odbc"))]
fn run_native(
    _runtime: &tokio::runtime::Runtime,
    _execution: &ExecutionConfig,
    _connection_string: &str,
    _cli: &Cli,
    _format: OutputFormat,
) -> Result<usize> {
    Err(RelayError::config(
        "this build has no ODBC driver manager support; rebuild with --features odbc \
         or pass --mock-db",
    ))
}

/// Dispatches every statement at once and drives the foreground until each
/// outcome has been printed.
fn execute_all<D: Driver>(
    runtime: &tokio::runtime::Runtime,
    driver: Arc<D>,
    execution: &ExecutionConfig,
    connection_string: &str,
    cli: &Cli,
    format: OutputFormat,
) -> Result<usize> {
    let (mut foreground, foreground_handle) = Foreground::new();
    let coordinator = ExecutionCoordinator::with_runtime(
        driver,
        foreground_handle,
        execution,
        runtime.handle().clone(),
    )?;
    let failed = Arc::new(AtomicUsize::new(0));

    for (index, sql) in cli.statements.iter().enumerate() {
        let tag = cli.tag_for(index);
        let failed = Arc::clone(&failed);
        let formatter = OutcomeFormatter::new(format);
        coordinator.execute(connection_string, sql.as_str(), tag.clone(), move |outcome| {
            if !outcome.success {
                failed.fetch_add(1, Ordering::SeqCst);
            }
            print!("{}", formatter.format(&tag, &outcome));
            if format == OutputFormat::Json {
                println!();
            }
        });
    }

    // Each call posts exactly one job while the coordinator is alive.
    let expected = cli.statements.len();
    let delivered = runtime.block_on(async {
        let mut delivered = 0;
        while delivered < expected && foreground.run_next().await {
            delivered += 1;
        }
        delivered
    });
    drop(coordinator);

    if delivered < expected {
        return Err(RelayError::internal(format!(
            "only {delivered} of {expected} outcomes were delivered"
        )));
    }
    Ok(failed.load(Ordering::SeqCst))
}

/// Resolves the connection string with precedence:
/// 1. Connection string argument
/// 2. Named connection from config
/// 3. Default connection from config
/// 4. `ODBC_RELAY_CONNECTION` environment variable
fn resolve_connection(cli: &Cli, config: &Config) -> Result<String> {
    if let Some(connection_string) = &cli.connection_string {
        return Ok(connection_string.clone());
    }

    if let Some(name) = cli.connection.as_deref() {
        return config
            .get_connection(Some(name))
            .map(str::to_string)
            .ok_or_else(|| {
                RelayError::config(format!("Connection '{}' not found in config file", name))
            });
    }

    if let Some(default) = config.get_connection(None) {
        return Ok(default.to_string());
    }

    if let Ok(from_env) = std::env::var(CONNECTION_ENV_VAR) {
        if !from_env.is_empty() {
            return Ok(from_env);
        }
    }

    if cli.mock_db {
        return Ok(MOCK_CONNECTION.to_string());
    }

    Err(RelayError::config(format!(
        "No connection configured. Pass a connection string, use --connection, \
         or set {CONNECTION_ENV_VAR}"
    )))
}
