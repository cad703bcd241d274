//! Command-line argument parsing for odbc-relay.

use clap::Parser;
use odbc_relay::config::{Config, ExecutionConfig};
use odbc_relay::db::StatementTag;
use odbc_relay::error::{RelayError, Result};
use odbc_relay::output::OutputFormat;
use std::path::PathBuf;

/// Run SQL statements through an ODBC driver and print the results.
#[derive(Parser, Debug)]
#[command(name = "odbc-relay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// ODBC connection string (e.g., "DSN=warehouse;UID=reader;PWD=secret")
    #[arg(value_name = "CONNECTION_STRING")]
    pub connection_string: Option<String>,

    /// Use named connection from config
    #[arg(short = 'c', long, value_name = "NAME")]
    pub connection: Option<String>,

    /// Statement to execute; repeat to run several concurrently
    #[arg(short = 'e', long = "execute", value_name = "SQL", required = true)]
    pub statements: Vec<String>,

    /// Tag attached to each result (suffixed with the statement number when
    /// more than one statement is given)
    #[arg(short = 't', long, value_name = "TAG")]
    pub tag: Option<String>,

    /// Output format: text or json
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub format: String,

    /// Seconds to wait for each statement (0 waits forever)
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Bytes read per value, terminator included
    #[arg(long, value_name = "BYTES")]
    pub value_capacity: Option<usize>,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Use the in-memory demo driver instead of the system driver manager
    #[arg(long)]
    pub mock_db: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Parses the output format from the --format argument.
    pub fn output_format(&self) -> Result<OutputFormat> {
        self.format.parse().map_err(RelayError::config)
    }

    /// Tag for the statement at `index`.
    pub fn tag_for(&self, index: usize) -> StatementTag {
        match (&self.tag, self.statements.len()) {
            (Some(tag), 1) => StatementTag::new(tag.clone()),
            (Some(tag), _) => StatementTag::new(format!("{tag}-{}", index + 1)),
            (None, _) => StatementTag::new(format!("stmt-{}", index + 1)),
        }
    }

    /// Applies command-line overrides on top of the file settings.
    pub fn apply_overrides(&self, execution: &mut ExecutionConfig) -> Result<()> {
        if let Some(timeout) = self.timeout {
            execution.statement_timeout_secs = timeout;
        }
        if let Some(capacity) = self.value_capacity {
            execution.value_capacity = capacity;
        }
        execution.validate()
    }
}
