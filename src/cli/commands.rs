//! CLI command implementations

use std::fs;
use std::path::Path;

use serde_json::{json, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::ExecutorConfig;
use crate::executor::OperationExecutor;
use crate::operation::Operation;
use crate::store::MemoryStore;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{read_batch, write_error, write_response};

/// Entry point for the binary
pub fn run() -> CliResult<()> {
    init_tracing();
    let cli = Cli::parse_args();
    run_command(cli.command)
}

/// Run the command; failures are reported on stdout and returned
pub fn run_command(cmd: Command) -> CliResult<()> {
    let outcome = match cmd {
        Command::Compile { config } => compile(config.as_deref()),
        Command::Run { data, config } => execute(&data, config.as_deref()),
    };
    if let Err(e) = &outcome {
        write_error(e.code_str(), e.message())?;
    }
    outcome
}

/// Print the compiled statements of the batch on stdin
pub fn compile(config_path: Option<&Path>) -> CliResult<()> {
    let config = load_config(config_path)?;
    let batch = read_batch()?;
    write_response(compile_batch(config, &batch)?)
}

/// Execute the batch on stdin against a store seeded from `data_path`
pub fn execute(data_path: &Path, config_path: Option<&Path>) -> CliResult<()> {
    let config = load_config(config_path)?;
    let store = load_seed(data_path)?;
    let batch = read_batch()?;
    write_response(run_batch(store, config, &batch)?)
}

pub(crate) fn compile_batch(config: ExecutorConfig, batch: &Value) -> CliResult<Value> {
    let operations = Operation::parse_batch(batch)?;
    let executor = OperationExecutor::new(MemoryStore::new(), config);
    let rendered = executor.compile(&operations)?;

    let statements = operations
        .iter()
        .zip(rendered)
        .map(|(op, r)| {
            json!({
                "type": op.kind().as_str(),
                "tableName": op.table_name(),
                "sql": r.sql,
                "raw_sql": r.raw_sql,
                "bindings": r.bindings,
            })
        })
        .collect();
    Ok(Value::Array(statements))
}

pub(crate) fn run_batch(
    store: MemoryStore,
    config: ExecutorConfig,
    batch: &Value,
) -> CliResult<Value> {
    let mut executor = OperationExecutor::new(store, config);
    let results = executor.run_json(batch)?;
    debug!(
        statements = executor.store().stats().statements(),
        "batch finished"
    );
    Ok(serde_json::to_value(results)?)
}

fn load_config(path: Option<&Path>) -> CliResult<ExecutorConfig> {
    match path {
        Some(path) => Ok(ExecutorConfig::load(path)?),
        None => Ok(ExecutorConfig::default()),
    }
}

fn load_seed(path: &Path) -> CliResult<MemoryStore> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::seed_error(format!("Failed to read seed data: {}", e)))?;
    let value: Value = serde_json::from_str(&content)
        .map_err(|e| CliError::seed_error(format!("Invalid seed JSON: {}", e)))?;
    Ok(MemoryStore::from_value(&value)?)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // A subscriber may already be installed when embedded
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
