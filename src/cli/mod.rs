//! CLI module for relop
//!
//! Provides command-line interface for:
//! - compile: Print the SQL a batch compiles to
//! - run: Execute a batch against a seeded in-memory store

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{compile, execute, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_batch, read_batch_from, write_error, write_response};
