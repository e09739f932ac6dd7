//! CLI argument definitions using clap
//!
//! Commands:
//! - relop compile [--config <path>]
//! - relop run --data <seed.json> [--config <path>]
//!
//! Both read an operation batch (JSON array or single object) from stdin.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// relop - declarative relational operations compiled to SQL
#[derive(Parser, Debug)]
#[command(name = "relop")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the SQL each operation of the batch compiles to
    Compile {
        /// Path to executor configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Execute the batch against an in-memory store
    Run {
        /// Seed file: {"table": [{...}, ...], ...}
        #[arg(long)]
        data: PathBuf,

        /// Path to executor configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
