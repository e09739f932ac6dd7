//! relop CLI entry point
//!
//! Parses arguments and dispatches to the CLI module. Errors have already
//! been written to stdout as a JSON envelope; the message is repeated on
//! stderr and the process exits non-zero.

use relop::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
