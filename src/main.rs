//! # Release Tree CLI
//!
//! This is the binary entry point for the `release-tree` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Executing the appropriate command based on the parsed arguments.
//! - Reporting a fatal error as a single `[ERROR]` line on stderr and exiting
//!   with the matching status.
//!
//! The core application logic is defined in the `lib.rs` library crate, ensuring
//! that the binary is a thin wrapper around the reusable library functionality.

mod cli;
mod commands;

use clap::Parser;

fn main() {
    let cli = cli::Cli::parse();
    if let Err(err) = cli.execute() {
        eprintln!("[ERROR] {}", err);
        let code = err
            .downcast_ref::<release_tree::error::Error>()
            .map(release_tree::error::Error::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}
