//! Command-line interface for docforge.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli};
