//! Command-line interface.

mod commands;

pub use commands::{exit_code, run, Cli};
