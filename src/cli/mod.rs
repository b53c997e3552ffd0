//! Command-line interface for cbt.

mod commands;

pub use commands::{is_verbose, run};
