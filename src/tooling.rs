//! Tooling & Integration Layer
//!
//! Command-line entry points over the backup and restore operations.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
