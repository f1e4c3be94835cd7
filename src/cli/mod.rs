//! Command-line interface
//!
//! Argument parsing and the top-level run wiring: discovery, manifest,
//! transfer client, executor, and the final operator-facing summary.

pub mod error;
pub mod run;

pub use error::CliError;
pub use run::{execute, Cli};
