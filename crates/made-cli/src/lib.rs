//! Library interface for made-cli
//!
//! Exposes argument parsing and command handlers for the binary and for
//! integration testing.
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::print_stdout,
        clippy::print_stderr,
        reason = "Allow for tests"
    )
)]

/// Command-line argument definitions.
pub mod cli;
/// Command handlers.
pub mod handlers;

pub use cli::{Cli, Commands, RunArgs};
