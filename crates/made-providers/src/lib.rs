//! Provider adapters for external text-generation services.
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

/// Scripted provider for tests and dry runs.
pub mod mock;
/// OpenAI-compatible chat completions implementation.
pub mod openai;

pub use mock::MockProvider;
pub use openai::OpenAiProvider;
