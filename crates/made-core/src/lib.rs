//! Core types and traits for multi-agent development runs.
//!
//! This crate provides the dialogue message model, the contract external
//! text-generation services implement, error handling, and configuration
//! shared by every other crate in the workspace.
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

/// Run configuration loaded from TOML.
pub mod config;
/// Error types and result definitions.
pub mod error;
/// Dialogue messages exchanged between agents.
pub mod message;
/// Shared mutable state.
pub mod sync;
/// Trait definitions for model providers.
pub mod traits;
/// Generation request and response types.
pub mod types;

pub use config::{ChainConfig, EnvConfig, MadeConfig, ModelConfig, PhaseOverrides, RetryConfig};
pub use error::{Error, Result};
pub use message::{Message, Metadata, Sender};
pub use sync::Shared;
pub use traits::ModelProvider;
pub use types::{ChatRole, ChatTurn, Generation, GenerationRequest, TokenUsage};
