//! Phase orchestration engine.
//!
//! A run moves one [`ChatEnv`] through an ordered chain of named phases. Each
//! phase pulls the fields it declares, runs a bounded dialogue between an
//! assistant and a user [`Agent`], and pushes its conclusion back through a
//! [`StateDelta`]. Phases are looked up by name in a [`PhaseRegistry`], so
//! chains can be described entirely in configuration.
//!
//! ```no_run
//! use std::sync::Arc;
//! use made_core::EnvConfig;
//! use made_phase::{AgentBackend, ChainRunner, ChatEnv, PhaseArgs, PhaseRegistry, RetryPolicy};
//! use made_providers::MockProvider;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = AgentBackend {
//!     provider: Arc::new(MockProvider::new("mock")),
//!     model: "mock".to_owned(),
//!     retry: RetryPolicy::default(),
//! };
//! let registry = Arc::new(PhaseRegistry::with_builtin_phases()?);
//! let runner = ChainRunner::new(registry, move |_| PhaseArgs::new(backend.clone()));
//! let env = runner
//!     .run(ChatEnv::new(EnvConfig::new("build a snake game")), &["demand_analysis"])
//!     .await?;
//! assert!(env.state().contains("modality"));
//! # Ok(())
//! # }
//! ```
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

/// Dialogue participants and the retry policy around their calls.
pub mod agent;
/// Parsing generated file listings.
pub mod codebook;
/// The shared run environment and its state.
pub mod env;
/// Error types.
pub mod error;
/// Sequential chain execution.
pub mod orchestrator;
/// The phase contract and dialogue loop.
pub mod phase;
/// Built-in phases.
pub mod phases;
/// Name-to-constructor registry.
pub mod registry;
/// Validated per-phase parameters.
pub mod spec;
/// Prompt template rendering.
pub mod template;
/// Termination predicate and conclusion extraction.
pub mod termination;

pub use agent::{Agent, AgentBackend, RetryFailure, RetryPolicy};
pub use env::{
    AppliedDelta, ChatEnv, EnvState, PhaseContract, PhaseRecord, ProducedFile, StateDelta,
    StateValue, fields,
};
pub use error::{PhaseError, Result, RunError};
pub use orchestrator::{ChainRunner, PhaseArgsFactory};
pub use phase::{Phase, PhaseArgs, PhaseCore, PhaseRunResult, RegisteredPhase, run_dialogue};
pub use phases::{CodeReviewPhase, CodingPhase, DemandAnalysisPhase, LanguageChoosePhase};
pub use registry::{PhaseConstructor, PhaseRegistry, canonical_name};
pub use spec::{PhaseSpec, PhaseSpecBuilder, RoleSpec, Sampling};
pub use termination::{DEFAULT_MARKER, Extraction, Termination, TerminationSpec};
