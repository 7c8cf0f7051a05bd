//! Error types for phase registration, execution and chaining.

use made_core::{Error as CoreError, Sender};
use serde_json::Error as JsonError;
use std::io;
use std::result::Result as StdResult;
use thiserror::Error;

use crate::env::ChatEnv;

/// Result type alias using `PhaseError`.
pub type Result<T> = StdResult<T, PhaseError>;

/// Errors raised while registering, resolving or executing a phase.
#[derive(Debug, Error)]
pub enum PhaseError {
    /// No phase is registered under the requested name
    #[error("Unknown phase: {0}")]
    UnknownPhase(String),

    /// A phase is already registered under the name
    #[error("Phase already registered: {0}")]
    DuplicateRegistration(String),

    /// The registration target cannot be accepted
    #[error("Invalid phase registration '{name}': {reason}")]
    InvalidRegistration {
        /// Name the registration was attempted under
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// A field the phase requires is absent from the shared state
    #[error("Phase '{phase}' requires state field '{field}', which is not set")]
    MissingDependency {
        /// Phase that declared the dependency
        phase: String,
        /// Missing field
        field: String,
    },

    /// A phase tried to write a field outside its declared contract
    #[error("Phase '{phase}' wrote undeclared state field '{field}'")]
    UndeclaredWrite {
        /// Offending phase
        phase: String,
        /// Field it tried to write
        field: String,
    },

    /// Phase parameters failed validation
    #[error("Invalid phase spec: {0}")]
    InvalidSpec(String),

    /// `run` was called before `update_phase_states`
    #[error("Phase '{0}' ran before its states were pulled from the environment")]
    NotPrepared(String),

    /// A prompt template referenced a value that was not provided
    #[error("Template placeholder '{{{placeholder}}}' has no value")]
    Template {
        /// Name of the unresolved placeholder
        placeholder: String,
    },

    /// The generation capability failed after the retry policy was exhausted
    #[error("Generation failed for {role} ({sender}) after {attempts} attempt(s): {source}")]
    Generation {
        /// Role name of the agent whose call failed
        role: String,
        /// Dialogue side of that agent
        sender: Sender,
        /// Attempts made, including the first
        attempts: u32,
        /// Final underlying failure
        #[source]
        source: CoreError,
    },

    /// IO error while persisting transcripts
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error while persisting transcripts
    #[error("JSON error: {0}")]
    Json(#[from] JsonError),
}

/// Failure of a whole chain run, naming the phase that caused it.
///
/// The environment is handed back as it was when the run stopped: nothing is
/// rolled back, so the writes of every phase that completed are still there.
#[derive(Debug, Error)]
pub enum RunError {
    /// The phase sequence could not be resolved; nothing was executed
    #[error("Failed to resolve phase '{phase}': {source}")]
    Resolve {
        /// Name that failed to resolve
        phase: String,
        /// Underlying registry error
        #[source]
        source: PhaseError,
        /// The untouched environment
        env: Box<ChatEnv>,
    },

    /// A phase failed while executing
    #[error("Phase '{phase}' failed: {source}")]
    PhaseFailed {
        /// Name of the failing phase
        phase: String,
        /// Underlying cause
        #[source]
        source: PhaseError,
        /// Environment holding the writes of the phases that completed
        env: Box<ChatEnv>,
    },
}

impl RunError {
    /// Name of the phase the run stopped at.
    pub fn phase(&self) -> &str {
        match self {
            Self::Resolve { phase, .. } | Self::PhaseFailed { phase, .. } => phase,
        }
    }

    /// Underlying phase error.
    pub const fn cause(&self) -> &PhaseError {
        match self {
            Self::Resolve { source, .. } | Self::PhaseFailed { source, .. } => source,
        }
    }

    /// Environment as it stood when the run stopped.
    pub fn env(&self) -> &ChatEnv {
        match self {
            Self::Resolve { env, .. } | Self::PhaseFailed { env, .. } => env,
        }
    }

    /// Takes the partially completed environment out of the error.
    pub fn into_env(self) -> ChatEnv {
        match self {
            Self::Resolve { env, .. } | Self::PhaseFailed { env, .. } => *env,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use made_core::EnvConfig;

    #[test]
    fn test_error_display() {
        let missing = PhaseError::MissingDependency {
            phase: "coding".to_owned(),
            field: "language".to_owned(),
        };
        assert_eq!(
            missing.to_string(),
            "Phase 'coding' requires state field 'language', which is not set"
        );

        let template = PhaseError::Template {
            placeholder: "task".to_owned(),
        };
        assert_eq!(template.to_string(), "Template placeholder '{task}' has no value");
    }

    #[test]
    fn test_run_error_names_phase() {
        let error = RunError::PhaseFailed {
            phase: "coding".to_owned(),
            source: PhaseError::Generation {
                role: "Programmer".to_owned(),
                sender: Sender::Assistant,
                attempts: 3,
                source: CoreError::Timeout(100),
            },
            env: Box::new(ChatEnv::new(EnvConfig::new("snake"))),
        };
        assert_eq!(error.phase(), "coding");
        assert!(error.to_string().starts_with("Phase 'coding' failed"));
        assert!(matches!(error.cause(), PhaseError::Generation { attempts: 3, .. }));
        assert_eq!(error.into_env().config().task_prompt, "snake");
    }
}
