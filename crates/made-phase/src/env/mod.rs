//! The shared environment of one orchestration run.
//!
//! [`ChatEnv`] holds the immutable [`EnvConfig`] and the mutable [`EnvState`].
//! Phases read it freely but mutate it only through [`ChatEnv::apply`] with a
//! [`StateDelta`] built from their declared [`PhaseContract`], so every write
//! is attributable to exactly one phase.

mod state;

pub use state::{EnvState, PhaseContract, ProducedFile, StateDelta, StateValue, fields};

use chrono::{DateTime, Utc};
use made_core::{EnvConfig, TokenUsage};
use serde::Serialize;
use uuid::Uuid;

use crate::termination::Termination;

/// Record of one applied state delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedDelta {
    /// Phase that pushed the delta
    pub phase: String,
    /// Fields it wrote, in order
    pub fields: Vec<String>,
    /// When it was applied
    pub applied_at: DateTime<Utc>,
}

/// Outcome summary of one executed phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseRecord {
    /// Registered phase name
    pub phase: String,
    /// How the dialogue ended
    pub termination: Termination,
    /// Completed user/assistant exchanges
    pub exchanges: u32,
    /// Tokens spent by both agents
    pub usage: TokenUsage,
}

/// Shared configuration and mutable state for one run.
#[derive(Debug, Clone)]
pub struct ChatEnv {
    run_id: Uuid,
    config: EnvConfig,
    state: EnvState,
    history: Vec<AppliedDelta>,
    records: Vec<PhaseRecord>,
}

impl ChatEnv {
    /// Creates the environment for a run, seeding `task` and, when configured,
    /// `description` and `project_name`.
    pub fn new(config: EnvConfig) -> Self {
        let mut state = EnvState::default();
        state.insert(fields::TASK.to_owned(), config.task_prompt.clone().into());
        if let Some(description) = &config.task_description {
            state.insert(fields::DESCRIPTION.to_owned(), description.clone().into());
        }
        if let Some(project_name) = &config.project_name {
            state.insert(fields::PROJECT_NAME.to_owned(), project_name.clone().into());
        }

        Self {
            run_id: Uuid::new_v4(),
            config,
            state,
            history: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Unique id of this run.
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Read-only run configuration.
    pub const fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// Current shared state.
    pub const fn state(&self) -> &EnvState {
        &self.state
    }

    /// Prompt hint derived from the GUI design flag.
    pub const fn gui_requirement(&self) -> &'static str {
        if self.config.gui_design {
            "need gui design."
        } else {
            "no need gui design."
        }
    }

    /// Applies a phase's writes to the shared state.
    ///
    /// This is the only mutation path for [`EnvState`]; fields the delta does
    /// not name are left untouched.
    pub fn apply(&mut self, delta: StateDelta) -> &mut Self {
        let phase = delta.phase().to_owned();
        let written = delta.field_names();
        tracing::debug!(phase = %phase, fields = ?written, "applying state delta");

        for (field, value) in delta.into_changes() {
            self.state.insert(field, value);
        }
        self.history.push(AppliedDelta {
            phase,
            fields: written,
            applied_at: Utc::now(),
        });
        self
    }

    /// Every delta applied so far, oldest first.
    pub fn history(&self) -> &[AppliedDelta] {
        &self.history
    }

    /// Summaries of the phases executed so far.
    pub fn records(&self) -> &[PhaseRecord] {
        &self.records
    }

    /// Files produced by the run.
    pub fn produced_files(&self) -> &[ProducedFile] {
        self.state.files()
    }

    /// Name used for output directories: configured name, else a slug of the task.
    pub fn project_name(&self) -> String {
        if let Some(name) = self.state.text(fields::PROJECT_NAME)
            && !name.trim().is_empty()
        {
            return name.trim().to_owned();
        }
        let slug = self
            .config
            .task_prompt
            .split_whitespace()
            .take(4)
            .map(|word| {
                word.chars()
                    .filter(char::is_ascii_alphanumeric)
                    .collect::<String>()
                    .to_ascii_lowercase()
            })
            .filter(|word| !word.is_empty())
            .collect::<Vec<_>>()
            .join("_");
        if slug.is_empty() {
            format!("project_{}", self.run_id.simple())
        } else {
            slug
        }
    }

    pub(crate) fn record(&mut self, record: PhaseRecord) {
        self.records.push(record);
    }
}
