//! The phase contract and the machinery shared by concrete phases.

mod dialogue;

pub use dialogue::run_dialogue;

use async_trait::async_trait;
use made_core::{Message, PhaseOverrides, TokenUsage};
use serde::Serialize;
use std::any::type_name;
use std::fmt;

use crate::agent::AgentBackend;
use crate::env::{ChatEnv, PhaseContract, StateDelta};
use crate::error::{PhaseError, Result};
use crate::spec::PhaseSpec;
use crate::template::TemplateValues;
use crate::termination::Termination;

/// Result of one phase's dialogue, consumed by its environment push.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseRunResult {
    /// Extracted conclusion
    pub conclusion: String,
    /// How the dialogue ended
    pub termination: Termination,
    /// Completed user/assistant exchanges
    pub exchanges: u32,
    /// Every message in order, starting with the user's opening
    pub transcript: Vec<Message>,
    /// Tokens spent by both agents
    pub usage: TokenUsage,
}

impl PhaseRunResult {
    /// Whether the conclusion was forced by the turn limit.
    pub const fn is_best_effort(&self) -> bool {
        self.termination.is_best_effort()
    }
}

/// Construction arguments handed to every phase constructor.
#[derive(Clone)]
pub struct PhaseArgs {
    /// Generation backend for the phase's agents
    pub backend: AgentBackend,
    /// Configured parameter overrides
    pub overrides: PhaseOverrides,
}

impl PhaseArgs {
    /// Arguments without overrides.
    pub fn new(backend: AgentBackend) -> Self {
        Self {
            backend,
            overrides: PhaseOverrides::default(),
        }
    }

    /// Sets parameter overrides.
    #[must_use]
    pub fn with_overrides(mut self, overrides: PhaseOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// A named unit of two-agent work over the shared environment.
///
/// The orchestrator calls the three lifecycle methods in order, once each:
/// pull, run, push. `update_env_states` is the only place a phase may
/// change the environment.
#[async_trait]
pub trait Phase: Send + Sync {
    /// Registered name.
    fn name(&self) -> &str;

    /// Concrete implementation type, for diagnostics.
    fn kind(&self) -> &'static str {
        type_name::<Self>()
    }

    /// Fields this phase reads and writes.
    fn contract(&self) -> &PhaseContract;

    /// Copies the fields the phase needs out of the environment.
    ///
    /// # Errors
    /// Returns `MissingDependency` if a required field is absent.
    fn update_phase_states(&mut self, env: &ChatEnv) -> Result<()>;

    /// Runs the bounded dialogue.
    ///
    /// # Errors
    /// Returns `NotPrepared` if states were not pulled, or a generation error.
    async fn run(&mut self) -> Result<PhaseRunResult>;

    /// Pushes the conclusion and derived artifacts into the environment.
    ///
    /// # Errors
    /// Returns `UndeclaredWrite` if the phase writes outside its contract.
    fn update_env_states<'env>(
        &self,
        env: &'env mut ChatEnv,
        result: &PhaseRunResult,
    ) -> Result<&'env mut ChatEnv>;
}

/// Phases the registry can construct by type.
pub trait RegisteredPhase: Phase + Sized + 'static {
    /// Builds the phase under its registered `name`.
    ///
    /// # Errors
    /// Returns `InvalidSpec` if the configured overrides are out of range.
    fn build(name: &str, args: PhaseArgs) -> Result<Self>;
}

/// Shared state and behaviour for spec-driven phases.
///
/// Concrete phases own a `PhaseCore` and delegate the generic parts of the
/// lifecycle to it, adding their own template values and env writes.
#[derive(Clone)]
pub struct PhaseCore {
    name: String,
    spec: PhaseSpec,
    contract: PhaseContract,
    backend: AgentBackend,
    values: Option<TemplateValues>,
}

impl fmt::Debug for PhaseCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseCore")
            .field("name", &self.name)
            .field("spec", &self.spec)
            .field("contract", &self.contract)
            .field("prepared", &self.values.is_some())
            .finish_non_exhaustive()
    }
}

impl PhaseCore {
    /// Creates the core, applying configured overrides to `spec`.
    ///
    /// # Errors
    /// Returns `InvalidSpec` if an override is out of range.
    pub fn new(
        name: impl Into<String>,
        spec: PhaseSpec,
        contract: PhaseContract,
        args: PhaseArgs,
    ) -> Result<Self> {
        let name = name.into();
        let spec = spec.with_overrides(&args.overrides)?;
        Ok(Self {
            name,
            spec,
            contract,
            backend: args.backend,
            values: None,
        })
    }

    /// Registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Effective spec after overrides.
    pub const fn spec(&self) -> &PhaseSpec {
        &self.spec
    }

    /// Declared field contract.
    pub const fn contract(&self) -> &PhaseContract {
        &self.contract
    }

    /// Template values pulled so far, if any.
    pub const fn values(&self) -> Option<&TemplateValues> {
        self.values.as_ref()
    }

    /// Pulls every declared field plus role names and the GUI hint.
    ///
    /// # Errors
    /// Returns `MissingDependency` for the first absent required field.
    pub fn pull(&mut self, env: &ChatEnv) -> Result<()> {
        let mut values = self.contract.pull(&self.name, env.state())?;
        values.insert("assistant_role".to_owned(), self.spec.assistant().name.clone());
        values.insert("user_role".to_owned(), self.spec.user().name.clone());
        values.insert("gui".to_owned(), env.gui_requirement().to_owned());
        values.insert("marker".to_owned(), self.spec.termination().marker().to_owned());
        self.values = Some(values);
        Ok(())
    }

    /// Adds a phase-specific template value after [`PhaseCore::pull`].
    ///
    /// # Errors
    /// Returns `NotPrepared` if called before `pull`.
    pub fn insert_value(&mut self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let values = self
            .values
            .as_mut()
            .ok_or_else(|| PhaseError::NotPrepared(self.name.clone()))?;
        values.insert(key.into(), value.into());
        Ok(())
    }

    /// Runs the dialogue with the pulled values.
    ///
    /// # Errors
    /// Returns `NotPrepared` if called before `pull`, or any dialogue error.
    pub async fn run(&self) -> Result<PhaseRunResult> {
        let values = self
            .values
            .as_ref()
            .ok_or_else(|| PhaseError::NotPrepared(self.name.clone()))?;
        run_dialogue(&self.name, &self.spec, values, &self.backend).await
    }

    /// Starts a delta restricted to the declared writes.
    pub fn delta(&self) -> StateDelta {
        self.contract.delta(self.name.clone())
    }
}
