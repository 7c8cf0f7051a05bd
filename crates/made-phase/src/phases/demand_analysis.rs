use async_trait::async_trait;

use super::{assistant_prompt, user_prompt};
use crate::env::{ChatEnv, PhaseContract, fields};
use crate::error::Result;
use crate::phase::{Phase, PhaseArgs, PhaseCore, PhaseRunResult, RegisteredPhase};
use crate::spec::PhaseSpec;

const PHASE_PROMPT: &str = "The customer's task is: {task}\n\
    Decide which product modality fits the task best: for example an application, \
    a website, a dashboard, a document or a command-line tool. \
    When we agree, reply with {marker} followed only by the modality.";

/// Settles the product modality with the CEO. Writes `modality`.
#[derive(Debug, Clone)]
pub struct DemandAnalysisPhase {
    core: PhaseCore,
}

impl DemandAnalysisPhase {
    /// Default parameters.
    ///
    /// # Errors
    /// Never fails for the built-in values; kept fallible for overrides.
    pub fn default_spec() -> Result<PhaseSpec> {
        PhaseSpec::builder()
            .assistant(
                "Chief Product Officer",
                assistant_prompt("You decide what kind of product satisfies the customer."),
            )
            .user(
                "Chief Executive Officer",
                user_prompt("You make sure the product direction serves the customer."),
            )
            .phase_prompt(PHASE_PROMPT)
            .chat_turn_limit(10)
            .sampling(0.2, 1.0)
            .build()
    }

    /// Reads `task`, writes `modality`.
    pub fn default_contract() -> PhaseContract {
        PhaseContract::new()
            .requires(&[fields::TASK])
            .writes(&[fields::MODALITY])
    }
}

impl RegisteredPhase for DemandAnalysisPhase {
    fn build(name: &str, args: PhaseArgs) -> Result<Self> {
        Ok(Self {
            core: PhaseCore::new(name, Self::default_spec()?, Self::default_contract(), args)?,
        })
    }
}

#[async_trait]
impl Phase for DemandAnalysisPhase {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn contract(&self) -> &PhaseContract {
        self.core.contract()
    }

    fn update_phase_states(&mut self, env: &ChatEnv) -> Result<()> {
        self.core.pull(env)
    }

    async fn run(&mut self) -> Result<PhaseRunResult> {
        self.core.run().await
    }

    fn update_env_states<'env>(
        &self,
        env: &'env mut ChatEnv,
        result: &PhaseRunResult,
    ) -> Result<&'env mut ChatEnv> {
        let modality = first_line(&result.conclusion);
        let delta = self.core.delta().set(fields::MODALITY, modality)?;
        Ok(env.apply(delta))
    }
}

/// First non-empty line, without trailing punctuation.
pub(super) fn first_line(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .trim_end_matches(['.', '!'])
        .to_owned()
}
