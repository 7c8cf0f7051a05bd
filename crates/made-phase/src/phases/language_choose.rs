use async_trait::async_trait;

use super::demand_analysis::first_line;
use super::{assistant_prompt, user_prompt};
use crate::env::{ChatEnv, PhaseContract, fields};
use crate::error::Result;
use crate::phase::{Phase, PhaseArgs, PhaseCore, PhaseRunResult, RegisteredPhase};
use crate::spec::PhaseSpec;

const PHASE_PROMPT: &str = "The customer's task is: {task}\n\
    We are building it as: {modality}\n\
    Choose the programming language that implements this product best. \
    When we agree, reply with {marker} followed only by the language name.";

/// Picks the implementation language. Writes `language`.
#[derive(Debug, Clone)]
pub struct LanguageChoosePhase {
    core: PhaseCore,
}

impl LanguageChoosePhase {
    /// Default parameters.
    ///
    /// # Errors
    /// Returns `InvalidSpec` only if the built-in values are inconsistent.
    pub fn default_spec() -> Result<PhaseSpec> {
        PhaseSpec::builder()
            .assistant(
                "Chief Technology Officer",
                assistant_prompt("You own the technical decisions of the company."),
            )
            .user(
                "Chief Executive Officer",
                user_prompt("You make sure technical choices fit the product."),
            )
            .phase_prompt(PHASE_PROMPT)
            .chat_turn_limit(10)
            .sampling(0.2, 1.0)
            .build()
    }

    /// Reads `task` and `modality`, writes `language`.
    pub fn default_contract() -> PhaseContract {
        PhaseContract::new()
            .requires(&[fields::TASK, fields::MODALITY])
            .writes(&[fields::LANGUAGE])
    }
}

impl RegisteredPhase for LanguageChoosePhase {
    fn build(name: &str, args: PhaseArgs) -> Result<Self> {
        Ok(Self {
            core: PhaseCore::new(name, Self::default_spec()?, Self::default_contract(), args)?,
        })
    }
}

#[async_trait]
impl Phase for LanguageChoosePhase {
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
        let delta = self
            .core
            .delta()
            .set(fields::LANGUAGE, first_line(&result.conclusion))?;
        Ok(env.apply(delta))
    }
}
