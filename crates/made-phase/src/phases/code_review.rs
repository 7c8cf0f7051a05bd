use async_trait::async_trait;

use super::{assistant_prompt, user_prompt};
use crate::env::{ChatEnv, PhaseContract, fields};
use crate::error::Result;
use crate::phase::{Phase, PhaseArgs, PhaseCore, PhaseRunResult, RegisteredPhase};
use crate::spec::PhaseSpec;

const PHASE_PROMPT: &str = "The customer's task is: {task}\n\
    The code is written in {language}:\n\
    {codes}\n\
    Review the code above. Check that every referenced class and function is \
    implemented, that nothing required by the task is missing, and that the \
    code would run. Reply with {marker} followed by your most important comment \
    and how to fix it, or with {marker} Finished if the code needs no changes.";

/// Reviews the generated code. Writes `review_comments`.
#[derive(Debug, Clone)]
pub struct CodeReviewPhase {
    core: PhaseCore,
}

impl CodeReviewPhase {
    /// Default parameters.
    ///
    /// # Errors
    /// Returns `InvalidSpec` only if the built-in values are inconsistent.
    pub fn default_spec() -> Result<PhaseSpec> {
        PhaseSpec::builder()
            .assistant(
                "Code Reviewer",
                assistant_prompt("You find defects in code and propose precise fixes."),
            )
            .user(
                "Programmer",
                user_prompt("You wrote the code and answer the reviewer's questions."),
            )
            .phase_prompt(PHASE_PROMPT)
            .chat_turn_limit(1)
            .sampling(0.2, 1.0)
            .build()
    }

    /// Reads `task`, `language` and `codes`, writes `review_comments`.
    pub fn default_contract() -> PhaseContract {
        PhaseContract::new()
            .requires(&[fields::TASK, fields::LANGUAGE, fields::CODES])
            .writes(&[fields::REVIEW_COMMENTS])
    }
}

impl RegisteredPhase for CodeReviewPhase {
    fn build(name: &str, args: PhaseArgs) -> Result<Self> {
        Ok(Self {
            core: PhaseCore::new(name, Self::default_spec()?, Self::default_contract(), args)?,
        })
    }
}

#[async_trait]
impl Phase for CodeReviewPhase {
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
            .set(fields::REVIEW_COMMENTS, result.conclusion.trim())?;
        Ok(env.apply(delta))
    }
}
