use async_trait::async_trait;

use super::{assistant_prompt, user_prompt};
use crate::codebook::{parse_files, render_listing};
use crate::env::{ChatEnv, PhaseContract, fields};
use crate::error::Result;
use crate::phase::{Phase, PhaseArgs, PhaseCore, PhaseRunResult, RegisteredPhase};
use crate::spec::PhaseSpec;

const PHASE_PROMPT: &str = "The customer's task is: {task}\n\
    Details: {description}\n\
    Product: {modality}, written in {language}.\n\
    GUI: {gui}\n\
    Write the complete implementation. Put every file's name on its own line, \
    followed by a fenced code block with the full contents of that file; \
    leave no placeholder or unimplemented function. \
    When the code is complete, reply with {marker} followed by the full set of files.";

/// Writes the implementation. Writes `codes` and `files`.
#[derive(Debug, Clone)]
pub struct CodingPhase {
    core: PhaseCore,
}

impl CodingPhase {
    /// Default parameters.
    ///
    /// # Errors
    /// Returns `InvalidSpec` only if the built-in values are inconsistent.
    pub fn default_spec() -> Result<PhaseSpec> {
        PhaseSpec::builder()
            .assistant(
                "Programmer",
                assistant_prompt("You write complete, runnable code in the agreed language."),
            )
            .user(
                "Chief Technology Officer",
                user_prompt("You guide the implementation and reject incomplete code."),
            )
            .phase_prompt(PHASE_PROMPT)
            .chat_turn_limit(1)
            .sampling(0.2, 1.0)
            .build()
    }

    /// Reads `task`, `modality`, `language` and optionally `description`.
    pub fn default_contract() -> PhaseContract {
        PhaseContract::new()
            .requires(&[fields::TASK, fields::MODALITY, fields::LANGUAGE])
            .optional(&[fields::DESCRIPTION])
            .writes(&[fields::CODES, fields::FILES])
    }
}

impl RegisteredPhase for CodingPhase {
    fn build(name: &str, args: PhaseArgs) -> Result<Self> {
        Ok(Self {
            core: PhaseCore::new(name, Self::default_spec()?, Self::default_contract(), args)?,
        })
    }
}

#[async_trait]
impl Phase for CodingPhase {
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
        let files = parse_files(&result.conclusion);
        if files.is_empty() {
            tracing::warn!(phase = self.core.name(), "conclusion contains no named files");
        }
        let codes = if files.is_empty() {
            result.conclusion.clone()
        } else {
            render_listing(&files)
        };
        let delta = self
            .core
            .delta()
            .set(fields::CODES, codes)?
            .set(fields::FILES, files)?;
        Ok(env.apply(delta))
    }
}
