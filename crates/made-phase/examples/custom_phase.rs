//! Registering a third-party phase next to the built-in ones.
//!
//! Runs offline against a scripted provider:
//!
//! ```text
//! RUST_LOG=made_phase=debug cargo run -p made-phase --example custom_phase
//! ```

use async_trait::async_trait;
use made_core::EnvConfig;
use made_phase::{
    AgentBackend, ChainRunner, ChatEnv, Phase, PhaseArgs, PhaseContract, PhaseCore, PhaseRegistry,
    PhaseRunResult, PhaseSpec, RegisteredPhase, RetryPolicy, fields,
};
use made_providers::MockProvider;
use std::error::Error;
use std::io;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Open discussion about the task, concluded into `description`.
struct DiscussionPhase {
    core: PhaseCore,
}

impl RegisteredPhase for DiscussionPhase {
    fn build(name: &str, args: PhaseArgs) -> made_phase::Result<Self> {
        let spec = PhaseSpec::builder()
            .assistant("assistant", "You are a helpful {assistant_role}")
            .user("user", "You are discussing about {task} with {assistant_role}")
            .phase_prompt("discuss about {task}, then answer with {marker} and a summary")
            .chat_turn_limit(5)
            .sampling(0.5, 0.5)
            .build()?;
        let contract = PhaseContract::new()
            .requires(&[fields::TASK])
            .writes(&[fields::DESCRIPTION]);
        Ok(Self {
            core: PhaseCore::new(name, spec, contract, args)?,
        })
    }
}

#[async_trait]
impl Phase for DiscussionPhase {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn contract(&self) -> &PhaseContract {
        self.core.contract()
    }

    fn update_phase_states(&mut self, env: &ChatEnv) -> made_phase::Result<()> {
        self.core.pull(env)
    }

    async fn run(&mut self) -> made_phase::Result<PhaseRunResult> {
        self.core.run().await
    }

    fn update_env_states<'env>(
        &self,
        env: &'env mut ChatEnv,
        result: &PhaseRunResult,
    ) -> made_phase::Result<&'env mut ChatEnv> {
        let delta = self
            .core
            .delta()
            .set(fields::DESCRIPTION, result.conclusion.as_str())?;
        Ok(env.apply(delta))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("made_phase=info")),
        )
        .with_writer(io::stderr)
        .init();

    let mut registry = PhaseRegistry::with_builtin_phases()?;
    let name = registry.register_type::<DiscussionPhase>(None)?;

    let provider = MockProvider::new("mock")
        .with_script(
            "helpful",
            [
                "Multiple agents can split a task by role.",
                "<CONCLUSION> Agents with distinct roles review each other's work.",
            ],
        )
        .with_default_response("Can you say how they coordinate?");
    let backend = AgentBackend {
        provider: Arc::new(provider),
        model: "mock".to_owned(),
        retry: RetryPolicy::default(),
    };

    let runner = ChainRunner::new(Arc::new(registry), move |_| PhaseArgs::new(backend.clone()));
    let env = runner
        .run(ChatEnv::new(EnvConfig::new("multi llm agents")), &[name.as_str()])
        .await?;

    let record = &env.records()[0];
    tracing::info!(
        phase = %record.phase,
        exchanges = record.exchanges,
        description = env.state().text(fields::DESCRIPTION).unwrap_or_default(),
        "discussion concluded"
    );
    Ok(())
}
