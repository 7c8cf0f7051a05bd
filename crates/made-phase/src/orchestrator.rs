//! Sequential execution of a phase chain against one environment.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::result::Result as StdResult;
use std::sync::Arc;
use tokio::fs as async_fs;
use uuid::Uuid;

use crate::env::{ChatEnv, PhaseRecord};
use crate::error::{Result, RunError};
use crate::phase::{Phase, PhaseArgs, PhaseRunResult};
use crate::registry::PhaseRegistry;

/// Produces construction arguments for a phase by name.
pub type PhaseArgsFactory = Arc<dyn Fn(&str) -> PhaseArgs + Send + Sync>;

/// Drives an ordered list of phases to completion.
///
/// Phases run strictly one after another, so the environment has exactly one
/// writer at any time. A failing phase aborts the run; the environment is not
/// rolled back.
#[derive(Clone)]
pub struct ChainRunner {
    registry: Arc<PhaseRegistry>,
    args: PhaseArgsFactory,
    transcript_dir: Option<PathBuf>,
}

impl fmt::Debug for ChainRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainRunner")
            .field("registry", &self.registry)
            .field("transcript_dir", &self.transcript_dir)
            .finish_non_exhaustive()
    }
}

/// Transcript file contents for one executed phase.
#[derive(Serialize)]
struct TranscriptFile<'run> {
    run_id: Uuid,
    position: usize,
    phase: &'run str,
    #[serde(flatten)]
    result: &'run PhaseRunResult,
}

impl ChainRunner {
    /// Creates a runner resolving phases from `registry`.
    pub fn new<F>(registry: Arc<PhaseRegistry>, args: F) -> Self
    where
        F: Fn(&str) -> PhaseArgs + Send + Sync + 'static,
    {
        Self {
            registry,
            args: Arc::new(args),
            transcript_dir: None,
        }
    }

    /// Writes each phase's transcript as JSON under `dir`.
    #[must_use]
    pub fn with_transcript_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.transcript_dir = Some(dir.into());
        self
    }

    /// Runs `phases` in order and returns the final environment.
    ///
    /// Every name is resolved before the first phase starts, so an unknown
    /// name fails the run before any agent exists.
    ///
    /// # Errors
    /// Returns `RunError::Resolve` if a name cannot be resolved and
    /// `RunError::PhaseFailed` naming the phase that failed while executing.
    /// Both carry the environment as it stood when the run stopped.
    pub async fn run<S: AsRef<str>>(
        &self,
        mut env: ChatEnv,
        phases: &[S],
    ) -> StdResult<ChatEnv, RunError> {
        let names: Vec<&str> = phases.iter().map(AsRef::as_ref).collect();
        tracing::info!(run_id = %env.run_id(), phases = ?names, "starting phase chain");

        let mut resolved: Vec<Box<dyn Phase>> = Vec::with_capacity(names.len());
        for &name in &names {
            match self.registry.resolve(name, (self.args)(name)) {
                Ok(phase) => resolved.push(phase),
                Err(source) => {
                    tracing::error!(phase = name, error = %source, "phase could not be resolved");
                    return Err(RunError::Resolve {
                        phase: name.to_owned(),
                        source,
                        env: Box::new(env),
                    });
                }
            }
        }

        for (position, mut phase) in resolved.into_iter().enumerate() {
            let name = phase.name().to_owned();
            if let Err(source) = self.run_phase(&mut env, phase.as_mut(), position).await {
                tracing::error!(
                    phase = %name,
                    error = %source,
                    completed = env.records().len(),
                    "phase failed"
                );
                return Err(RunError::PhaseFailed {
                    phase: name,
                    source,
                    env: Box::new(env),
                });
            }
        }

        tracing::info!(
            run_id = %env.run_id(),
            phases = env.records().len(),
            "phase chain finished"
        );
        Ok(env)
    }

    /// Pull, run, then push. The environment is only touched by the push, so
    /// a failure anywhere before it leaves the environment as it was.
    async fn run_phase(
        &self,
        env: &mut ChatEnv,
        phase: &mut dyn Phase,
        position: usize,
    ) -> Result<()> {
        let contract = phase.contract();
        tracing::info!(
            phase = phase.name(),
            kind = phase.kind(),
            requires = ?contract.required_fields(),
            optional = ?contract.optional_fields(),
            writes = ?contract.written_fields(),
            "phase started"
        );

        phase.update_phase_states(env)?;
        let result = phase.run().await?;
        if result.is_best_effort() {
            tracing::warn!(
                phase = phase.name(),
                exchanges = result.exchanges,
                "phase ended by turn limit; conclusion is best-effort"
            );
        }

        if let Some(dir) = &self.transcript_dir {
            write_transcript(dir, env.run_id(), position, phase.name(), &result).await?;
        }

        phase.update_env_states(env, &result)?;
        env.record(PhaseRecord {
            phase: phase.name().to_owned(),
            termination: result.termination,
            exchanges: result.exchanges,
            usage: result.usage,
        });

        tracing::info!(
            phase = phase.name(),
            termination = ?result.termination,
            exchanges = result.exchanges,
            tokens = result.usage.total(),
            "phase finished"
        );
        Ok(())
    }
}

async fn write_transcript(
    dir: &Path,
    run_id: Uuid,
    position: usize,
    phase: &str,
    result: &PhaseRunResult,
) -> Result<()> {
    async_fs::create_dir_all(dir).await?;
    let file = TranscriptFile {
        run_id,
        position,
        phase,
        result,
    };
    let json = serde_json::to_string_pretty(&file)?;
    let path = dir.join(format!("{position:02}_{phase}.json"));
    async_fs::write(&path, json).await?;
    tracing::debug!(path = %path.display(), "wrote transcript");
    Ok(())
}
