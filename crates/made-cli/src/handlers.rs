//! Command handlers for CLI operations

use anyhow::{Context as _, Error, Result, bail};
use made_core::{MadeConfig, ModelProvider};
use made_phase::codebook::is_safe_path;
use made_phase::{
    AgentBackend, ChainRunner, ChatEnv, PhaseArgs, PhaseRegistry, ProducedFile, RetryPolicy,
};
use made_providers::{MockProvider, OpenAiProvider};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs as async_fs;
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

use crate::cli::RunArgs;

/// Initialize tracing to stderr so stdout stays free for command output.
pub fn init_logging() {
    Registry::default()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "made_phase=info,made_cli=info".into()),
        )
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_level(true),
        )
        .init();
}

/// Load the configuration for a run and fold the command-line flags into it.
///
/// # Errors
/// Returns an error if an explicitly named config file cannot be read
pub fn resolve_config(args: &RunArgs) -> Result<MadeConfig> {
    let mut config = match &args.config {
        Some(path) => MadeConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => MadeConfig::load_or_default().unwrap_or_else(|error| {
            tracing::warn!("Failed to load config from ~/.made/config.toml: {error}");
            tracing::warn!("Using default configuration");
            MadeConfig::default()
        }),
    };

    if let Some(task) = &args.task {
        config.env.task_prompt.clone_from(task);
    }
    if let Some(description) = &args.description {
        config.env.task_description = Some(description.clone());
    }
    if let Some(name) = &args.name {
        config.env.project_name = Some(name.clone());
    }
    if args.gui {
        config.env.gui_design = true;
    }
    if !args.phases.is_empty() {
        config.chain.phases.clone_from(&args.phases);
    }
    Ok(config)
}

/// Scripted provider answering every built-in phase without network access.
pub fn dry_run_provider() -> MockProvider {
    MockProvider::new("dry-run")
        .with_response("product modality", "<CONCLUSION> Application")
        .with_response("Choose the programming language", "<CONCLUSION> Python")
        .with_response(
            "Write the complete implementation",
            "<CONCLUSION>\nmain.py\n```python\ndef main():\n    print(\"hello from made\")\n\n\nif __name__ == \"__main__\":\n    main()\n```\n",
        )
        .with_response("Review the code", "<CONCLUSION> Finished")
        .with_default_response("<CONCLUSION> Done")
}

/// Handle `made run`
///
/// # Errors
/// Returns an error if the configuration is invalid, the project name would
/// leave the output directory, the provider cannot be created, any phase
/// fails, or the generated files cannot be written. When a phase fails, files
/// produced by the phases before it are still written.
pub async fn handle_run(args: RunArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    config.validate().context("Invalid configuration")?;

    let provider: Arc<dyn ModelProvider> = if args.dry_run {
        tracing::info!("Dry run: using scripted provider");
        Arc::new(dry_run_provider())
    } else {
        Arc::new(
            OpenAiProvider::from_config(&config.model)
                .context("Failed to create model provider")?,
        )
    };
    let backend = AgentBackend {
        provider,
        model: config.model.model.clone(),
        retry: RetryPolicy::from_config(&config.retry),
    };

    let registry = Arc::new(PhaseRegistry::with_builtin_phases()?);
    let overrides = config.phases.clone();
    let env = ChatEnv::new(config.env.clone());
    let project_dir = project_dir(&args.output, &env)?;

    let mut runner = ChainRunner::new(registry, move |name| {
        PhaseArgs::new(backend.clone())
            .with_overrides(overrides.get(name).copied().unwrap_or_default())
    });
    if args.transcripts {
        runner = runner.with_transcript_dir(project_dir.join("transcripts"));
    }

    let env = match runner.run(env, &config.chain.phases).await {
        Ok(env) => env,
        Err(error) => {
            let partial = error.env();
            log_records(partial);
            tracing::warn!(
                failed = error.phase(),
                completed = partial.records().len(),
                fields = ?partial.state().field_names().collect::<Vec<_>>(),
                "run stopped early"
            );
            if !partial.produced_files().is_empty() {
                let written = write_files(&project_dir, partial.produced_files()).await?;
                tracing::warn!(
                    project = %project_dir.display(),
                    files = written.len(),
                    "wrote files from completed phases"
                );
            }
            return Err(Error::new(error).context("Phase chain did not complete"));
        }
    };

    log_records(&env);
    let written = write_files(&project_dir, env.produced_files()).await?;
    tracing::info!(
        project = %project_dir.display(),
        files = written.len(),
        "run complete"
    );
    Ok(())
}

fn log_records(env: &ChatEnv) {
    for record in env.records() {
        tracing::info!(
            phase = %record.phase,
            termination = ?record.termination,
            exchanges = record.exchanges,
            tokens = record.usage.total(),
            "phase summary"
        );
    }
}

/// Directory the project is written to under `output`.
///
/// # Errors
/// Returns an error if the project name is absolute or climbs out of `output`
pub fn project_dir(output: &Path, env: &ChatEnv) -> Result<PathBuf> {
    let name = env.project_name();
    if !is_safe_path(&name) {
        bail!("Unsafe project name '{name}': it must stay inside {}", output.display());
    }
    Ok(output.join(name))
}

/// Write produced files under `root`, returning the paths written.
///
/// Paths that are absolute or climb out of `root` are skipped.
///
/// # Errors
/// Returns an error if a directory or file cannot be created
pub async fn write_files(root: &Path, files: &[ProducedFile]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(files.len());
    for file in files {
        if !is_safe_path(&file.path) {
            tracing::warn!(path = %file.path, "skipping file with unsafe path");
            continue;
        }
        let path = root.join(&file.path);
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        async_fs::write(&path, &file.content)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::debug!(path = %path.display(), "wrote file");
        written.push(path);
    }
    Ok(written)
}

/// Handle `made phases`
///
/// # Errors
/// Returns an error if the registry cannot be built or stdout is closed
pub fn handle_phases() -> Result<()> {
    let registry = PhaseRegistry::with_builtin_phases()?;
    let mut stdout = io::stdout().lock();
    for name in registry.names() {
        writeln!(stdout, "{name}")?;
    }
    Ok(())
}

/// Handle `made init-config`
///
/// # Errors
/// Returns an error if the file exists without `force` or cannot be written
pub fn handle_init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => MadeConfig::config_path()?,
    };
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    MadeConfig::default()
        .save_to_file(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote default configuration");
    Ok(())
}
