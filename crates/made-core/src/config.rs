//! Configuration for an orchestration run: task, model access, retry policy,
//! phase chain and per-phase overrides.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Phase chain run when the configuration does not name one.
pub const DEFAULT_CHAIN: [&str; 4] = ["demand_analysis", "language_choose", "coding", "code_review"];

/// Complete run configuration.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MadeConfig {
    /// Task and feature flags shared by every phase
    pub env: EnvConfig,
    /// Text-generation service settings
    pub model: ModelConfig,
    /// Retry policy for generation calls
    pub retry: RetryConfig,
    /// Ordered phase chain
    pub chain: ChainConfig,
    /// Per-phase overrides keyed by registered phase name
    pub phases: BTreeMap<String, PhaseOverrides>,
}

/// Global task configuration, read-only for the lifetime of a run.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Natural-language description of what to build
    pub task_prompt: String,
    /// Whether the produced software needs a graphical interface
    pub gui_design: bool,
    /// Optional longer description seeded into the shared state
    pub task_description: Option<String>,
    /// Optional project name used for output directories
    pub project_name: Option<String>,
}

impl EnvConfig {
    /// Creates a configuration for the given task.
    pub fn new(task_prompt: impl Into<String>) -> Self {
        Self {
            task_prompt: task_prompt.into(),
            ..Self::default()
        }
    }

    /// Sets the GUI design flag.
    #[must_use]
    pub fn with_gui_design(mut self, gui_design: bool) -> Self {
        self.gui_design = gui_design;
        self
    }

    /// Sets the task description.
    #[must_use]
    pub fn with_task_description(mut self, description: impl Into<String>) -> Self {
        self.task_description = Some(description.into());
        self
    }

    /// Checks that the task prompt is present.
    ///
    /// # Errors
    /// Returns an error if the task prompt is blank.
    pub fn validate(&self) -> Result<()> {
        if self.task_prompt.trim().is_empty() {
            return Err(Error::Config("env.task_prompt must not be empty".to_owned()));
        }
        Ok(())
    }
}

/// Text-generation service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model identifier sent with every request
    pub model: String,
    /// Base URL of an OpenAI-compatible chat completions API
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// API key stored directly in the config file
    pub api_key: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_owned(),
            base_url: "https://api.openai.com/v1".to_owned(),
            api_key_env: "OPENAI_API_KEY".to_owned(),
            api_key: None,
        }
    }
}

impl ModelConfig {
    /// API key from the config file, falling back to the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| env::var(&self.api_key_env).ok())
    }
}

/// Retry policy for generation calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per generation call, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay_ms: u64,
    /// Upper bound on any single backoff delay
    pub max_delay_ms: u64,
    /// Timeout applied to each generation call
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            timeout_seconds: 120,
        }
    }
}

impl RetryConfig {
    /// Checks the retry bounds.
    ///
    /// # Errors
    /// Returns an error if attempts or timeout are zero, or the delay bounds are inverted.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".to_owned()));
        }
        if self.timeout_seconds == 0 {
            return Err(Error::Config("retry.timeout_seconds must be positive".to_owned()));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::Config(format!(
                "retry.max_delay_ms ({}) is below retry.base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        Ok(())
    }
}

/// Ordered list of phase names to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Registered phase names, executed in order
    pub phases: Vec<String>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            phases: DEFAULT_CHAIN.iter().map(|&name| name.to_owned()).collect(),
        }
    }
}

/// Optional per-phase replacements for a phase's built-in parameters.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseOverrides {
    /// Maximum number of exchanges
    pub chat_turn_limit: Option<u32>,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Nucleus-sampling threshold
    pub top_p: Option<f32>,
}

impl MadeConfig {
    /// Get the default config directory path (`~/.made`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_owned()))?;
        Ok(home.join(".made"))
    }

    /// Get the default config file path (`~/.made/config.toml`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from the default location, or defaults if it does not exist.
    ///
    /// # Errors
    /// Returns an error if an existing config cannot be read or parsed
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            tracing::debug!("No config at {}, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config = Self::from_toml(&contents)?;

        tracing::debug!(
            "Loaded config from {}: model={}, api_key={}, phases={:?}",
            path.display(),
            config.model.model,
            if config.model.api_key.is_some() {
                "present"
            } else {
                "from env"
            },
            config.chain.phases
        );

        Ok(config)
    }

    /// Parse config from TOML text.
    ///
    /// # Errors
    /// Returns an error if the text is not valid TOML for this schema
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to a specific file, creating parent directories.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|error| Error::Config(format!("Failed to serialize config: {error}")))?;

        let header = "# MADE Configuration File\n\
                      # Edit this file to customize your settings\n\n";

        fs::write(path, format!("{header}{contents}"))?;
        Ok(())
    }

    /// Check every section that has hard requirements.
    ///
    /// # Errors
    /// Returns the first invalid value found
    pub fn validate(&self) -> Result<()> {
        self.env.validate()?;
        self.retry.validate()?;
        if self.chain.phases.is_empty() {
            return Err(Error::Config("chain.phases must name at least one phase".to_owned()));
        }
        Ok(())
    }

    /// Overrides configured for a phase, or none.
    pub fn overrides_for(&self, phase: &str) -> PhaseOverrides {
        self.phases.get(phase).copied().unwrap_or_default()
    }
}
