//! Immutable per-phase parameters.

use made_core::PhaseOverrides;

use crate::error::{PhaseError, Result};
use crate::termination::TerminationSpec;

/// Sampling parameters passed with every generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    /// Temperature in `[0, 1]`
    pub temperature: f32,
    /// Nucleus-sampling threshold in `[0, 1]`
    pub top_p: f32,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_p: 1.0,
        }
    }
}

/// One participant's identity and role prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSpec {
    /// Role name, e.g. `Programmer`
    pub name: String,
    /// System prompt template for the role
    pub prompt: String,
}

/// Validated parameters of a phase. Never mutated during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSpec {
    assistant: RoleSpec,
    user: RoleSpec,
    phase_prompt: String,
    chat_turn_limit: u32,
    sampling: Sampling,
    termination: TerminationSpec,
}

impl PhaseSpec {
    /// Starts a builder.
    pub fn builder() -> PhaseSpecBuilder {
        PhaseSpecBuilder::default()
    }

    /// Assistant persona.
    pub const fn assistant(&self) -> &RoleSpec {
        &self.assistant
    }

    /// User persona.
    pub const fn user(&self) -> &RoleSpec {
        &self.user
    }

    /// Phase prompt template; rendered, it is the user's opening instruction.
    pub fn phase_prompt(&self) -> &str {
        &self.phase_prompt
    }

    /// Maximum number of user/assistant exchanges.
    pub const fn chat_turn_limit(&self) -> u32 {
        self.chat_turn_limit
    }

    /// Sampling parameters.
    pub const fn sampling(&self) -> Sampling {
        self.sampling
    }

    /// Termination predicate.
    pub const fn termination(&self) -> &TerminationSpec {
        &self.termination
    }

    /// Returns a copy with configured overrides applied, validated again.
    ///
    /// # Errors
    /// Returns `InvalidSpec` if an override is out of range.
    pub fn with_overrides(&self, overrides: &PhaseOverrides) -> Result<Self> {
        let mut spec = self.clone();
        if let Some(limit) = overrides.chat_turn_limit {
            spec.chat_turn_limit = limit;
        }
        if let Some(temperature) = overrides.temperature {
            spec.sampling.temperature = temperature;
        }
        if let Some(top_p) = overrides.top_p {
            spec.sampling.top_p = top_p;
        }
        spec.validate()?;
        Ok(spec)
    }

    fn validate(&self) -> Result<()> {
        for role in [&self.assistant, &self.user] {
            if role.name.trim().is_empty() {
                return Err(PhaseError::InvalidSpec("role names must not be empty".to_owned()));
            }
        }
        if self.assistant.name == self.user.name {
            return Err(PhaseError::InvalidSpec(format!(
                "assistant and user roles must differ (both '{}')",
                self.assistant.name
            )));
        }
        if self.phase_prompt.trim().is_empty() {
            return Err(PhaseError::InvalidSpec("phase prompt must not be empty".to_owned()));
        }
        if self.chat_turn_limit == 0 {
            return Err(PhaseError::InvalidSpec(
                "chat_turn_limit must be a positive integer".to_owned(),
            ));
        }
        check_unit_interval("temperature", self.sampling.temperature)?;
        check_unit_interval("top_p", self.sampling.top_p)?;
        Ok(())
    }
}

fn check_unit_interval(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PhaseError::InvalidSpec(format!("{name} must be within [0, 1], got {value}")))
    }
}

/// Builder for [`PhaseSpec`]; every required field must be set explicitly.
#[derive(Debug, Clone, Default)]
pub struct PhaseSpecBuilder {
    assistant: Option<RoleSpec>,
    user: Option<RoleSpec>,
    phase_prompt: Option<String>,
    chat_turn_limit: Option<u32>,
    sampling: Sampling,
    termination: TerminationSpec,
}

impl PhaseSpecBuilder {
    /// Sets the assistant persona.
    #[must_use]
    pub fn assistant(mut self, name: impl Into<String>, prompt: impl Into<String>) -> Self {
        self.assistant = Some(RoleSpec {
            name: name.into(),
            prompt: prompt.into(),
        });
        self
    }

    /// Sets the user persona.
    #[must_use]
    pub fn user(mut self, name: impl Into<String>, prompt: impl Into<String>) -> Self {
        self.user = Some(RoleSpec {
            name: name.into(),
            prompt: prompt.into(),
        });
        self
    }

    /// Sets the phase prompt template.
    #[must_use]
    pub fn phase_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.phase_prompt = Some(prompt.into());
        self
    }

    /// Sets the turn limit.
    #[must_use]
    pub fn chat_turn_limit(mut self, limit: u32) -> Self {
        self.chat_turn_limit = Some(limit);
        self
    }

    /// Sets temperature and top-p.
    #[must_use]
    pub fn sampling(mut self, temperature: f32, top_p: f32) -> Self {
        self.sampling = Sampling { temperature, top_p };
        self
    }

    /// Sets the termination predicate.
    #[must_use]
    pub fn termination(mut self, termination: TerminationSpec) -> Self {
        self.termination = termination;
        self
    }

    /// Validates and builds the spec.
    ///
    /// # Errors
    /// Returns `InvalidSpec` naming the first missing or invalid field.
    pub fn build(self) -> Result<PhaseSpec> {
        let missing = |field: &str| PhaseError::InvalidSpec(format!("{field} is required"));
        let spec = PhaseSpec {
            assistant: self.assistant.ok_or_else(|| missing("assistant role"))?,
            user: self.user.ok_or_else(|| missing("user role"))?,
            phase_prompt: self.phase_prompt.ok_or_else(|| missing("phase prompt"))?,
            chat_turn_limit: self.chat_turn_limit.ok_or_else(|| missing("chat_turn_limit"))?,
            sampling: self.sampling,
            termination: self.termination,
        };
        spec.validate()?;
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> PhaseSpecBuilder {
        PhaseSpec::builder()
            .assistant("Programmer", "You are {assistant_role}.")
            .user("CTO", "You are {user_role}.")
            .phase_prompt("Write {task}.")
            .chat_turn_limit(3)
    }

    #[test]
    fn test_build_valid_spec() {
        let spec = builder().sampling(0.5, 0.9).build().unwrap();
        assert_eq!(spec.assistant().name, "Programmer");
        assert_eq!(spec.chat_turn_limit(), 3);
        assert!((spec.sampling().top_p - 0.9).abs() < f32::EPSILON);
        assert_eq!(spec.termination().marker(), "<CONCLUSION>");
    }

    #[test]
    fn test_missing_field_rejected() {
        let result = PhaseSpec::builder()
            .assistant("Programmer", "p")
            .user("CTO", "u")
            .chat_turn_limit(1)
            .build();
        assert!(matches!(result, Err(PhaseError::InvalidSpec(ref msg)) if msg.contains("phase prompt")));
    }

    #[test]
    fn test_zero_turn_limit_rejected() {
        assert!(builder().chat_turn_limit(0).build().is_err());
    }

    #[test]
    fn test_sampling_range_checked() {
        assert!(builder().sampling(1.5, 1.0).build().is_err());
        assert!(builder().sampling(0.5, -0.1).build().is_err());
    }

    #[test]
    fn test_identical_roles_rejected() {
        let result = builder().user("Programmer", "u").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides_are_validated() {
        let spec = builder().build().unwrap();
        let updated = spec
            .with_overrides(&PhaseOverrides {
                chat_turn_limit: Some(7),
                temperature: Some(0.0),
                top_p: None,
            })
            .unwrap();
        assert_eq!(updated.chat_turn_limit(), 7);
        assert_eq!(spec.chat_turn_limit(), 3);

        let invalid = spec.with_overrides(&PhaseOverrides {
            chat_turn_limit: Some(0),
            ..PhaseOverrides::default()
        });
        assert!(invalid.is_err());
    }
}
