//! Mutable cross-phase state and the explicit field contracts phases declare
//! over it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{PhaseError, Result};

/// Well-known state field names used by the built-in phases.
pub mod fields {
    /// Task text, seeded from the run configuration
    pub const TASK: &str = "task";
    /// Optional longer task description
    pub const DESCRIPTION: &str = "description";
    /// Project name used for output directories
    pub const PROJECT_NAME: &str = "project_name";
    /// Product modality chosen during demand analysis
    pub const MODALITY: &str = "modality";
    /// Implementation language
    pub const LANGUAGE: &str = "language";
    /// Raw generated code listing
    pub const CODES: &str = "codes";
    /// Files parsed out of the generated code
    pub const FILES: &str = "files";
    /// Review comments on the generated code
    pub const REVIEW_COMMENTS: &str = "review_comments";
}

/// A generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducedFile {
    /// Relative path of the file
    pub path: String,
    /// File contents
    pub content: String,
}

/// Value of one state field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StateValue {
    /// Free text
    Text(String),
    /// A list of produced files
    Files(Vec<ProducedFile>),
}

impl StateValue {
    /// Text form used when the value is substituted into a prompt.
    ///
    /// File lists render as one path per line.
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Files(files) => files
                .iter()
                .map(|file| file.path.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Vec<ProducedFile>> for StateValue {
    fn from(value: Vec<ProducedFile>) -> Self {
        Self::Files(value)
    }
}

/// Free-form mapping of named fields shared by every phase of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvState {
    fields: BTreeMap<String, StateValue>,
}

impl EnvState {
    /// Value of a field, if set.
    pub fn get(&self, field: &str) -> Option<&StateValue> {
        self.fields.get(field)
    }

    /// Whether a field is set.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Text of a field, if it is set and holds text.
    pub fn text(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(StateValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// Rendered value of a field the phase cannot run without.
    ///
    /// # Errors
    /// Returns `MissingDependency` naming `phase` if the field is absent.
    pub fn require(&self, field: &str, phase: &str) -> Result<String> {
        self.fields
            .get(field)
            .map(StateValue::render)
            .ok_or_else(|| PhaseError::MissingDependency {
                phase: phase.to_owned(),
                field: field.to_owned(),
            })
    }

    /// Produced files, or an empty slice if none were recorded.
    pub fn files(&self) -> &[ProducedFile] {
        match self.fields.get(fields::FILES) {
            Some(StateValue::Files(files)) => files.as_slice(),
            _ => &[],
        }
    }

    /// Names of all set fields, in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of set fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub(crate) fn insert(&mut self, field: String, value: StateValue) {
        self.fields.insert(field, value);
    }
}

/// Explicit declaration of the state fields a phase reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseContract {
    requires: Vec<&'static str>,
    optional: Vec<&'static str>,
    writes: Vec<&'static str>,
}

impl PhaseContract {
    /// An empty contract.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fields that must be present before the phase runs.
    #[must_use]
    pub fn requires(mut self, fields: &[&'static str]) -> Self {
        self.requires.extend_from_slice(fields);
        self
    }

    /// Fields read when present; absent ones substitute as empty text.
    #[must_use]
    pub fn optional(mut self, fields: &[&'static str]) -> Self {
        self.optional.extend_from_slice(fields);
        self
    }

    /// Fields the phase is allowed to write.
    #[must_use]
    pub fn writes(mut self, fields: &[&'static str]) -> Self {
        self.writes.extend_from_slice(fields);
        self
    }

    /// Required fields.
    pub fn required_fields(&self) -> &[&'static str] {
        &self.requires
    }

    /// Optional fields.
    pub fn optional_fields(&self) -> &[&'static str] {
        &self.optional
    }

    /// Writable fields.
    pub fn written_fields(&self) -> &[&'static str] {
        &self.writes
    }

    /// Copies every declared read out of `state`, checking required fields first.
    ///
    /// # Errors
    /// Returns `MissingDependency` for the first required field that is absent.
    pub fn pull(&self, phase: &str, state: &EnvState) -> Result<BTreeMap<String, String>> {
        let mut values = BTreeMap::new();
        for &field in &self.requires {
            values.insert(field.to_owned(), state.require(field, phase)?);
        }
        for &field in &self.optional {
            let value = state.get(field).map(StateValue::render).unwrap_or_default();
            values.insert(field.to_owned(), value);
        }
        Ok(values)
    }

    /// Starts a state delta for `phase` restricted to this contract's writes.
    pub fn delta(&self, phase: impl Into<String>) -> StateDelta {
        StateDelta {
            phase: phase.into(),
            allowed: self.writes.clone(),
            changes: Vec::new(),
        }
    }
}

/// A set of field writes attributed to one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDelta {
    phase: String,
    allowed: Vec<&'static str>,
    changes: Vec<(String, StateValue)>,
}

impl StateDelta {
    /// Adds a write.
    ///
    /// # Errors
    /// Returns `UndeclaredWrite` if the field is not in the phase's contract.
    pub fn set(mut self, field: &str, value: impl Into<StateValue>) -> Result<Self> {
        if !self.allowed.iter().any(|allowed| *allowed == field) {
            return Err(PhaseError::UndeclaredWrite {
                phase: self.phase,
                field: field.to_owned(),
            });
        }
        self.changes.push((field.to_owned(), value.into()));
        Ok(self)
    }

    /// Phase the delta is attributed to.
    pub fn phase(&self) -> &str {
        &self.phase
    }

    /// Names of the fields written, in order.
    pub fn field_names(&self) -> Vec<String> {
        self.changes.iter().map(|(field, _)| field.clone()).collect()
    }

    pub(crate) fn into_changes(self) -> Vec<(String, StateValue)> {
        self.changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract() -> PhaseContract {
        PhaseContract::new()
            .requires(&[fields::TASK])
            .optional(&[fields::DESCRIPTION])
            .writes(&[fields::CODES, fields::FILES])
    }

    #[test]
    fn test_pull_fails_fast_on_missing_required() {
        let state = EnvState::default();
        let result = contract().pull("coding", &state);
        assert!(matches!(
            result,
            Err(PhaseError::MissingDependency { ref field, .. }) if field == "task"
        ));
    }

    #[test]
    fn test_pull_defaults_optional_to_empty() {
        let mut state = EnvState::default();
        state.insert(fields::TASK.to_owned(), "snake".into());
        let values = contract().pull("coding", &state).unwrap();
        assert_eq!(values.get("task").map(String::as_str), Some("snake"));
        assert_eq!(values.get("description").map(String::as_str), Some(""));
    }

    #[test]
    fn test_delta_rejects_undeclared_write() {
        let delta = contract().delta("coding");
        let result = delta.set(fields::LANGUAGE, "rust");
        assert!(matches!(result, Err(PhaseError::UndeclaredWrite { .. })));
    }

    #[test]
    fn test_delta_records_declared_writes() {
        let delta = contract()
            .delta("coding")
            .set(fields::CODES, "fn main() {}")
            .and_then(|delta| delta.set(fields::FILES, Vec::<ProducedFile>::new()))
            .unwrap();
        assert_eq!(delta.phase(), "coding");
        assert_eq!(delta.field_names(), ["codes", "files"]);
    }

    #[test]
    fn test_files_render_as_paths() {
        let value = StateValue::Files(vec![
            ProducedFile {
                path: "main.py".to_owned(),
                content: "print()".to_owned(),
            },
            ProducedFile {
                path: "game.py".to_owned(),
                content: String::new(),
            },
        ]);
        assert_eq!(value.render(), "main.py\ngame.py");
    }
}
