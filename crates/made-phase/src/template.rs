//! Prompt template rendering.
//!
//! Templates use `{name}` placeholders. `{{` and `}}` produce literal braces.
//! Every placeholder must have a value; nothing is silently left unrendered.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::result::Result as StdResult;
use std::sync::LazyLock;

use crate::error::{PhaseError, Result};

/// Matches escaped braces or a `{identifier}` placeholder.
static PLACEHOLDER: LazyLock<StdResult<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}"));

/// Values substituted into templates, keyed by placeholder name.
pub type TemplateValues = BTreeMap<String, String>;

/// Renders `template`, substituting every placeholder from `values`.
///
/// # Errors
/// Returns `PhaseError::Template` naming the first placeholder without a value.
pub fn render(template: &str, values: &TemplateValues) -> Result<String> {
    let pattern = PLACEHOLDER
        .as_ref()
        .map_err(|err| PhaseError::InvalidSpec(format!("placeholder pattern: {err}")))?;

    let mut missing: Option<String> = None;
    let rendered = pattern.replace_all(template, |caps: &Captures<'_>| {
        let Some(name) = caps.get(1) else {
            return caps[0][..1].to_owned();
        };
        if let Some(value) = values.get(name.as_str()) {
            value.clone()
        } else {
            if missing.is_none() {
                missing = Some(name.as_str().to_owned());
            }
            String::new()
        }
    });

    match missing {
        Some(placeholder) => Err(PhaseError::Template { placeholder }),
        None => Ok(rendered.into_owned()),
    }
}
