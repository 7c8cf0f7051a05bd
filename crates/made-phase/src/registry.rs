//! Registry mapping phase names to constructors.
//!
//! The registry is an explicit value built at startup and shared by
//! reference, so a phase chain can be described purely by name strings.

use std::any::type_name;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{PhaseError, Result};
use crate::phase::{Phase, PhaseArgs, RegisteredPhase};
use crate::phases::{CodeReviewPhase, CodingPhase, DemandAnalysisPhase, LanguageChoosePhase};

/// Builds a phase instance from construction arguments.
pub type PhaseConstructor = Arc<dyn Fn(PhaseArgs) -> Result<Box<dyn Phase>> + Send + Sync>;

/// Registry of phase constructors keyed by canonical name
#[derive(Clone, Default)]
pub struct PhaseRegistry {
    constructors: BTreeMap<String, PhaseConstructor>,
}

impl fmt::Debug for PhaseRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl PhaseRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the four built-in phases under their canonical names.
    ///
    /// # Errors
    /// Propagates registration failures; none occur for the built-in set.
    pub fn with_builtin_phases() -> Result<Self> {
        let mut registry = Self::new();
        registry.register_type::<DemandAnalysisPhase>(None)?;
        registry.register_type::<LanguageChoosePhase>(None)?;
        registry.register_type::<CodingPhase>(None)?;
        registry.register_type::<CodeReviewPhase>(None)?;
        Ok(registry)
    }

    /// Register a constructor under `name`.
    ///
    /// On failure the registry is left unchanged.
    ///
    /// # Errors
    /// Returns `InvalidRegistration` if `name` is not `[a-z][a-z0-9_]*`, and
    /// `DuplicateRegistration` if it is already taken.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> Result<()>
    where
        F: Fn(PhaseArgs) -> Result<Box<dyn Phase>> + Send + Sync + 'static,
    {
        let name = name.into();
        validate_name(&name)?;
        if self.constructors.contains_key(&name) {
            return Err(PhaseError::DuplicateRegistration(name));
        }
        tracing::debug!(phase = %name, "registered phase");
        self.constructors.insert(name, Arc::new(constructor));
        Ok(())
    }

    /// Register a phase type, under `name` or the name derived from its type.
    ///
    /// # Errors
    /// Same as [`PhaseRegistry::register`].
    pub fn register_type<P: RegisteredPhase>(&mut self, name: Option<&str>) -> Result<String> {
        let name = name.map_or_else(canonical_name::<P>, str::to_owned);
        let registered = name.clone();
        self.register(name.clone(), move |args| {
            P::build(&registered, args).map(|phase| Box::new(phase) as Box<dyn Phase>)
        })?;
        Ok(name)
    }

    /// Construct the phase registered under `name`.
    ///
    /// # Errors
    /// Returns `UnknownPhase` if nothing is registered under `name`, or the
    /// constructor's error.
    pub fn resolve(&self, name: &str, args: PhaseArgs) -> Result<Box<dyn Phase>> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| PhaseError::UnknownPhase(name.to_owned()))?;
        constructor(args)
    }

    /// Check whether a phase is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Get number of registered phases
    #[must_use]
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Check if registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

/// Canonical name of a phase type: `CodeReviewPhase` becomes `code_review`.
pub fn canonical_name<P: ?Sized>() -> String {
    let full = type_name::<P>();
    let path = full.split('<').next().unwrap_or(full);
    let ident = path.rsplit("::").next().unwrap_or(path);
    let stem = match ident.strip_suffix("Phase") {
        Some(stem) if !stem.is_empty() => stem,
        _ => ident,
    };
    to_snake_case(stem)
}

fn to_snake_case(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    let mut out = String::with_capacity(ident.len() + 4);
    for (index, &ch) in chars.iter().enumerate() {
        if ch.is_ascii_uppercase() && index > 0 {
            let prev = chars[index - 1];
            let next_lower = chars.get(index + 1).is_some_and(char::is_ascii_lowercase);
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_lower)
            {
                out.push('_');
            }
        }
        out.push(ch.to_ascii_lowercase());
    }
    out
}

fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = chars.next().is_some_and(|first| first.is_ascii_lowercase())
        && chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_');
    if valid {
        Ok(())
    } else {
        Err(PhaseError::InvalidRegistration {
            name: name.to_owned(),
            reason: "phase names must match [a-z][a-z0-9_]*".to_owned(),
        })
    }
}
