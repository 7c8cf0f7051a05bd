//! Termination predicate and conclusion extraction.
//!
//! A phase prompt asks the assistant to close with an agreed marker. The
//! dialogue loop checks every assistant turn against the marker; when it
//! matches, the conclusion is extracted from that turn.

use made_core::Message;
use serde::{Deserialize, Serialize};

/// Marker used when a phase does not choose its own.
pub const DEFAULT_MARKER: &str = "<CONCLUSION>";

/// How a dialogue ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The assistant produced the termination marker
    Concluded,
    /// The turn limit was reached without the marker; the conclusion is best-effort
    Exhausted,
}

impl Termination {
    /// Whether the conclusion was forced by the turn limit.
    pub const fn is_best_effort(self) -> bool {
        matches!(self, Self::Exhausted)
    }
}

/// Which part of the terminating message becomes the conclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extraction {
    /// The whole message content, trimmed
    WholeMessage,
    /// Text after the last marker occurrence, trimmed; the whole message if nothing follows
    #[default]
    AfterMarker,
}

/// Termination predicate plus extraction rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationSpec {
    marker: String,
    extraction: Extraction,
}

impl Default for TerminationSpec {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER)
    }
}

impl TerminationSpec {
    /// Predicate matching `marker`, extracting the text after it.
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            extraction: Extraction::AfterMarker,
        }
    }

    /// Changes the extraction rule.
    #[must_use]
    pub fn with_extraction(mut self, extraction: Extraction) -> Self {
        self.extraction = extraction;
        self
    }

    /// The agreed closing marker.
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Extraction rule.
    pub const fn extraction(&self) -> Extraction {
        self.extraction
    }

    /// Whether `message` ends the dialogue.
    pub fn is_terminal(&self, message: &Message) -> bool {
        !self.marker.is_empty() && message.content().contains(&self.marker)
    }

    /// Conclusion text for a terminating message.
    pub fn extract(&self, message: &Message) -> String {
        let content = message.content();
        match self.extraction {
            Extraction::WholeMessage => content.trim().to_owned(),
            Extraction::AfterMarker => content
                .rfind(&self.marker)
                .map(|index| content[index + self.marker.len()..].trim())
                .filter(|tail| !tail.is_empty())
                .unwrap_or_else(|| content.trim())
                .to_owned(),
        }
    }
}
