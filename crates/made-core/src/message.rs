//! Dialogue messages.
//!
//! A [`Message`] is one turn of a two-agent dialogue. Messages are immutable
//! once created: every new turn produces a new value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Optional string metadata attached to a message.
pub type Metadata = BTreeMap<String, String>;

/// Which side of a phase dialogue produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// The assistant persona (does the work).
    Assistant,
    /// The user persona (instructs and reviews).
    User,
}

impl Sender {
    /// Returns the opposite side of the dialogue.
    #[must_use]
    pub const fn counterpart(self) -> Self {
        match self {
            Self::Assistant => Self::User,
            Self::User => Self::Assistant,
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assistant => write!(f, "assistant"),
            Self::User => write!(f, "user"),
        }
    }
}

/// One dialogue turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role_name: String,
    sender: Sender,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Metadata>,
}

impl Message {
    /// Creates a message.
    pub fn new(role_name: impl Into<String>, sender: Sender, content: impl Into<String>) -> Self {
        Self {
            role_name: role_name.into(),
            sender,
            content: content.into(),
            metadata: None,
        }
    }

    /// Creates a message sent by the assistant persona.
    pub fn assistant(role_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(role_name, Sender::Assistant, content)
    }

    /// Creates a message sent by the user persona.
    pub fn user(role_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(role_name, Sender::User, content)
    }

    /// Returns a copy of this message carrying the given metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Role name of the agent that produced the message, e.g. `Programmer`.
    pub fn role_name(&self) -> &str {
        &self.role_name
    }

    /// Dialogue side that produced the message.
    pub const fn sender(&self) -> Sender {
        self.sender
    }

    /// Message text.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Attached metadata, if any.
    pub const fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_sender() {
        let first = Message::assistant("Programmer", "done");
        let second = Message::user("CTO", "please write it");
        assert_eq!(first.sender(), Sender::Assistant);
        assert_eq!(second.sender(), Sender::User);
        assert_eq!(first.role_name(), "Programmer");
        assert!(first.metadata().is_none());
    }

    #[test]
    fn test_metadata_is_preserved() {
        let mut metadata = Metadata::new();
        metadata.insert("turn".to_owned(), "3".to_owned());
        let message = Message::assistant("CPO", "web app").with_metadata(metadata);
        assert_eq!(
            message.metadata().and_then(|meta| meta.get("turn")),
            Some(&"3".to_owned())
        );
    }

    #[test]
    fn test_counterpart() {
        assert_eq!(Sender::Assistant.counterpart(), Sender::User);
        assert_eq!(Sender::User.counterpart(), Sender::Assistant);
    }

    #[test]
    fn test_serde_skips_empty_metadata() {
        let json = serde_json::to_string(&Message::user("CEO", "hi")).unwrap();
        assert!(!json.contains("metadata"));
        assert!(json.contains("\"sender\":\"user\""));
    }
}
