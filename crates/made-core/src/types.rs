use serde::{Deserialize, Serialize};

/// Chat role as seen by a generation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System instructions.
    System,
    /// Input from the other participant.
    User,
    /// Output previously produced by the calling agent.
    Assistant,
}

impl ChatRole {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One provider-facing conversation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Who produced the entry, from the calling agent's point of view.
    pub role: ChatRole,
    /// Entry text.
    pub content: String,
}

impl ChatTurn {
    /// Creates a conversation entry.
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A request for the next turn of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Model identifier understood by the provider.
    pub model: String,
    /// System prompt describing the calling agent's role.
    pub system_prompt: String,
    /// Ordered conversation history.
    pub turns: Vec<ChatTurn>,
    /// Sampling temperature in `[0, 1]`.
    pub temperature: f32,
    /// Nucleus-sampling threshold in `[0, 1]`.
    pub top_p: f32,
}

impl GenerationRequest {
    /// Text of the most recent conversation entry, if any.
    pub fn last_turn_text(&self) -> Option<&str> {
        self.turns.last().map(|turn| turn.content.as_str())
    }
}

/// Response produced by a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Generation {
    /// Generated text.
    pub content: String,
    /// Token accounting for the call.
    pub usage: TokenUsage,
    /// Name of the provider that answered.
    pub provider: String,
    /// Wall-clock latency of the call.
    pub latency_ms: u64,
}

/// Token accounting reported by a provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u64,
    /// Tokens produced by the completion.
    pub completion_tokens: u64,
}

impl TokenUsage {
    /// Total tokens billed for the call.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    /// Accumulates another call's usage into this one.
    pub fn add(&mut self, other: Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_accumulates() {
        let mut usage = TokenUsage::default();
        usage.add(TokenUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
        });
        usage.add(TokenUsage {
            prompt_tokens: 3,
            completion_tokens: 2,
        });
        assert_eq!(usage.prompt_tokens, 13);
        assert_eq!(usage.completion_tokens, 7);
        assert_eq!(usage.total(), 20);
    }

    #[test]
    fn test_chat_role_wire_names() {
        assert_eq!(ChatRole::System.as_str(), "system");
        assert_eq!(ChatRole::Assistant.as_str(), "assistant");
        let json = serde_json::to_string(&ChatTurn::new(ChatRole::User, "hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }

    #[test]
    fn test_last_turn_text() {
        let request = GenerationRequest {
            model: "test".to_owned(),
            system_prompt: String::new(),
            turns: vec![
                ChatTurn::new(ChatRole::User, "first"),
                ChatTurn::new(ChatRole::Assistant, "second"),
            ],
            temperature: 0.2,
            top_p: 1.0,
        };
        assert_eq!(request.last_turn_text(), Some("second"));
    }
}
