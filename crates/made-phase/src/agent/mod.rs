//! Dialogue participants.
//!
//! An [`Agent`] owns one role identity, a handle to the generation capability,
//! and its private memory. Memory only grows and lives as long as the agent,
//! which never outlives the phase execution that created it.

mod retry;

pub use retry::{RetryFailure, RetryPolicy};

use made_core::{
    ChatRole, ChatTurn, GenerationRequest, Message, Metadata, ModelProvider, Sender, TokenUsage,
};
use std::fmt;
use std::sync::Arc;

use crate::error::{PhaseError, Result};
use crate::spec::Sampling;

/// One dialogue participant with private memory.
pub struct Agent {
    role_name: String,
    sender: Sender,
    system_prompt: String,
    provider: Arc<dyn ModelProvider>,
    model: String,
    sampling: Sampling,
    retry: RetryPolicy,
    memory: Vec<Message>,
    usage: TokenUsage,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("role_name", &self.role_name)
            .field("sender", &self.sender)
            .field("provider", &self.provider.name())
            .field("model", &self.model)
            .field("memory_len", &self.memory.len())
            .finish_non_exhaustive()
    }
}

/// Everything an agent needs besides its identity.
#[derive(Clone)]
pub struct AgentBackend {
    /// Generation capability shared by both agents of a phase
    pub provider: Arc<dyn ModelProvider>,
    /// Model identifier passed to the provider
    pub model: String,
    /// Retry and timeout policy
    pub retry: RetryPolicy,
}

impl Agent {
    /// Creates an agent seeded with its rendered role prompt.
    pub fn new(
        role_name: impl Into<String>,
        sender: Sender,
        system_prompt: impl Into<String>,
        backend: AgentBackend,
        sampling: Sampling,
    ) -> Self {
        Self {
            role_name: role_name.into(),
            sender,
            system_prompt: system_prompt.into(),
            provider: backend.provider,
            model: backend.model,
            sampling,
            retry: backend.retry,
            memory: Vec::new(),
            usage: TokenUsage::default(),
        }
    }

    /// Role name of this participant.
    pub fn role_name(&self) -> &str {
        &self.role_name
    }

    /// Dialogue side of this participant.
    pub const fn sender(&self) -> Sender {
        self.sender
    }

    /// Private memory, oldest first.
    pub fn memory(&self) -> &[Message] {
        &self.memory
    }

    /// Tokens spent by this agent so far.
    pub const fn usage(&self) -> TokenUsage {
        self.usage
    }

    /// Records an opening message authored by this agent without calling the
    /// provider.
    pub fn seed(&mut self, content: impl Into<String>) -> Message {
        let message = Message::new(self.role_name.clone(), self.sender, content);
        self.memory.push(message.clone());
        message
    }

    /// Appends `incoming` to memory and produces the next message.
    ///
    /// # Errors
    /// Returns `PhaseError::Generation` once the retry policy gives up. Memory
    /// keeps `incoming` but gains no response in that case.
    pub async fn send(&mut self, incoming: Option<Message>) -> Result<Message> {
        if let Some(message) = incoming {
            self.memory.push(message);
        }

        let request = self.request();
        let provider = Arc::clone(&self.provider);
        let generation = self
            .retry
            .run(&self.role_name, || provider.generate(&request))
            .await
            .map_err(|failure| PhaseError::Generation {
                role: self.role_name.clone(),
                sender: self.sender,
                attempts: failure.attempts,
                source: failure.error,
            })?;

        self.usage.add(generation.usage);
        tracing::debug!(
            role = %self.role_name,
            sender = %self.sender,
            provider = %generation.provider,
            latency_ms = generation.latency_ms,
            tokens = generation.usage.total(),
            "agent turn"
        );

        let metadata: Metadata = [
            ("provider".to_owned(), generation.provider),
            ("latency_ms".to_owned(), generation.latency_ms.to_string()),
            (
                "prompt_tokens".to_owned(),
                generation.usage.prompt_tokens.to_string(),
            ),
            (
                "completion_tokens".to_owned(),
                generation.usage.completion_tokens.to_string(),
            ),
        ]
        .into_iter()
        .collect();
        let message = Message::new(self.role_name.clone(), self.sender, generation.content)
            .with_metadata(metadata);
        self.memory.push(message.clone());
        Ok(message)
    }

    /// Provider view of memory: this agent's own turns are `assistant`,
    /// everything it received is `user`.
    fn request(&self) -> GenerationRequest {
        let turns = self
            .memory
            .iter()
            .map(|message| {
                let role = if message.sender() == self.sender {
                    ChatRole::Assistant
                } else {
                    ChatRole::User
                };
                ChatTurn::new(role, message.content())
            })
            .collect();
        GenerationRequest {
            model: self.model.clone(),
            system_prompt: self.system_prompt.clone(),
            turns,
            temperature: self.sampling.temperature,
            top_p: self.sampling.top_p,
        }
    }
}
