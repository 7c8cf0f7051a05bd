//! Mock provider for testing agent dialogues.
//!
//! Allows defining canned responses, per-role scripts and injected failures,
//! enabling end-to-end testing of phase chains without real API calls.

use async_trait::async_trait;
use made_core::{
    Error, Generation, GenerationRequest, ModelProvider, Result, Shared, TokenUsage,
};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time;

/// Response storage type
type ResponseMap = Shared<HashMap<String, String>>;

/// Ordered response queues selected by a system-prompt substring
type ScriptList = Shared<Vec<(String, VecDeque<String>)>>;

/// Mock provider that returns pre-defined responses.
///
/// Resolution order for each call: injected failure, role script (first
/// script whose pattern occurs in the system prompt and still has entries),
/// exact then substring match on the last turn, default response.
#[derive(Clone)]
pub struct MockProvider {
    /// Name of this mock provider
    name: String,
    /// Predefined responses keyed by last-turn text
    responses: ResponseMap,
    /// Scripted responses per role
    scripts: ScriptList,
    /// Default response if nothing matches
    default_response: Shared<Option<String>>,
    /// Number of upcoming calls that fail with a transient error
    transient_failures: Shared<u32>,
    /// Permanent failure returned by every call
    fatal_failure: Shared<Option<String>>,
    /// Artificial latency per call
    delay: Option<Duration>,
    /// Call history for verification
    call_history: Shared<Vec<GenerationRequest>>,
}

impl MockProvider {
    /// Create a new mock provider with a given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Shared::default(),
            scripts: Shared::default(),
            default_response: Shared::default(),
            transient_failures: Shared::default(),
            fatal_failure: Shared::default(),
            delay: None,
            call_history: Shared::default(),
        }
    }

    /// Add a pattern-based response matched against the last conversation turn.
    #[must_use]
    pub fn with_response(self, pattern: impl Into<String>, response: impl Into<String>) -> Self {
        self.responses.with(|responses| {
            responses.insert(pattern.into(), response.into());
        });
        self
    }

    /// Add an ordered script consumed by calls whose system prompt contains `system_pattern`.
    #[must_use]
    pub fn with_script<I, S>(self, system_pattern: impl Into<String>, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queue = responses.into_iter().map(Into::into).collect();
        self.scripts
            .with(|scripts| scripts.push((system_pattern.into(), queue)));
        self
    }

    /// Set a default response for calls that match nothing else.
    #[must_use]
    pub fn with_default_response(self, response: impl Into<String>) -> Self {
        self.default_response.replace(Some(response.into()));
        self
    }

    /// Fail the next `count` calls with a rate-limit error.
    #[must_use]
    pub fn with_transient_failures(self, count: u32) -> Self {
        self.transient_failures.replace(count);
        self
    }

    /// Fail every call with a non-retryable authentication error.
    #[must_use]
    pub fn with_fatal_failure(self, message: impl Into<String>) -> Self {
        self.fatal_failure.replace(Some(message.into()));
        self
    }

    /// Sleep for `delay` before answering each call.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Clear the call history (used for testing).
    pub fn clear_history(&self) {
        self.call_history.with(Vec::clear);
    }

    /// Get the call history (every request received, in order).
    #[must_use]
    pub fn get_call_history(&self) -> Vec<GenerationRequest> {
        self.call_history.snapshot()
    }

    /// Get the number of calls made.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.call_history.with(|history| history.len())
    }

    /// Returns the injected failure for this call, if any.
    fn take_failure(&self) -> Option<Error> {
        if let Some(message) = self.fatal_failure.snapshot() {
            return Some(Error::Authentication(message));
        }
        self.transient_failures.with(|remaining| {
            (*remaining > 0).then(|| {
                *remaining -= 1;
                Error::RateLimited("mock rate limit".to_owned())
            })
        })
    }

    /// Pops the next scripted response for the request's role.
    fn next_scripted(&self, system_prompt: &str) -> Option<String> {
        self.scripts.with(|scripts| {
            scripts
                .iter_mut()
                .filter(|(pattern, queue)| {
                    system_prompt.contains(pattern.as_str()) && !queue.is_empty()
                })
                .find_map(|(_, queue)| queue.pop_front())
        })
    }

    /// Find a matching response for the given turn text.
    fn find_response(&self, turn_text: &str) -> Option<String> {
        self.responses.with(|responses| {
            // Exact match first
            responses.get(turn_text).cloned().or_else(|| {
                responses
                    .iter()
                    .find(|(pattern, _)| turn_text.contains(pattern.as_str()))
                    .map(|(_, response)| response.clone())
            })
        })
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        self.call_history
            .with(|history| history.push(request.clone()));

        if let Some(delay) = self.delay {
            time::sleep(delay).await;
        }

        if let Some(error) = self.take_failure() {
            return Err(error);
        }

        let last_turn = request.last_turn_text().unwrap_or_default();
        let content = self
            .next_scripted(&request.system_prompt)
            .or_else(|| self.find_response(last_turn))
            .or_else(|| self.default_response.snapshot())
            .unwrap_or_else(|| format!("Mock response for: {last_turn}"));

        let prompt_chars: usize = request.turns.iter().map(|turn| turn.content.len()).sum();
        Ok(Generation {
            usage: TokenUsage {
                prompt_tokens: (request.system_prompt.len() + prompt_chars) as u64 / 4,
                completion_tokens: content.len() as u64 / 4,
            },
            content,
            provider: self.name.clone(),
            latency_ms: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use made_core::{ChatRole, ChatTurn};

    fn request(system: &str, last: &str) -> GenerationRequest {
        GenerationRequest {
            model: "mock".to_owned(),
            system_prompt: system.to_owned(),
            turns: vec![ChatTurn::new(ChatRole::User, last)],
            temperature: 0.2,
            top_p: 1.0,
        }
    }

    /// Tests exact and substring matching on the last turn.
    #[tokio::test]
    async fn test_mock_provider_pattern_match() {
        let provider = MockProvider::new("test")
            .with_response("hello", "world")
            .with_response("implement", "I will implement that feature");

        let exact = provider.generate(&request("", "hello")).await;
        assert!(exact.is_ok(), "Failed to generate response");
        if let Ok(resp) = exact {
            assert_eq!(resp.content, "world");
        }

        let substring = provider
            .generate(&request("", "Please implement a login system"))
            .await;
        if let Ok(resp) = substring {
            assert_eq!(resp.content, "I will implement that feature");
        }
    }

    /// Tests scripts are consumed in order and selected by system prompt.
    #[tokio::test]
    async fn test_mock_provider_scripts() {
        let provider = MockProvider::new("test")
            .with_script("Programmer", ["first", "second"])
            .with_script("CTO", ["review"])
            .with_default_response("fallback");

        let mut seen = Vec::new();
        for system in ["You are Programmer", "You are CTO", "You are Programmer", "You are Programmer"] {
            if let Ok(resp) = provider.generate(&request(system, "go")).await {
                seen.push(resp.content);
            }
        }
        assert_eq!(seen, ["first", "review", "second", "fallback"]);
    }

    /// Tests transient failures are consumed before answering.
    #[tokio::test]
    async fn test_mock_provider_transient_failures() {
        let provider = MockProvider::new("test")
            .with_transient_failures(2)
            .with_default_response("ok");

        let first = provider.generate(&request("", "x")).await;
        assert!(matches!(first, Err(Error::RateLimited(_))));
        let second = provider.generate(&request("", "x")).await;
        assert!(second.is_err());
        let third = provider.generate(&request("", "x")).await;
        assert!(third.is_ok());
        assert_eq!(provider.call_count(), 3);
    }

    /// Tests fatal failures are permanent and not retryable.
    #[tokio::test]
    async fn test_mock_provider_fatal_failure() {
        let provider = MockProvider::new("test").with_fatal_failure("revoked key");
        for _ in 0..2 {
            let result = provider.generate(&request("", "x")).await;
            assert!(matches!(&result, Err(err) if !err.is_retryable()));
        }
    }

    /// Tests call history tracking and clearing.
    #[tokio::test]
    async fn test_mock_provider_call_history() {
        let provider = MockProvider::new("test");

        let res1 = provider.generate(&request("sys", "first query")).await;
        assert!(res1.is_ok(), "Failed to generate first response");
        let res2 = provider.generate(&request("sys", "second query")).await;
        assert!(res2.is_ok(), "Failed to generate second response");

        let history = provider.get_call_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].last_turn_text(), Some("first query"));
        assert_eq!(history[1].last_turn_text(), Some("second query"));

        provider.clear_history();
        assert_eq!(provider.call_count(), 0);
    }
}
