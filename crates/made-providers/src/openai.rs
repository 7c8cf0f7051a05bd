use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};

use made_core::{
    ChatRole, Error, Generation, GenerationRequest, ModelConfig, ModelProvider, Result, TokenUsage,
};

/// Default API base URL.
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Default model.
const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Env var key for the API key.
const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Provider implementation for OpenAI-compatible chat completion APIs.
pub struct OpenAiProvider {
    /// HTTP client for API requests.
    client: Client,
    /// API key sent as a bearer token.
    api_key: String,
    /// Base URL, without the `/chat/completions` suffix.
    base_url: String,
    /// Model used when a request leaves it empty.
    model: String,
}

impl OpenAiProvider {
    /// Creates a new `OpenAiProvider` with the given API key.
    ///
    /// # Errors
    /// Returns an error if the provided API key is empty.
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::MissingApiKey(ENV_OPENAI_API_KEY.to_owned()));
        }

        Ok(Self {
            client: Client::default(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
        })
    }

    /// Creates a provider from config, reading the key from the config file or
    /// the environment variable it names.
    ///
    /// # Errors
    /// Returns an error if no API key is available.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            Error::MissingApiKey(format!("{} or config.toml model.api_key", config.api_key_env))
        })?;
        Ok(Self::new(api_key)?
            .with_base_url(config.base_url.clone())
            .with_model(config.model.clone()))
    }

    /// Sets the default model.
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Sets the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_owned();
        self
    }

    /// Full chat completions endpoint.
    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Builds the request body for the chat completions API.
    fn build_body(&self, request: &GenerationRequest) -> Value {
        let mut messages = vec![json!({
            "role": ChatRole::System.as_str(),
            "content": request.system_prompt,
        })];
        messages.extend(request.turns.iter().map(|turn| {
            json!({
                "role": turn.role.as_str(),
                "content": turn.content,
            })
        }));

        let model = if request.model.is_empty() {
            &self.model
        } else {
            &request.model
        };

        json!({
            "model": model,
            "messages": messages,
            "temperature": request.temperature,
            "top_p": request.top_p,
        })
    }

    /// Maps a non-success HTTP status to an error of the right retry class.
    fn status_error(status: StatusCode, body: &str) -> Error {
        let detail = format!("status {status}: {body}");
        match status {
            StatusCode::TOO_MANY_REQUESTS => Error::RateLimited(detail),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Authentication(detail),
            StatusCode::REQUEST_TIMEOUT => Error::Provider(detail),
            other if other.is_server_error() => Error::Provider(detail),
            _ => Error::InvalidRequest(detail),
        }
    }
}

/// Response payload returned by the chat completions API.
#[derive(Deserialize)]
struct CompletionResponse {
    /// List of generated choices.
    choices: Vec<Choice>,
    /// Optional token usage statistics returned by the service.
    usage: Option<Usage>,
}

/// Individual completion choice.
#[derive(Deserialize)]
struct Choice {
    /// Message payload representing the completion text.
    message: ChoiceMessage,
}

/// Message structure containing generated content.
#[derive(Deserialize)]
struct ChoiceMessage {
    /// Text content produced by the model.
    content: Option<String>,
}

/// Token accounting information for a response.
#[derive(Deserialize)]
struct Usage {
    /// Number of prompt tokens billed for the request.
    prompt_tokens: u64,
    /// Number of completion tokens returned by the model.
    completion_tokens: u64,
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        let start = Instant::now();
        let body = self.build_body(request);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::debug!("chat completion rejected with {status}");
            return Err(Self::status_error(status, &error_text));
        }

        let api_response: CompletionResponse = response
            .json()
            .await
            .map_err(|err| Error::InvalidResponse(format!("Failed to parse response: {err}")))?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::InvalidResponse("No choices in completion".to_owned()))?;

        let usage = api_response
            .usage
            .map_or_else(TokenUsage::default, |usage| TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            });

        Ok(Generation {
            content,
            usage,
            provider: self.name().to_owned(),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}
