use core::result::Result as CoreResult;
use std::io::Error as IoError;

use reqwest::Error as ReqwestError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;
use toml::de::Error as TomlError;

/// Result type for core operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that can occur in the core library and in model providers.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// An HTTP request failed before a response was received.
    #[error("HTTP request failed: {0}")]
    Request(#[from] ReqwestError),

    /// JSON serialization or deserialization failed.
    #[error("JSON serialization error: {0}")]
    Json(#[from] SerdeJsonError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// Configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A model provider failed on its side (5xx, overloaded).
    #[error("Provider error: {0}")]
    Provider(String),

    /// The provider rejected the call because of rate limiting or quota.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// A generation call did not complete in time.
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// Required API key was not found.
    #[error("API key not found: {0}")]
    MissingApiKey(String),

    /// The provider rejected the request as malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The provider rejected the credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Model provider returned an invalid response.
    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    /// A general error not covered by other variants.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Determines whether this error may succeed if retried.
    ///
    /// Returns `true` for transient failures: transport errors, provider-side
    /// failures, rate limiting and timeouts.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(err) => !err.is_builder() && !err.is_decode(),
            Self::Provider(_) | Self::RateLimited(_) | Self::Timeout(_) => true,
            _ => false,
        }
    }
}
