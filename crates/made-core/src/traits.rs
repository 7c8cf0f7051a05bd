use async_trait::async_trait;

use crate::{Generation, GenerationRequest, Result};

/// Trait for external text-generation services.
///
/// Agents treat a provider as an opaque capability: given a conversation and
/// sampling parameters it returns a response plus usage metadata.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Returns the unique identifier for this provider.
    fn name(&self) -> &'static str;

    /// Checks whether this provider is currently available and ready to process requests.
    async fn is_available(&self) -> bool;

    /// Generates the next turn for the given conversation.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails in transport, is rejected by the
    /// service, or the response cannot be parsed. Transient failures report
    /// `true` from [`crate::Error::is_retryable`].
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation>;
}
