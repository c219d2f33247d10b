//! Provider adapter contract.

use crate::error::GatewayResult;
use crate::request::ChatCompletionRequest;
use crate::response::ChatCompletion;
use crate::streaming::{CancellationSignal, ChunkStream};
use async_trait::async_trait;

/// Contract every vendor adapter implements.
///
/// Adapters are built per request from the current credentials and hold no
/// state across requests. `upstream_key`, when present, replaces the
/// configured vendor credential for that one call.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name, reported as `owned_by` in model listings
    fn name(&self) -> &str;

    /// Credential keys that must all be configured for this adapter to be active
    fn required_credentials(&self) -> &[&'static str];

    /// Model identifiers this adapter serves
    fn supported_models(&self) -> &[String];

    /// Whether this adapter serves `model`
    fn supports_model(&self, model: &str) -> bool {
        self.supported_models().iter().any(|m| m == model)
    }

    /// Buffered chat completion
    async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
        upstream_key: Option<&str>,
    ) -> GatewayResult<ChatCompletion>;

    /// Streaming chat completion. The returned stream must end promptly once
    /// `cancellation` fires.
    async fn chat_completion_stream(
        &self,
        request: &ChatCompletionRequest,
        cancellation: CancellationSignal,
        upstream_key: Option<&str>,
    ) -> GatewayResult<ChunkStream>;
}

impl std::fmt::Debug for dyn ProviderAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAdapter")
            .field("name", &self.name())
            .field("models", &self.supported_models())
            .finish()
    }
}
