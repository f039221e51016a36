use async_trait::async_trait;
use healthpulse_common::Result;

pub mod gemini;
pub use gemini::GeminiProvider;

/// Trait for generative-language provider integrations.
///
/// The pipeline treats the provider as a stateless oracle: one prompt in,
/// one piece of text out, fresh on every turn.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identifier (e.g. "gemini").
    fn provider_id(&self) -> &str;

    /// Send a generation request and return the produced text.
    async fn generate(&self, request: &GenerateRequest) -> Result<String>;

    /// Check if the provider is reachable and configured.
    async fn health_check(&self) -> Result<bool>;
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
}
