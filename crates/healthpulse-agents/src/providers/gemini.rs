use std::env;
use std::time::Duration;

use async_trait::async_trait;
use healthpulse_common::{Error, Result};
use reqwest::Client;
use serde_json::json;
use tracing::warn;

use super::{GenerateRequest, LlmProvider};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Returned instead of failing the turn when the provider answers with a
/// shape neither extraction strategy recognizes.
pub const FALLBACK_REPLY: &str = "Sorry, I could not generate a response.";

pub struct GeminiProvider {
    api_key: String,
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl GeminiProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: Client::new(),
            base_url: GEMINI_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY")
            .map_err(|_| Error::Config("GEMINI_API_KEY not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    async fn send_request(&self, request: &GenerateRequest) -> Result<serde_json::Value> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt }]
            }]
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("network error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Err(Error::RateLimited(format!(
                    "gemini API error: status=429, body={error_text}"
                )));
            }
            return Err(Error::Provider(format!(
                "gemini API error: status={status}, body={error_text}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("invalid JSON from gemini: {e}")))
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn provider_id(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let raw = tokio::time::timeout(self.timeout, self.send_request(request))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "no response from gemini within {}s",
                    self.timeout.as_secs()
                ))
            })??;

        match extract_text(&raw) {
            TextExtraction::Text(text) => Ok(text),
            TextExtraction::Unrecognized => {
                warn!("unrecognized gemini response shape: {raw}");
                Ok(FALLBACK_REPLY.to_string())
            }
        }
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await;

        match response {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

/// Outcome of pulling generated text out of a provider response.
///
/// Response shapes vary across API versions, so extraction is a tagged
/// result rather than an error path: the structured candidate path is tried
/// first, then the flattened top-level field.
#[derive(Debug)]
pub(crate) enum TextExtraction {
    Text(String),
    Unrecognized,
}

pub(crate) fn extract_text(response: &serde_json::Value) -> TextExtraction {
    if let Some(parts) = response["candidates"][0]["content"]["parts"].as_array() {
        let text: String = parts
            .iter()
            .filter_map(|part| part["text"].as_str())
            .collect::<Vec<_>>()
            .join("");
        if !text.trim().is_empty() {
            return TextExtraction::Text(text);
        }
    }

    if let Some(text) = response["text"].as_str()
        && !text.trim().is_empty()
    {
        return TextExtraction::Text(text.to_string());
    }

    TextExtraction::Unrecognized
}
