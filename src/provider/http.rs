//! OpenAI-compatible chat-completions backend.
//!
//! Most vendors (DeepSeek, Kimi, Gemini's compatibility endpoint) accept the
//! same request shape, so one backend parameterized by base URL covers them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;

use super::{ProviderBackend, ProviderConfig};
use crate::error::{ProviderError, ValidationError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// HTTP backend speaking the `/chat/completions` protocol.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatibleBackend {
    /// Creates a backend for `base_url` authenticating with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the HTTP client cannot be constructed.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ValidationError::InvalidConfig {
                reason: format!("http client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Creates a backend from provider config, resolving its credential.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the client cannot be built.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ValidationError> {
        Self::new(
            config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
            config.credential().unwrap_or_default(),
        )
    }
}

#[async_trait]
impl ProviderBackend for OpenAiCompatibleBackend {
    async fn send(
        &self,
        prompt: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout { after: timeout }
                } else {
                    ProviderError::ConnectionError { message: e.to_string() }
                }
            })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, retry_after, text).unwrap_or(
                ProviderError::MalformedRequest {
                    message: format!("unexpected status {status}"),
                },
            ));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedRequest {
                message: format!("unreadable response body: {e}"),
            })?;

        let content = data["choices"][0]["message"]["content"].as_str().unwrap_or_default();
        if content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(content.to_string())
    }
}
