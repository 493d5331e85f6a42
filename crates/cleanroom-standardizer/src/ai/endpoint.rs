//! Settings and HTTP plumbing shared by the hosted providers.

use anyhow::{Context, Result, bail};
use reqwest::blocking::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Requests are never retried; a slow model fails after this long.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Room for one mapping line per value of a large column.
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Connection and sampling settings for one hosted model.
///
/// Temperature defaults to 0.0 so the same value set yields the same
/// mapping from one run to the next.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl EndpointConfig {
    /// Settings for the OpenRouter chat completions API.
    pub fn openrouter() -> EndpointConfigBuilder {
        EndpointConfigBuilder::new(
            "openai/gpt-4o-mini",
            "https://openrouter.ai/api/v1/chat/completions",
        )
    }

    /// Settings for the Gemini generateContent API. The model name is
    /// appended to `base_url`.
    pub fn gemini() -> EndpointConfigBuilder {
        EndpointConfigBuilder::new(
            "gemini-flash-lite-latest",
            "https://generativelanguage.googleapis.com/v1beta/models/",
        )
    }

    pub(crate) fn http_client(&self) -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .context("Failed to build HTTP client")
    }
}

/// Builder for [`EndpointConfig`], seeded with a provider's defaults.
#[derive(Debug, Clone)]
pub struct EndpointConfigBuilder {
    config: EndpointConfig,
}

impl EndpointConfigBuilder {
    fn new(model: &str, base_url: &str) -> Self {
        Self {
            config: EndpointConfig {
                model: model.to_string(),
                base_url: base_url.to_string(),
                temperature: 0.0,
                max_tokens: DEFAULT_MAX_TOKENS,
                timeout_secs: DEFAULT_TIMEOUT_SECS,
            },
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Point at a proxy or compatible gateway.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.config.timeout_secs = timeout_secs;
        self
    }

    pub fn build(self) -> EndpointConfig {
        self.config
    }
}

/// Send `body` as JSON and decode a successful reply.
///
/// A non-2xx status is an error carrying the provider's name, the status and
/// the response body.
pub(crate) fn post_json<B, R>(provider: &str, request: RequestBuilder, body: &B) -> Result<R>
where
    B: Serialize,
    R: DeserializeOwned,
{
    let response = request
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .with_context(|| format!("{provider} request failed"))?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().unwrap_or_default();
        bail!("{provider} API error {status}: {detail}");
    }

    response
        .json()
        .with_context(|| format!("{provider} returned an unreadable response"))
}

/// Trimmed answer text, or an error when the model said nothing.
pub(crate) fn non_empty(provider: &str, text: Option<String>) -> Result<String> {
    match text.as_deref().map(str::trim) {
        Some(answer) if !answer.is_empty() => Ok(answer.to_string()),
        _ => bail!("{provider} returned an empty completion"),
    }
}
