//! Google Gemini provider (<https://ai.google.dev/>).

use anyhow::{Result, bail};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AIProvider;
use super::endpoint::{EndpointConfig, non_empty, post_json};

const PROVIDER: &str = "Gemini";

/// Finish reasons that mean the answer was withheld.
const BLOCKED_REASONS: [&str; 3] = ["SAFETY", "BLOCKED", "PROHIBITED_CONTENT"];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Turn<'a>; 1],
    generation_config: Sampling,
}

#[derive(Serialize)]
struct Turn<'a> {
    role: &'static str,
    parts: [OutgoingPart<'a>; 1],
}

#[derive(Serialize)]
struct OutgoingPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Sampling {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<IncomingPart>>,
}

#[derive(Deserialize)]
struct IncomingPart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}

impl GenerateResponse {
    /// Text parts of the first candidate, concatenated.
    fn into_answer(self) -> Result<String> {
        if let Some(usage) = &self.usage_metadata {
            debug!(
                "{} tokens: prompt={} completion={}",
                PROVIDER,
                usage.prompt_token_count.unwrap_or(0),
                usage.candidates_token_count.unwrap_or(0)
            );
        }

        let Some(candidate) = self.candidates.into_iter().flatten().next() else {
            bail!("{PROVIDER} returned no candidates");
        };
        if let Some(reason) = candidate.finish_reason.as_deref()
            && BLOCKED_REASONS.contains(&reason)
        {
            bail!("{PROVIDER} response blocked ({reason})");
        }

        let text = candidate
            .content
            .and_then(|content| content.parts)
            .map(|parts| parts.into_iter().map(|p| p.text).collect::<String>());
        non_empty(PROVIDER, text)
    }
}

/// Google Gemini completion provider.
///
/// ```rust,ignore
/// use cleanroom_standardizer::ai::{EndpointConfig, GeminiProvider};
///
/// let config = EndpointConfig::gemini().model("gemini-2.0-flash").build();
/// let provider = GeminiProvider::with_config("your-api-key", config)?;
/// ```
pub struct GeminiProvider {
    api_key: String,
    config: EndpointConfig,
    client: Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(api_key, EndpointConfig::gemini().build())
    }

    pub fn with_config(api_key: impl Into<String>, config: EndpointConfig) -> Result<Self> {
        Ok(Self {
            client: config.http_client()?,
            api_key: api_key.into(),
            config,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}{}:generateContent", self.config.base_url, self.config.model)
    }

    fn generate_request<'a>(&self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: [Turn {
                role: "user",
                parts: [OutgoingPart { text: prompt }],
            }],
            generation_config: Sampling {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_tokens,
            },
        }
    }
}

impl AIProvider for GeminiProvider {
    fn complete(&self, prompt: &str) -> Result<String> {
        let request = self
            .client
            .post(self.generate_url())
            .query(&[("key", self.api_key.as_str())]);
        let response: GenerateResponse =
            post_json(PROVIDER, request, &self.generate_request(prompt))?;
        response.into_answer()
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> Option<&str> {
        Some(&self.config.model)
    }
}
