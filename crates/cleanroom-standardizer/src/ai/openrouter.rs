//! OpenRouter provider (<https://openrouter.ai/>).
//!
//! Talks to the OpenAI-compatible chat completions endpoint, so any model
//! OpenRouter hosts can be used with one key.

use anyhow::Result;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::AIProvider;
use super::endpoint::{EndpointConfig, non_empty, post_json};

const PROVIDER: &str = "OpenRouter";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Option<Vec<ChatChoice>>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ReplyMessage>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}

impl ChatResponse {
    fn into_answer(self) -> Result<String> {
        match &self.usage {
            Some(usage) => debug!(
                "{} tokens: prompt={} completion={}",
                PROVIDER,
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0)
            ),
            None => debug!("{} reported no token usage", PROVIDER),
        }

        let content = self
            .choices
            .into_iter()
            .flatten()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content);
        non_empty(PROVIDER, content)
    }
}

/// OpenRouter completion provider.
///
/// # Example
///
/// ```rust,ignore
/// use cleanroom_standardizer::ai::{EndpointConfig, OpenRouterProvider};
///
/// let config = EndpointConfig::openrouter()
///     .model("deepseek/deepseek-chat")
///     .timeout_secs(60)
///     .build();
/// let provider = OpenRouterProvider::with_config("your-api-key", config)?;
/// ```
pub struct OpenRouterProvider {
    api_key: String,
    config: EndpointConfig,
    client: Client,
}

impl OpenRouterProvider {
    /// Provider with the default model and endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(api_key, EndpointConfig::openrouter().build())
    }

    /// # Errors
    ///
    /// Fails when the HTTP client cannot be created.
    pub fn with_config(api_key: impl Into<String>, config: EndpointConfig) -> Result<Self> {
        Ok(Self {
            client: config.http_client()?,
            api_key: api_key.into(),
            config,
        })
    }

    fn chat_request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }
}

impl AIProvider for OpenRouterProvider {
    fn complete(&self, prompt: &str) -> Result<String> {
        let request = self
            .client
            .post(&self.config.base_url)
            .bearer_auth(&self.api_key)
            .header("X-Title", "cleanroom-standardizer");
        let response: ChatResponse = post_json(PROVIDER, request, &self.chat_request(prompt))?;
        response.into_answer()
    }

    fn name(&self) -> &str {
        PROVIDER
    }

    fn model(&self) -> Option<&str> {
        Some(&self.config.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(json: &str) -> Result<String> {
        serde_json::from_str::<ChatResponse>(json)
            .expect("response JSON should decode")
            .into_answer()
    }

    #[test]
    fn test_answer_is_first_choice_trimmed() {
        let json = r#"{
            "choices": [
                {"message": {"role": "assistant", "content": "  PEPSI MAX=PEPSI\nPEPSI=PEPSI \n"}},
                {"message": {"role": "assistant", "content": "ignored"}}
            ],
            "usage": {"prompt_tokens": 120, "completion_tokens": 12, "total_tokens": 132}
        }"#;
        assert_eq!(answer(json).unwrap(), "PEPSI MAX=PEPSI\nPEPSI=PEPSI");
    }

    #[test]
    fn test_answer_without_usage() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": "A=A"}}]}"#;
        assert_eq!(answer(json).unwrap(), "A=A");
    }

    #[test]
    fn test_missing_answer_is_error() {
        for json in [
            r#"{"choices": []}"#,
            r#"{"choices": null}"#,
            r#"{}"#,
            r#"{"choices": [{"message": null}]}"#,
            r#"{"choices": [{"message": {"content": null}}]}"#,
            r#"{"choices": [{"message": {"content": "  "}}]}"#,
        ] {
            assert!(answer(json).is_err(), "expected error for {json}");
        }
    }

    #[test]
    fn test_chat_request_shape() {
        let config = EndpointConfig::openrouter().model("custom/model").max_tokens(512).build();
        let provider = OpenRouterProvider::with_config("test-key", config).unwrap();

        let json = serde_json::to_value(provider.chat_request("hello")).unwrap();

        assert_eq!(json["model"], "custom/model");
        assert_eq!(json["max_tokens"], 512);
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hello");
    }

    #[test]
    fn test_provider_name_and_model() {
        let provider = OpenRouterProvider::new("test-key").unwrap();
        assert_eq!(provider.name(), "OpenRouter");
        assert_eq!(provider.model(), Some("openai/gpt-4o-mini"));
    }
}
