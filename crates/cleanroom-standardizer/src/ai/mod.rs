//! LLM providers.
//!
//! # Feature Flag
//!
//! The [`AIProvider`] trait is always available. The HTTP-backed providers
//! need the `ai` feature (on by default):
//!
//! ```toml
//! cleanroom_standardizer = { version = "0.1", default-features = false }
//! ```
//!
//! Without a provider the standardizer runs in rule-based mode.
//!
//! - [`OpenRouterProvider`] - OpenRouter chat completions (requires `ai` feature)
//! - [`GeminiProvider`] - Google Gemini generateContent (requires `ai` feature)

// Provider trait is always available (for custom implementations)
mod provider;
pub use provider::AIProvider;

#[cfg(feature = "ai")]
mod endpoint;
#[cfg(feature = "ai")]
mod gemini;
#[cfg(feature = "ai")]
mod openrouter;

#[cfg(feature = "ai")]
pub use endpoint::{EndpointConfig, EndpointConfigBuilder};
#[cfg(feature = "ai")]
pub use gemini::GeminiProvider;
#[cfg(feature = "ai")]
pub use openrouter::OpenRouterProvider;

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted provider for unit tests.

    use super::AIProvider;
    use anyhow::{Result, anyhow};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns the response of the first rule whose needle occurs in the
    /// prompt. A response starting with `ERR:` becomes an error.
    pub(crate) struct ScriptedProvider {
        rules: Vec<(String, String)>,
        fallback: Option<String>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        pub(crate) fn new() -> Self {
            Self {
                rules: Vec::new(),
                fallback: None,
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn when(mut self, needle: &str, response: &str) -> Self {
            self.rules.push((needle.to_string(), response.to_string()));
            self
        }

        pub(crate) fn otherwise(mut self, response: &str) -> Self {
            self.fallback = Some(response.to_string());
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn prompts(&self) -> Vec<String> {
            self.prompts.lock().clone()
        }
    }

    impl AIProvider for ScriptedProvider {
        fn complete(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().push(prompt.to_string());
            let response = self
                .rules
                .iter()
                .find(|(needle, _)| prompt.contains(needle.as_str()))
                .map(|(_, response)| response.clone())
                .or_else(|| self.fallback.clone())
                .ok_or_else(|| anyhow!("no scripted response"))?;
            match response.strip_prefix("ERR:") {
                Some(message) => Err(anyhow!("{}", message.trim())),
                None => Ok(response),
            }
        }

        fn name(&self) -> &str {
            "Scripted"
        }
    }
}
