//! LLM provider trait.
//!
//! The standardizer only needs a blocking text-in, text-out call. Prompt
//! construction and response parsing live in [`crate::prompts`] and
//! [`crate::response`], so a provider is a thin transport.
//!
//! # Implementing a New Provider
//!
//! 1. Create a new file in `src/ai/` (e.g., `ollama.rs`)
//! 2. Implement [`AIProvider`] for the provider struct
//! 3. Export it from `src/ai/mod.rs`

use anyhow::Result;

/// A blocking LLM completion backend.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: mapping requests are issued from
/// several worker threads at once through a shared reference.
///
/// # Error Handling
///
/// A call either returns the model's text or an error carrying a diagnostic
/// message. Callers never retry; the request timeout is the provider's
/// responsibility.
pub trait AIProvider: Send + Sync {
    /// Send `prompt` and return the model's free-text answer.
    fn complete(&self, prompt: &str) -> Result<String>;

    /// Get the provider name for logging and debugging.
    fn name(&self) -> &str;

    /// Get the model being used by this provider.
    ///
    /// Returns `None` if the provider doesn't expose model information.
    fn model(&self) -> Option<&str> {
        None
    }
}
