//! LLM integration for the ticket copilot.
//!
//! Uses the rig-core crate for HTTP transport against OpenAI or any gateway
//! exposing the chat-completions API, and the [`RigAdapter`] to bridge rig's
//! `CompletionModel` trait to our [`LlmProvider`] trait.
//! [`generator::StructuredGenerator`] sits on top and is what the job
//! executor uses.

pub mod generator;
pub mod prompts;
pub mod provider;
mod rig_adapter;

pub use generator::{GeneratorConfig, StructuredGenerator};
pub use prompts::PromptSpec;
pub use provider::*;
pub use rig_adapter::RigAdapter;

use std::sync::Arc;
use std::time::Duration;

use rig::client::CompletionClient;
use secrecy::ExposeSecret;

use crate::error::LlmError;

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: secrecy::SecretString,
    pub model: String,
    pub timeout: Duration,
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::openai;

    let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
        openai::Client::builder()
            .api_key(config.api_key.expose_secret())
            .base_url(&config.base_url)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: "openai".to_string(),
                reason: format!("Failed to create OpenAI client: {}", e),
            })?;

    // JSON mode is the chat-completions `response_format` parameter.
    let model = client.completions_api().completion_model(&config.model);
    tracing::info!(
        "Using OpenAI-compatible API at {} (model: {})",
        config.base_url,
        config.model
    );
    Ok(Arc::new(RigAdapter::new(
        model,
        &config.model,
        "openai",
        config.timeout,
    )))
}
