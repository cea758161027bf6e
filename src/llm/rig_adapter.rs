//! Bridges rig's `CompletionModel` to our [`LlmProvider`] trait.
//!
//! rig owns the HTTP transport and the provider wire format. The adapter
//! maps our chat messages onto rig's preamble/history/prompt split, passes
//! JSON mode through as `response_format`, and folds rig's errors into
//! [`LlmError`].

use std::time::Duration;

use async_trait::async_trait;
use rig::completion::message::{AssistantContent, Message};
use rig::completion::{CompletionError, CompletionModel};
use serde_json::json;
use tracing::{debug, warn};

use super::provider::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider, Role};
use crate::error::LlmError;

/// A rig completion model exposed as an [`LlmProvider`].
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
    provider: &'static str,
    timeout: Duration,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str, provider: &'static str, timeout: Duration) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            provider,
            timeout,
        }
    }
}

/// Our flat message list, reshaped the way rig wants it.
#[derive(Debug)]
struct Conversation {
    preamble: Option<String>,
    history: Vec<Message>,
    prompt: Message,
}

fn split_messages(provider: &str, mut messages: Vec<ChatMessage>) -> Result<Conversation, LlmError> {
    let prompt = match messages.pop() {
        Some(last) if last.role == Role::User => Message::user(last.content),
        _ => {
            return Err(LlmError::RequestFailed {
                provider: provider.to_string(),
                reason: "conversation must end with a user message".to_string(),
            });
        }
    };

    let mut system = Vec::new();
    let mut history = Vec::new();
    for message in messages {
        match message.role {
            Role::System => system.push(message.content),
            Role::User => history.push(Message::user(message.content)),
            Role::Assistant => history.push(Message::assistant(message.content)),
        }
    }

    Ok(Conversation {
        preamble: (!system.is_empty()).then(|| system.join("\n\n")),
        history,
        prompt,
    })
}

/// rig reports provider rejections as text; pick out rate limits and bad keys.
fn map_completion_error(provider: &str, err: CompletionError) -> LlmError {
    let message = match err {
        CompletionError::ProviderError(message) => message,
        CompletionError::ResponseError(reason) => {
            return LlmError::InvalidResponse {
                provider: provider.to_string(),
                reason,
            };
        }
        other => other.to_string(),
    };

    let lower = message.to_lowercase();
    if lower.contains("rate_limit") || lower.contains("rate limit") || lower.contains("429") {
        LlmError::RateLimited {
            provider: provider.to_string(),
        }
    } else if lower.contains("invalid_api_key")
        || lower.contains("incorrect api key")
        || lower.contains("401")
        || lower.contains("unauthorized")
    {
        LlmError::AuthFailed {
            provider: provider.to_string(),
        }
    } else {
        LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: message,
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let conversation = split_messages(self.provider, request.messages)?;

        let mut builder = self
            .model
            .completion_request(conversation.prompt)
            .messages(conversation.history);
        if let Some(preamble) = conversation.preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }
        if request.json_mode {
            builder = builder.additional_params(json!({
                "response_format": { "type": "json_object" }
            }));
        }

        let response = tokio::time::timeout(self.timeout, builder.send())
            .await
            .map_err(|_| LlmError::RequestFailed {
                provider: self.provider.to_string(),
                reason: format!("request timed out after {:?}", self.timeout),
            })?
            .map_err(|e| {
                let err = map_completion_error(self.provider, e);
                warn!(model = %self.model_name, error = %err, "Completion request failed");
                err
            })?;

        let content: String = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect();
        if content.trim().is_empty() {
            return Err(LlmError::InvalidResponse {
                provider: self.provider.to_string(),
                reason: "response has no text content".to_string(),
            });
        }

        let input_tokens = u32::try_from(response.usage.input_tokens).unwrap_or(u32::MAX);
        let output_tokens = u32::try_from(response.usage.output_tokens).unwrap_or(u32::MAX);
        debug!(input_tokens, output_tokens, "Completion received");

        Ok(CompletionResponse {
            content,
            input_tokens,
            output_tokens,
        })
    }
}
