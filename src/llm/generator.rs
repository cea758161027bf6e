//! Structured generation: prompt in, JSON text out.
//!
//! [`StructuredGenerator`] is the only thing the executor talks to. It owns
//! the completion settings, extracts the JSON object from whatever the model
//! wrapped it in, and knows how to ask for exactly one correction.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::prompts::{self, PromptSpec};
use super::provider::{ChatMessage, CompletionRequest, LlmProvider};
use crate::error::LlmError;
use crate::jobs::schemas::SchemaIssue;

/// Completion settings for structured generation.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// LLM temperature.
    pub temperature: f32,
    /// Max tokens for the LLM response.
    pub max_tokens: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 1500,
        }
    }
}

/// Asks a language model for JSON objects.
pub struct StructuredGenerator {
    llm: Arc<dyn LlmProvider>,
    config: GeneratorConfig,
}

impl StructuredGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, config: GeneratorConfig) -> Self {
        Self { llm, config }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    fn request(&self, messages: Vec<ChatMessage>) -> CompletionRequest {
        CompletionRequest::new(messages)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens)
            .with_json_mode()
    }

    async fn run(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
        let response = self.llm.complete(self.request(messages)).await?;
        if response.output_tokens >= self.config.max_tokens {
            warn!(
                output_tokens = response.output_tokens,
                "Completion hit the token limit; output may be truncated"
            );
        }
        debug!(
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            bytes = response.content.len(),
            "Structured completion received"
        );
        Ok(extract_json_object(&response.content))
    }

    /// First-pass generation for a prompt. Returns JSON text, unvalidated.
    pub async fn generate(&self, prompt: &PromptSpec) -> Result<String, LlmError> {
        info!(kind = %prompt.kind, model = self.model_name(), "Requesting structured output");
        self.run(vec![
            ChatMessage::system(&prompt.system),
            ChatMessage::user(&prompt.user),
        ])
        .await
    }

    /// Repair round-trip: replay the conversation with the invalid answer
    /// and the validation issues, asking for a corrected object.
    pub async fn repair(
        &self,
        prompt: &PromptSpec,
        invalid_output: &str,
        issues: &[SchemaIssue],
    ) -> Result<String, LlmError> {
        info!(kind = %prompt.kind, issues = issues.len(), "Requesting repaired output");
        self.run(vec![
            ChatMessage::system(&prompt.system),
            ChatMessage::user(&prompt.user),
            ChatMessage::assistant(invalid_output),
            ChatMessage::user(prompts::repair_instruction(prompt.kind, issues)),
        ])
        .await
    }
}

/// Extract a JSON object from LLM output that might contain markdown or extra text.
pub fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    // Already a JSON object
    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    // Wrapped in markdown code block
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    // Try to find object bounds
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            if end > start {
                return trimmed[start..=end].to_string();
            }
        }
    }

    // Give up, return as-is and let validation report it
    warn!(bytes = trimmed.len(), "Could not extract JSON object from LLM response");
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::jobs::model::JobKind;
    use crate::llm::provider::{CompletionResponse, Role};

    /// Records every request and answers from a script.
    struct ScriptedLlm {
        replies: Mutex<Vec<String>>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        fn new(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            self.seen.lock().unwrap().push(request);
            let content = self.replies.lock().unwrap().pop().unwrap_or_default();
            Ok(CompletionResponse {
                content,
                input_tokens: 0,
                output_tokens: 0,
            })
        }
    }

    fn prompt() -> PromptSpec {
        PromptSpec {
            kind: JobKind::Chat,
            system: "sys".into(),
            user: "question".into(),
        }
    }

    #[tokio::test]
    async fn generate_sends_json_mode_request_and_extracts_object() {
        let llm = Arc::new(ScriptedLlm::new(&["Sure:\n```json\n{\"answer\": \"yes\"}\n```"]));
        let generator = StructuredGenerator::new(llm.clone(), GeneratorConfig::default());

        let raw = generator.generate(&prompt()).await.unwrap();
        assert_eq!(raw, r#"{"answer": "yes"}"#);

        let seen = llm.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].json_mode);
        assert_eq!(seen[0].messages.len(), 2);
        assert_eq!(seen[0].messages[0].role, Role::System);
    }

    #[tokio::test]
    async fn repair_replays_invalid_answer_and_issues() {
        let llm = Arc::new(ScriptedLlm::new(&[r#"{"answer": "fixed"}"#]));
        let generator = StructuredGenerator::new(llm.clone(), GeneratorConfig::default());
        let issues = vec![SchemaIssue {
            path: "answer".into(),
            message: "must contain at least 1 character(s)".into(),
        }];

        let raw = generator
            .repair(&prompt(), r#"{"answer": ""}"#, &issues)
            .await
            .unwrap();
        assert_eq!(raw, r#"{"answer": "fixed"}"#);

        let seen = llm.seen.lock().unwrap();
        let messages = &seen[0].messages;
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[2].content, r#"{"answer": ""}"#);
        assert!(messages[3].content.contains("answer: must contain at least 1 character(s)"));
    }

    #[test]
    fn extract_json_direct() {
        let input = r#"{"steps": ["a"]}"#;
        assert_eq!(extract_json_object(input), input);
    }

    #[test]
    fn extract_json_from_bare_fence() {
        let input = "```\n{\"reply\": \"hi\"}\n```";
        assert_eq!(extract_json_object(input), r#"{"reply": "hi"}"#);
    }

    #[test]
    fn extract_json_with_surrounding_text() {
        let input = "Here you go: {\"answer\": \"ok\"} hope that helps";
        assert_eq!(extract_json_object(input), r#"{"answer": "ok"}"#);
    }

    #[test]
    fn extract_json_gives_up_on_plain_text() {
        assert_eq!(extract_json_object("  no json here "), "no json here");
    }
}
