//! Result contracts for each job kind.
//!
//! Model output is parsed into the typed result for its kind, then checked
//! against the bounds serde cannot express (lengths, counts, ranges). Every
//! problem is reported as a [`SchemaIssue`] so the executor can feed the
//! list back to the model in a repair request.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use super::model::{JobContent, JobKind};

pub const MAX_NEXT_STEPS: usize = 5;
pub const MAX_STEP_CHARS: usize = 200;
pub const MAX_REPLY_CHARS: usize = 2000;
pub const MAX_ANSWER_CHARS: usize = 1000;

/// One validation failure, located by a JSON-path-like string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaIssue {
    pub path: String,
    pub message: String,
}

impl SchemaIssue {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Tone of a drafted reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Professional,
    Friendly,
    Concise,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Professional => "professional",
            Self::Friendly => "friendly",
            Self::Concise => "concise",
        }
    }

    /// How the tone is described to the model.
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::Professional => "formal and respectful",
            Self::Friendly => "warm and conversational",
            Self::Concise => "brief and to-the-point",
        }
    }
}

impl std::fmt::Display for Tone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Tone {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "professional" => Ok(Self::Professional),
            "friendly" => Ok(Self::Friendly),
            "concise" => Ok(Self::Concise),
            _ => Err(format!("Unknown tone: {s}")),
        }
    }
}

/// Environment details pulled out of the ticket text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedSignals {
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    pub error_strings: Vec<String>,
    pub urls: Vec<String>,
}

/// A candidate root cause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hypothesis {
    pub cause: String,
    pub evidence: Vec<String>,
    pub confidence: f64,
    pub tests: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub extracted_signals: ExtractedSignals,
    pub hypotheses: Vec<Hypothesis>,
    pub clarifying_questions: Vec<String>,
    pub next_steps: Vec<String>,
    pub risk_flags: Vec<String>,
    pub escalation_when: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextStepsResult {
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftReplyResult {
    pub reply: String,
    #[serde(default, deserialize_with = "non_null", skip_serializing_if = "Option::is_none")]
    pub tone: Option<Tone>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResult {
    pub answer: String,
}

/// Optional fields may be left out, but an explicit `null` is rejected.
fn non_null<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// A typed result with bounds beyond what its serde shape enforces.
trait ResultSchema: DeserializeOwned {
    fn check(&self, issues: &mut Vec<SchemaIssue>);
}

fn check_len(issues: &mut Vec<SchemaIssue>, path: String, value: &str, min: usize, max: usize) {
    let len = value.chars().count();
    if len < min {
        issues.push(SchemaIssue::new(
            path,
            format!("must contain at least {min} character(s)"),
        ));
    } else if len > max {
        issues.push(SchemaIssue::new(
            path,
            format!("must contain at most {max} characters, got {len}"),
        ));
    }
}

impl ResultSchema for AnalysisResult {
    fn check(&self, issues: &mut Vec<SchemaIssue>) {
        for (i, h) in self.hypotheses.iter().enumerate() {
            if !(0.0..=1.0).contains(&h.confidence) {
                issues.push(SchemaIssue::new(
                    format!("hypotheses[{i}].confidence"),
                    format!("must be between 0 and 1, got {}", h.confidence),
                ));
            }
        }
    }
}

impl ResultSchema for NextStepsResult {
    fn check(&self, issues: &mut Vec<SchemaIssue>) {
        if self.steps.is_empty() {
            issues.push(SchemaIssue::new("steps", "must contain at least 1 step"));
        } else if self.steps.len() > MAX_NEXT_STEPS {
            issues.push(SchemaIssue::new(
                "steps",
                format!("must contain at most {MAX_NEXT_STEPS} steps, got {}", self.steps.len()),
            ));
        }
        for (i, step) in self.steps.iter().enumerate() {
            check_len(issues, format!("steps[{i}]"), step, 1, MAX_STEP_CHARS);
        }
    }
}

impl ResultSchema for DraftReplyResult {
    fn check(&self, issues: &mut Vec<SchemaIssue>) {
        check_len(issues, "reply".to_string(), &self.reply, 1, MAX_REPLY_CHARS);
    }
}

impl ResultSchema for ChatResult {
    fn check(&self, issues: &mut Vec<SchemaIssue>) {
        check_len(issues, "answer".to_string(), &self.answer, 1, MAX_ANSWER_CHARS);
    }
}

fn parse<T: ResultSchema>(value: &serde_json::Value) -> Result<T, Vec<SchemaIssue>> {
    if !value.is_object() {
        return Err(vec![SchemaIssue::new("$", "expected a JSON object")]);
    }
    let parsed: T = serde_json::from_value(value.clone())
        .map_err(|e| vec![SchemaIssue::new("$", e.to_string())])?;
    let mut issues = Vec::new();
    parsed.check(&mut issues);
    if issues.is_empty() {
        Ok(parsed)
    } else {
        Err(issues)
    }
}

/// Validate an already-parsed JSON value against the contract for `kind`.
pub fn validate_value(kind: JobKind, value: &serde_json::Value) -> Result<JobContent, Vec<SchemaIssue>> {
    match kind {
        JobKind::Analysis => parse(value).map(JobContent::Analysis),
        JobKind::NextSteps => parse(value).map(JobContent::NextSteps),
        JobKind::DraftReply => parse(value).map(JobContent::DraftReply),
        JobKind::Chat => parse(value).map(JobContent::Chat),
    }
}

/// Validate raw model output (JSON text) against the contract for `kind`.
pub fn validate_output(kind: JobKind, raw: &str) -> Result<JobContent, Vec<SchemaIssue>> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| vec![SchemaIssue::new("$", format!("output is not valid JSON: {e}"))])?;
    validate_value(kind, &value)
}

/// Human-readable description of the contract, used in prompts.
pub fn contract_description(kind: JobKind) -> &'static str {
    match kind {
        JobKind::Analysis => {
            r#"{
  "extractedSignals": {
    "product"?: string, "platform"?: string, "os"?: string,
    "browser"?: string, "appVersion"?: string, "device"?: string,
    "errorStrings": string[], "urls": string[]
  },
  "hypotheses": [{ "cause": string, "evidence": string[], "confidence": number between 0 and 1, "tests": string[] }],
  "clarifyingQuestions": string[],
  "nextSteps": string[],
  "riskFlags": string[],
  "escalationWhen": string[]
}
All six top-level fields are required; use empty arrays when nothing applies."#
        }
        JobKind::NextSteps => {
            r#"{ "steps": string[] }
Between 1 and 5 steps, each 1-200 characters."#
        }
        JobKind::DraftReply => {
            r#"{ "reply": string, "tone"?: "professional" | "friendly" | "concise" }
The reply must be 1-2000 characters."#
        }
        JobKind::Chat => {
            r#"{ "answer": string }
The answer must be 1-1000 characters."#
        }
    }
}
