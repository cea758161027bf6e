//! Job record, kind/state enums, and the kind-keyed content type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::schemas::{self, AnalysisResult, ChatResult, DraftReplyResult, NextStepsResult, SchemaIssue};
use crate::error::JobError;

/// Category of AI operation; fixes which result schema applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Analysis,
    NextSteps,
    DraftReply,
    Chat,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [Self::Analysis, Self::NextSteps, Self::DraftReply, Self::Chat];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::NextSteps => "next_steps",
            Self::DraftReply => "draft_reply",
            Self::Chat => "chat",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("Unknown job kind: {s}"))
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created, not yet picked up.
    Queued,
    /// The unit of work is in flight.
    Running,
    /// Terminal: content holds a validated result.
    Success,
    /// Terminal: error holds the failure description.
    Error,
}

impl JobState {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: JobState) -> bool {
        use JobState::*;

        matches!(
            (self, target),
            (Queued, Running) | (Running, Success) | (Running, Error)
        )
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown job state: {s}")),
        }
    }
}

/// Validated result payload, one variant per job kind.
///
/// Serializes as the bare payload object; the kind travels alongside it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JobContent {
    Analysis(AnalysisResult),
    NextSteps(NextStepsResult),
    DraftReply(DraftReplyResult),
    Chat(ChatResult),
}

impl JobContent {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Analysis(_) => JobKind::Analysis,
            Self::NextSteps(_) => JobKind::NextSteps,
            Self::DraftReply(_) => JobKind::DraftReply,
            Self::Chat(_) => JobKind::Chat,
        }
    }

    /// Decode a stored or polled payload for the given kind.
    pub fn decode(kind: JobKind, value: &serde_json::Value) -> Result<Self, Vec<SchemaIssue>> {
        schemas::validate_value(kind, value)
    }
}

/// A state change requested by the executor.
#[derive(Debug, Clone)]
pub enum JobTransition {
    Start,
    Succeed(JobContent),
    Fail(String),
}

impl JobTransition {
    pub fn target(&self) -> JobState {
        match self {
            Self::Start => JobState::Running,
            Self::Succeed(_) => JobState::Success,
            Self::Fail(_) => JobState::Error,
        }
    }
}

/// Durable record of one asynchronous generation request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    pub ticket_id: String,
    /// Model that serves this job.
    pub model: String,
    pub state: JobState,
    pub content: Option<JobContent>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new job in the `queued` state.
    pub fn new(kind: JobKind, ticket_id: impl Into<String>, model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind,
            ticket_id: ticket_id.into(),
            model: model.into(),
            state: JobState::Queued,
            content: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check a transition against the state machine and this job's kind.
    pub fn check_transition(&self, transition: &JobTransition) -> Result<(), JobError> {
        let target = transition.target();
        if !self.state.can_transition_to(target) {
            return Err(JobError::InvalidTransition {
                id: self.id,
                state: self.state,
                target,
            });
        }
        if let JobTransition::Succeed(content) = transition {
            if content.kind() != self.kind {
                return Err(JobError::ContentMismatch {
                    id: self.id,
                    kind: self.kind.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Apply a transition, refreshing `updated_at`.
    pub fn apply(&mut self, transition: JobTransition) -> Result<(), JobError> {
        self.check_transition(&transition)?;
        self.state = transition.target();
        match transition {
            JobTransition::Start => {}
            JobTransition::Succeed(content) => self.content = Some(content),
            JobTransition::Fail(message) => self.error = Some(message),
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Read-only projection returned to pollers.
    pub fn status_view(&self) -> JobStatusView {
        JobStatusView {
            id: self.id,
            state: self.state,
            content: self.content.clone(),
            error: self.error.clone(),
            kind: self.kind,
            updated_at: self.updated_at,
        }
    }
}

/// What the status endpoint returns for a job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusView {
    pub id: Uuid,
    pub state: JobState,
    pub content: Option<JobContent>,
    pub error: Option<String>,
    pub kind: JobKind,
    pub updated_at: DateTime<Utc>,
}

/// Immediate reply to a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReceipt {
    pub job_id: Uuid,
    pub state: JobState,
}
