//! Error types for the copilot service.

use std::time::Duration;

use uuid::Uuid;

use crate::jobs::model::JobState;
use crate::jobs::schemas::SchemaIssue;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// A submission rejected before any job was created.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("Invalid request body: {0}")]
    MalformedBody(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid ticketId: {0:?}")]
    InvalidTicketId(String),

    #[error("Unknown job kind: {0:?}")]
    UnknownKind(String),

    #[error("Invalid tone: {0:?} (expected professional, friendly or concise)")]
    InvalidTone(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Job kind mismatch: route expects {expected}, body says {actual}")]
    KindMismatch { expected: String, actual: String },
}

/// Ticket-data collaborator errors.
#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    #[error("Ticket {ticket_id} not found")]
    NotFound { ticket_id: String },

    #[error("Not authorized to read ticket {ticket_id}")]
    Unauthorized { ticket_id: String },

    #[error("CRM API error: {status} {reason}")]
    Status { status: u16, reason: String },

    #[error("CRM request failed: {0}")]
    Request(String),

    #[error("Invalid response from CRM API: {0}")]
    InvalidResponse(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited")]
    RateLimited { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },
}

/// Model output that failed its result contract after the repair attempt.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} output failed validation after repair: {}", summarize(.issues))]
pub struct SchemaError {
    pub kind: String,
    pub issues: Vec<SchemaIssue>,
}

fn summarize(issues: &[SchemaIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Job-related errors.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job {id} not found")]
    NotFound { id: Uuid },

    #[error("Job {id} already in state {state}, cannot transition to {target}")]
    InvalidTransition {
        id: Uuid,
        state: JobState,
        target: JobState,
    },

    #[error("Job {id} content does not match its kind {kind}")]
    ContentMismatch { id: Uuid, kind: String },

    #[error("Job store error: {0}")]
    Database(#[from] DatabaseError),
}

/// Why a unit of work ended in the `error` state.
///
/// The `Display` text is what pollers see in the job's `error` field.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Failed to fetch ticket: {0}")]
    Fetch(#[from] CrmError),

    #[error("Generation failed: {0}")]
    Generation(#[from] LlmError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Job execution panicked: {0}")]
    Panicked(String),
}

/// Errors seen by the polling client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Copilot API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response from copilot API: {0}")]
    InvalidResponse(String),

    #[error("Job {job_id} not terminal after {waited:?}")]
    Timeout { job_id: Uuid, waited: Duration },
}
