//! REST endpoints for submitting jobs and polling their status.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};
use uuid::Uuid;

use super::model::JobKind;
use super::request::{JobRequest, SubmissionBody};
use super::service::CopilotService;
use crate::error::{JobError, RequestError};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CopilotService>,
}

type ApiResponse = (StatusCode, Json<Value>);

/// Build the Axum router with the copilot REST routes.
pub fn copilot_routes(service: Arc<CopilotService>) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/health", get(health))
        .route("/api/copilot/v1/jobs", post(submit_job))
        .route("/api/copilot/v1/analyze", post(submit_analysis))
        .route("/api/copilot/v1/suggest", post(submit_next_steps))
        .route("/api/copilot/v1/draft-reply", post(submit_draft_reply))
        .route("/api/copilot/v1/chat", post(submit_chat))
        .route("/api/copilot/v1/status/{id}", get(job_status))
        .route("/api/copilot/v1/tickets/{ticket_id}/jobs", get(ticket_jobs))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "ticket-copilot"
    }))
}

// ── Responses ───────────────────────────────────────────────────────────

fn ok(status: StatusCode, data: impl serde::Serialize) -> ApiResponse {
    (status, Json(json!({ "ok": true, "data": data })))
}

fn fail(status: StatusCode, message: impl Into<String>) -> ApiResponse {
    let message: String = message.into();
    (status, Json(json!({ "ok": false, "error": message })))
}

fn not_found() -> ApiResponse {
    fail(StatusCode::NOT_FOUND, "Job not found")
}

fn internal(e: JobError) -> ApiResponse {
    error!(error = %e, "Job store request failed");
    fail(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
}

// ── Submission ──────────────────────────────────────────────────────────

async fn submit(
    state: AppState,
    body: Result<Json<SubmissionBody>, JsonRejection>,
    route_kind: Option<JobKind>,
) -> ApiResponse {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            let e = RequestError::MalformedBody(rejection.body_text());
            return fail(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    let request = match JobRequest::from_body(body, route_kind) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Rejected job submission");
            return fail(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    match state.service.submit(request).await {
        Ok(receipt) => ok(StatusCode::ACCEPTED, receipt),
        Err(e) => internal(e),
    }
}

async fn submit_job(
    State(state): State<AppState>,
    body: Result<Json<SubmissionBody>, JsonRejection>,
) -> ApiResponse {
    submit(state, body, None).await
}

async fn submit_analysis(
    State(state): State<AppState>,
    body: Result<Json<SubmissionBody>, JsonRejection>,
) -> ApiResponse {
    submit(state, body, Some(JobKind::Analysis)).await
}

async fn submit_next_steps(
    State(state): State<AppState>,
    body: Result<Json<SubmissionBody>, JsonRejection>,
) -> ApiResponse {
    submit(state, body, Some(JobKind::NextSteps)).await
}

async fn submit_draft_reply(
    State(state): State<AppState>,
    body: Result<Json<SubmissionBody>, JsonRejection>,
) -> ApiResponse {
    submit(state, body, Some(JobKind::DraftReply)).await
}

async fn submit_chat(
    State(state): State<AppState>,
    body: Result<Json<SubmissionBody>, JsonRejection>,
) -> ApiResponse {
    submit(state, body, Some(JobKind::Chat)).await
}

// ── Status ──────────────────────────────────────────────────────────────

async fn job_status(State(state): State<AppState>, Path(id): Path<String>) -> ApiResponse {
    // A malformed id cannot name a job.
    let Ok(job_id) = Uuid::parse_str(&id) else {
        return not_found();
    };

    match state.service.status(job_id).await {
        Ok(Some(view)) => ok(StatusCode::OK, view),
        Ok(None) => not_found(),
        Err(e) => internal(e),
    }
}

async fn ticket_jobs(State(state): State<AppState>, Path(ticket_id): Path<String>) -> ApiResponse {
    match state.service.jobs_for_ticket(&ticket_id).await {
        Ok(jobs) => ok(StatusCode::OK, jobs),
        Err(e) => internal(e),
    }
}
