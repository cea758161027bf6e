//! Background execution of jobs.
//!
//! Each submission gets its own tokio task. The task moves the job to
//! `running`, does the work (fetch, redact, prompt, generate, validate, at
//! most one repair) and always finishes by writing `success` or `error`.
//! Panics inside the work are caught at the task boundary.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::model::{Job, JobContent, JobTransition};
use super::request::JobRequest;
use super::schemas;
use crate::crm::TicketSource;
use crate::error::{ExecutionError, JobError, SchemaError};
use crate::llm::{StructuredGenerator, prompts};
use crate::safety::LeakDetector;
use crate::store::JobStore;

/// Tries per state write before the job is left where it is.
const STORE_WRITE_ATTEMPTS: u32 = 3;
const STORE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Runs jobs against the ticket source and the model.
pub struct JobExecutor {
    store: Arc<dyn JobStore>,
    tickets: Arc<dyn TicketSource>,
    generator: Arc<StructuredGenerator>,
    detector: LeakDetector,
}

impl JobExecutor {
    pub fn new(
        store: Arc<dyn JobStore>,
        tickets: Arc<dyn TicketSource>,
        generator: Arc<StructuredGenerator>,
    ) -> Self {
        Self {
            store,
            tickets,
            generator,
            detector: LeakDetector::new(),
        }
    }

    /// Model that serves jobs run by this executor.
    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    /// Dispatch a queued job. Returns as soon as the task is spawned.
    pub fn spawn(self: &Arc<Self>, job_id: Uuid, request: JobRequest) -> JoinHandle<()> {
        let executor = Arc::clone(self);
        tokio::spawn(async move {
            executor.run(job_id, request).await;
        })
    }

    /// Drive one job from `queued` to a terminal state.
    pub async fn run(&self, job_id: Uuid, request: JobRequest) {
        let kind = request.kind();
        if let Err(e) = self.record(job_id, JobTransition::Start).await {
            error!(job_id = %job_id, kind = %kind, error = %e, "Could not start job");
            return;
        }
        info!(job_id = %job_id, kind = %kind, ticket_id = request.ticket_id(), "Job running");

        let outcome = AssertUnwindSafe(self.execute(&request))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ExecutionError::Panicked(panic_message(panic.as_ref()))));

        let transition = match outcome {
            Ok(content) => JobTransition::Succeed(content),
            Err(e) => {
                warn!(job_id = %job_id, kind = %kind, error = %e, "Job failed");
                JobTransition::Fail(e.to_string())
            }
        };

        match self.record(job_id, transition).await {
            Ok(job) => info!(job_id = %job_id, kind = %kind, state = %job.state, "Job finished"),
            Err(e) => error!(
                job_id = %job_id,
                kind = %kind,
                error = %e,
                "Failed to record terminal job state"
            ),
        }
    }

    /// Write a transition, retrying store failures a bounded number of times.
    /// Lifecycle conflicts (unknown job, wrong state) come back at once.
    async fn record(&self, job_id: Uuid, transition: JobTransition) -> Result<Job, JobError> {
        let mut attempt = 1;
        loop {
            match self.store.transition_job(job_id, transition.clone()).await {
                Err(JobError::Database(e)) if attempt < STORE_WRITE_ATTEMPTS => {
                    warn!(job_id = %job_id, attempt, error = %e, "Job store write failed, retrying");
                    tokio::time::sleep(STORE_RETRY_DELAY * attempt).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// The unit of work. Every failure comes back as an [`ExecutionError`].
    async fn execute(&self, request: &JobRequest) -> Result<JobContent, ExecutionError> {
        let kind = request.kind();
        let snapshot = self.tickets.get_ticket_snapshot(request.ticket_id()).await?;
        let redacted = self.detector.redact_snapshot(&snapshot);
        let prompt = prompts::build_prompt(request, &redacted);

        let raw = self.generator.generate(&prompt).await?;
        let issues = match schemas::validate_output(kind, &raw) {
            Ok(content) => return Ok(content),
            Err(issues) => issues,
        };

        warn!(kind = %kind, issues = issues.len(), "Model output failed validation, repairing");
        let repaired = self.generator.repair(&prompt, &raw, &issues).await?;
        schemas::validate_output(kind, &repaired).map_err(|issues| {
            ExecutionError::Schema(SchemaError {
                kind: kind.to_string(),
                issues,
            })
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
