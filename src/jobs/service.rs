//! Submission and status operations over the job store.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use super::executor::JobExecutor;
use super::model::{Job, JobReceipt, JobStatusView};
use super::request::JobRequest;
use crate::error::JobError;
use crate::store::JobStore;

/// Entry point for callers: create jobs, read their status.
pub struct CopilotService {
    store: Arc<dyn JobStore>,
    executor: Arc<JobExecutor>,
}

impl CopilotService {
    pub fn new(store: Arc<dyn JobStore>, executor: Arc<JobExecutor>) -> Self {
        Self { store, executor }
    }

    /// Create a queued job and dispatch it. Returns before the work runs.
    pub async fn submit(&self, request: JobRequest) -> Result<JobReceipt, JobError> {
        self.submit_tracked(request).await.map(|(receipt, _)| receipt)
    }

    /// Like [`submit`](Self::submit), also handing back the task handle.
    pub async fn submit_tracked(
        &self,
        request: JobRequest,
    ) -> Result<(JobReceipt, JoinHandle<()>), JobError> {
        let job = Job::new(request.kind(), request.ticket_id(), self.executor.model_name());
        self.store.insert_job(&job).await?;
        info!(
            job_id = %job.id,
            kind = %job.kind,
            ticket_id = %job.ticket_id,
            "Job queued"
        );

        let receipt = JobReceipt {
            job_id: job.id,
            state: job.state,
        };
        let handle = self.executor.spawn(job.id, request);
        Ok((receipt, handle))
    }

    /// Current status of a job, or `None` if the id is unknown.
    pub async fn status(&self, id: Uuid) -> Result<Option<JobStatusView>, JobError> {
        Ok(self.store.get_job(id).await?.map(|job| job.status_view()))
    }

    /// Status of every job recorded for a ticket, newest first.
    pub async fn jobs_for_ticket(&self, ticket_id: &str) -> Result<Vec<JobStatusView>, JobError> {
        let jobs = self.store.list_jobs_for_ticket(ticket_id).await?;
        Ok(jobs.iter().map(Job::status_view).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::crm::{TicketSnapshot, TicketSource};
    use crate::error::{CrmError, LlmError};
    use crate::jobs::model::{JobKind, JobState};
    use crate::llm::{CompletionRequest, CompletionResponse, GeneratorConfig, LlmProvider, StructuredGenerator};
    use crate::store::InMemoryJobStore;

    struct NoTickets;

    #[async_trait]
    impl TicketSource for NoTickets {
        async fn get_ticket_snapshot(&self, ticket_id: &str) -> Result<TicketSnapshot, CrmError> {
            Err(CrmError::NotFound {
                ticket_id: ticket_id.to_string(),
            })
        }
    }

    struct UnusedLlm;

    #[async_trait]
    impl LlmProvider for UnusedLlm {
        fn model_name(&self) -> &str {
            "unused-model"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            Ok(CompletionResponse {
                content: "{}".into(),
                input_tokens: 0,
                output_tokens: 0,
            })
        }
    }

    fn service() -> CopilotService {
        let store: Arc<dyn JobStore> = Arc::new(InMemoryJobStore::new());
        let generator = Arc::new(StructuredGenerator::new(Arc::new(UnusedLlm), GeneratorConfig::default()));
        let executor = Arc::new(JobExecutor::new(store.clone(), Arc::new(NoTickets), generator));
        CopilotService::new(store, executor)
    }

    #[tokio::test]
    async fn submit_returns_queued_receipt_and_records_model() {
        let service = service();
        let (receipt, handle) = service
            .submit_tracked(JobRequest::Analysis {
                ticket_id: "cticket0001".into(),
            })
            .await
            .unwrap();
        assert_eq!(receipt.state, JobState::Queued);

        handle.await.unwrap();
        let view = service.status(receipt.job_id).await.unwrap().unwrap();
        assert_eq!(view.id, receipt.job_id);
        assert_eq!(view.kind, JobKind::Analysis);
        assert_eq!(view.state, JobState::Error);
        assert!(view.content.is_none());

        let job = service.store.get_job(receipt.job_id).await.unwrap().unwrap();
        assert_eq!(job.model, "unused-model");
        assert_eq!(job.ticket_id, "cticket0001");

        let jobs = service.jobs_for_ticket("cticket0001").await.unwrap();
        assert_eq!(jobs.len(), 1);
    }

    #[tokio::test]
    async fn status_of_unknown_job_is_none() {
        let service = service();
        assert!(service.status(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn each_submission_gets_its_own_job() {
        let service = service();
        let request = JobRequest::NextSteps {
            ticket_id: "cticket0001".into(),
        };
        let a = service.submit(request.clone()).await.unwrap();
        let b = service.submit(request).await.unwrap();
        assert_ne!(a.job_id, b.job_id);
    }
}
