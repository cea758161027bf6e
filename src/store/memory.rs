//! In-memory job store, used when no database path is configured and in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::traits::JobStore;
use crate::error::{DatabaseError, JobError};
use crate::jobs::model::{Job, JobTransition};

/// Jobs kept in a map behind an async lock. Lost on restart.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs held.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert_job(&self, job: &Job) -> Result<(), DatabaseError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(DatabaseError::Constraint(format!("job {} already exists", job.id)));
        }
        jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, DatabaseError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn transition_job(&self, id: Uuid, transition: JobTransition) -> Result<Job, JobError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&id).ok_or(JobError::NotFound { id })?;
        job.apply(transition)?;
        debug!(job_id = %id, state = %job.state, "Job transitioned");
        Ok(job.clone())
    }

    async fn list_jobs_for_ticket(&self, ticket_id: &str) -> Result<Vec<Job>, DatabaseError> {
        let jobs = self.jobs.read().await;
        let mut found: Vec<Job> = jobs
            .values()
            .filter(|j| j.ticket_id == ticket_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}
