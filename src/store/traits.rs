//! Backend-agnostic `JobStore` trait.
//!
//! Every state change goes through [`JobStore::transition_job`], which
//! checks the transition against the job's current state atomically, so a
//! job never moves backwards or leaves a terminal state.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{DatabaseError, JobError};
use crate::jobs::model::{Job, JobTransition};

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a freshly created job.
    async fn insert_job(&self, job: &Job) -> Result<(), DatabaseError>;

    /// Get a job by ID.
    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, DatabaseError>;

    /// Apply a transition and return the updated job.
    ///
    /// Fails with [`JobError::NotFound`] for unknown ids and
    /// [`JobError::InvalidTransition`] when the current state does not allow it.
    async fn transition_job(&self, id: Uuid, transition: JobTransition) -> Result<Job, JobError>;

    /// All jobs for a ticket, newest first.
    async fn list_jobs_for_ticket(&self, ticket_id: &str) -> Result<Vec<Job>, DatabaseError>;
}
