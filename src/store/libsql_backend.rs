//! libSQL backend for the `JobStore` trait.
//!
//! Supports local file and in-memory databases. Job content is stored as a
//! JSON text column and re-validated against its kind's schema on read.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use super::migrations;
use super::traits::JobStore;
use crate::error::{DatabaseError, JobError};
use crate::jobs::model::{Job, JobContent, JobKind, JobState, JobTransition};

/// libSQL job store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlJobStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlJobStore {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let store = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

const JOB_COLUMNS: &str = "id, kind, ticket_id, model, state, content, error, created_at, updated_at";

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    // Try RFC 3339 first (our canonical write format)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    // Try SQLite datetime() output with fractional seconds
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    // Try SQLite datetime() output without fractional seconds
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn content_to_json(content: &Option<JobContent>) -> Result<Option<String>, DatabaseError> {
    content
        .as_ref()
        .map(|c| serde_json::to_string(c).map_err(|e| DatabaseError::Serialization(e.to_string())))
        .transpose()
}

fn row_to_job(row: &libsql::Row) -> Result<Job, DatabaseError> {
    let get_err = |e: libsql::Error| DatabaseError::Query(format!("job row parse: {e}"));

    let id_str: String = row.get(0).map_err(get_err)?;
    let kind_str: String = row.get(1).map_err(get_err)?;
    let ticket_id: String = row.get(2).map_err(get_err)?;
    let model: String = row.get(3).map_err(get_err)?;
    let state_str: String = row.get(4).map_err(get_err)?;
    let content_str: Option<String> = row.get(5).map_err(get_err)?;
    let error: Option<String> = row.get(6).map_err(get_err)?;
    let created_str: String = row.get(7).map_err(get_err)?;
    let updated_str: String = row.get(8).map_err(get_err)?;

    let id = Uuid::parse_str(&id_str)
        .map_err(|e| DatabaseError::Serialization(format!("job id {id_str}: {e}")))?;
    let kind: JobKind = kind_str.parse().map_err(DatabaseError::Serialization)?;
    let state: JobState = state_str.parse().map_err(DatabaseError::Serialization)?;

    let content = match content_str {
        Some(raw) => {
            let value: serde_json::Value = serde_json::from_str(&raw)
                .map_err(|e| DatabaseError::Serialization(format!("job {id} content: {e}")))?;
            let decoded = JobContent::decode(kind, &value).map_err(|issues| {
                DatabaseError::Serialization(format!(
                    "job {id} content no longer matches {kind}: {} issue(s)",
                    issues.len()
                ))
            })?;
            Some(decoded)
        }
        None => None,
    };

    Ok(Job {
        id,
        kind,
        ticket_id,
        model,
        state,
        content,
        error,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

#[async_trait]
impl JobStore for LibSqlJobStore {
    async fn insert_job(&self, job: &Job) -> Result<(), DatabaseError> {
        let content = content_to_json(&job.content)?;
        self.conn()
            .execute(
                &format!("INSERT INTO jobs ({JOB_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
                params![
                    job.id.to_string(),
                    job.kind.as_str(),
                    job.ticket_id.as_str(),
                    job.model.as_str(),
                    job.state.as_str(),
                    content,
                    job.error.clone(),
                    job.created_at.to_rfc3339(),
                    job.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("UNIQUE") {
                    DatabaseError::Constraint(format!("insert_job: {msg}"))
                } else {
                    DatabaseError::Query(format!("insert_job: {msg}"))
                }
            })?;

        debug!(job_id = %job.id, kind = %job.kind, "Job inserted");
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_job: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_job(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_job: {e}"))),
        }
    }

    async fn transition_job(&self, id: Uuid, transition: JobTransition) -> Result<Job, JobError> {
        let mut job = self.get_job(id).await?.ok_or(JobError::NotFound { id })?;
        let from = job.state;
        job.apply(transition)?;

        // Guard on the state we read so a concurrent writer cannot be overwritten.
        let affected = self
            .conn()
            .execute(
                "UPDATE jobs SET state = ?1, content = ?2, error = ?3, updated_at = ?4 \
                 WHERE id = ?5 AND state = ?6",
                params![
                    job.state.as_str(),
                    content_to_json(&job.content)?,
                    job.error.clone(),
                    job.updated_at.to_rfc3339(),
                    id.to_string(),
                    from.as_str(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("transition_job: {e}")))?;

        if affected == 0 {
            let current = self.get_job(id).await?.ok_or(JobError::NotFound { id })?;
            return Err(JobError::InvalidTransition {
                id,
                state: current.state,
                target: job.state,
            });
        }

        debug!(job_id = %id, from = %from, to = %job.state, "Job transitioned");
        Ok(job)
    }

    async fn list_jobs_for_ticket(&self, ticket_id: &str) -> Result<Vec<Job>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {JOB_COLUMNS} FROM jobs WHERE ticket_id = ?1 ORDER BY created_at DESC"
                ),
                params![ticket_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_jobs_for_ticket: {e}")))?;

        let mut jobs = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_jobs_for_ticket: {e}")))?
        {
            jobs.push(row_to_job(&row)?);
        }
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::schemas::{DraftReplyResult, NextStepsResult, Tone};

    async fn test_store() -> LibSqlJobStore {
        LibSqlJobStore::new_memory().await.unwrap()
    }

    #[tokio::test]
    async fn insert_and_get_by_id() {
        let store = test_store().await;
        let job = Job::new(JobKind::NextSteps, "cticket0001", "gpt-4o-mini");
        store.insert_job(&job).await.unwrap();

        let fetched = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, job.id);
        assert_eq!(fetched.kind, JobKind::NextSteps);
        assert_eq!(fetched.state, JobState::Queued);
        assert_eq!(fetched.model, "gpt-4o-mini");
        assert!(fetched.content.is_none());
        assert_eq!(fetched.created_at, job.created_at);
    }

    #[tokio::test]
    async fn get_by_id_not_found() {
        let store = test_store().await;
        assert!(store.get_job(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn success_content_survives_storage() {
        let store = test_store().await;
        let job = Job::new(JobKind::DraftReply, "cticket0001", "m");
        store.insert_job(&job).await.unwrap();
        store.transition_job(job.id, JobTransition::Start).await.unwrap();

        let content = JobContent::DraftReply(DraftReplyResult {
            reply: "Thanks for reaching out.".into(),
            tone: Some(Tone::Professional),
        });
        store
            .transition_job(job.id, JobTransition::Succeed(content.clone()))
            .await
            .unwrap();

        let fetched = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(fetched.state, JobState::Success);
        assert_eq!(fetched.content, Some(content));
        assert!(fetched.error.is_none());
    }

    #[tokio::test]
    async fn invalid_transitions_are_rejected() {
        let store = test_store().await;
        let job = Job::new(JobKind::NextSteps, "cticket0001", "m");
        store.insert_job(&job).await.unwrap();

        let err = store
            .transition_job(job.id, JobTransition::Fail("early".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidTransition { .. }));

        store.transition_job(job.id, JobTransition::Start).await.unwrap();
        store
            .transition_job(job.id, JobTransition::Fail("boom".into()))
            .await
            .unwrap();
        let late = JobContent::NextSteps(NextStepsResult {
            steps: vec!["retry".into()],
        });
        assert!(store
            .transition_job(job.id, JobTransition::Succeed(late))
            .await
            .is_err());

        let fetched = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(fetched.state, JobState::Error);
        assert_eq!(fetched.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn transition_unknown_job() {
        let store = test_store().await;
        let err = store
            .transition_job(Uuid::new_v4(), JobTransition::Start)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::NotFound { .. }));
    }

    #[tokio::test]
    async fn list_for_ticket_newest_first() {
        let store = test_store().await;
        let first = Job::new(JobKind::Analysis, "cticket0001", "m");
        store.insert_job(&first).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = Job::new(JobKind::Chat, "cticket0001", "m");
        store.insert_job(&second).await.unwrap();
        store
            .insert_job(&Job::new(JobKind::Chat, "cticket0002", "m"))
            .await
            .unwrap();

        let jobs = store.list_jobs_for_ticket("cticket0001").await.unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, second.id);
        assert_eq!(jobs[1].id, first.id);
    }

    #[tokio::test]
    async fn file_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("copilot.db");
        let job = Job::new(JobKind::Analysis, "cticket0001", "m");
        {
            let store = LibSqlJobStore::new_local(&path).await.unwrap();
            store.insert_job(&job).await.unwrap();
        }
        let store = LibSqlJobStore::new_local(&path).await.unwrap();
        assert!(store.get_job(job.id).await.unwrap().is_some());
    }

    #[test]
    fn parse_datetime_accepts_sqlite_format() {
        let dt = parse_datetime("2026-01-02 03:04:05");
        assert_eq!(dt.to_rfc3339(), "2026-01-02T03:04:05+00:00");
        assert_eq!(parse_datetime("garbage"), DateTime::<Utc>::MIN_UTC);
    }
}
