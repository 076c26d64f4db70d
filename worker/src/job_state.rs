// ==============================================================================
// job_state.rs - Job State Collaborator
// ==============================================================================
// Description: Job lifecycle records and the state reporter interface
// Author: CBD Service Team
// Created: 2026-07-16
// Modified: 2026-08-21
// Version: 1.1.0
// ==============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

/// Job lifecycle status.
///
/// Transitions are monotonic: Queued -> Running -> Done, with Error
/// reachable from any non-terminal status. Done and Error are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        match (self, next) {
            (JobStatus::Queued, JobStatus::Running) => true,
            (JobStatus::Running, JobStatus::Done) => true,
            (current, JobStatus::Error) => !current.is_terminal(),
            _ => false,
        }
    }
}

/// Persisted record for one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub description: String,
    pub status: JobStatus,
    pub progress: u32,
    pub progress_max: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub estimated_completion: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub results: Option<serde_json::Value>,
}

/// External collaborator receiving job progress and completion events.
///
/// `update_progress` is best-effort telemetry; callers swallow its errors.
/// `complete_job` must be attempted on every exit path.
#[async_trait]
pub trait JobStateReporter: Send + Sync {
    async fn create_job(&self, description: &str, progress_max: u32) -> Result<Uuid>;

    async fn update_progress(
        &self,
        job_id: Uuid,
        message: &str,
        delta: u32,
        estimated_completion: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn complete_job(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error: Option<String>,
        results: Option<serde_json::Value>,
    ) -> Result<()>;
}

/// Filesystem-backed job state, one JSON record per job.
pub struct FileJobState {
    dir: PathBuf,
}

impl FileJobState {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileJobState { dir: dir.into() }
    }

    fn record_path(&self, job_id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", job_id))
    }

    async fn load(&self, job_id: Uuid) -> Result<JobRecord> {
        let contents = tokio::fs::read_to_string(self.record_path(job_id))
            .await
            .with_context(|| format!("job '{}' not found", job_id))?;
        serde_json::from_str(&contents).context("invalid job record")
    }

    async fn save(&self, record: &JobRecord) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .context("failed to create job state directory")?;
        let contents = serde_json::to_string_pretty(record)?;
        tokio::fs::write(self.record_path(record.id), contents)
            .await
            .with_context(|| format!("failed to write job record '{}'", record.id))?;
        Ok(())
    }

    /// Create the record for a job whose id was assigned at submission.
    ///
    /// Existing records are left untouched so a restarted worker does not
    /// reset a job's history.
    pub async fn ensure_job(&self, job_id: Uuid, description: &str, progress_max: u32) -> Result<()> {
        if self.load(job_id).await.is_ok() {
            return Ok(());
        }
        let now = Utc::now();
        self.save(&JobRecord {
            id: job_id,
            description: description.to_string(),
            status: JobStatus::Queued,
            progress: 0,
            progress_max,
            created_at: now,
            updated_at: now,
            estimated_completion: None,
            last_message: None,
            error: None,
            results: None,
        })
        .await
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<JobRecord> {
        self.load(job_id).await
    }
}

#[async_trait]
impl JobStateReporter for FileJobState {
    async fn create_job(&self, description: &str, progress_max: u32) -> Result<Uuid> {
        let job_id = Uuid::new_v4();
        self.ensure_job(job_id, description, progress_max).await?;
        debug!("created job '{}'", job_id);
        Ok(job_id)
    }

    async fn update_progress(
        &self,
        job_id: Uuid,
        message: &str,
        delta: u32,
        estimated_completion: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut record = self.load(job_id).await?;

        if record.status == JobStatus::Queued {
            record.status = JobStatus::Running;
        } else if record.status.is_terminal() {
            anyhow::bail!(
                "job '{}' is already {:?} and cannot receive progress",
                job_id,
                record.status
            );
        }

        record.progress += delta;
        record.last_message = Some(message.to_string());
        record.estimated_completion = estimated_completion;
        record.updated_at = Utc::now();
        self.save(&record).await
    }

    async fn complete_job(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error: Option<String>,
        results: Option<serde_json::Value>,
    ) -> Result<()> {
        if !status.is_terminal() {
            anyhow::bail!("completion status must be terminal, got {:?}", status);
        }

        let mut record = self.load(job_id).await?;
        if !record.status.can_transition_to(status) {
            anyhow::bail!(
                "job '{}' cannot move from {:?} to {:?}",
                job_id,
                record.status,
                status
            );
        }

        record.status = status;
        record.error = error;
        record.results = results;
        record.updated_at = Utc::now();
        self.save(&record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_status_transitions_are_monotonic() {
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Done));
        assert!(JobStatus::Queued.can_transition_to(JobStatus::Error));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Error));

        // No regression out of terminal states
        assert!(!JobStatus::Done.can_transition_to(JobStatus::Running));
        assert!(!JobStatus::Done.can_transition_to(JobStatus::Error));
        assert!(!JobStatus::Error.can_transition_to(JobStatus::Running));
        assert!(!JobStatus::Running.can_transition_to(JobStatus::Queued));
    }

    #[tokio::test]
    async fn test_job_lifecycle() {
        let dir = TempDir::new().unwrap();
        let state = FileJobState::new(dir.path());

        let job_id = state.create_job("build distance matrix", 6).await.unwrap();
        let record = state.get_job(job_id).await.unwrap();
        assert_eq!(record.status, JobStatus::Queued);
        assert_eq!(record.progress, 0);

        state
            .update_progress(job_id, "extracting sequence files", 1, None)
            .await
            .unwrap();
        let record = state.get_job(job_id).await.unwrap();
        assert_eq!(record.status, JobStatus::Running);
        assert_eq!(record.progress, 1);
        assert_eq!(
            record.last_message.as_deref(),
            Some("extracting sequence files")
        );

        state
            .complete_job(
                job_id,
                JobStatus::Done,
                None,
                Some(serde_json::json!({"blobs": ["x"]})),
            )
            .await
            .unwrap();
        let record = state.get_job(job_id).await.unwrap();
        assert_eq!(record.status, JobStatus::Done);
        assert!(record.results.is_some());
    }

    #[tokio::test]
    async fn test_terminal_job_rejects_further_updates() {
        let dir = TempDir::new().unwrap();
        let state = FileJobState::new(dir.path());

        let job_id = state.create_job("build", 6).await.unwrap();
        state
            .complete_job(job_id, JobStatus::Error, Some("boom".to_string()), None)
            .await
            .unwrap();

        assert!(state
            .update_progress(job_id, "late update", 1, None)
            .await
            .is_err());
        assert!(state
            .complete_job(job_id, JobStatus::Done, None, None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_complete_requires_terminal_status() {
        let dir = TempDir::new().unwrap();
        let state = FileJobState::new(dir.path());
        let job_id = state.create_job("build", 6).await.unwrap();

        assert!(state
            .complete_job(job_id, JobStatus::Running, None, None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_ensure_job_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let state = FileJobState::new(dir.path());
        let job_id = Uuid::new_v4();

        state.ensure_job(job_id, "build", 6).await.unwrap();
        state
            .update_progress(job_id, "extracting sequence files", 1, None)
            .await
            .unwrap();
        state.ensure_job(job_id, "build", 6).await.unwrap();

        // The second ensure did not reset progress
        let record = state.get_job(job_id).await.unwrap();
        assert_eq!(record.progress, 1);
    }
}
