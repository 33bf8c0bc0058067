//! Background provisioning jobs.
//!
//! Provisioning takes tens of seconds (team creation is polled), so it runs
//! as a spawned task the caller can poll and abort.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::ProvisionReport;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum JobState {
    Running,
    Succeeded { report: ProvisionReport },
    Failed { code: String, message: String },
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobView {
    pub id: Uuid,
    pub event_id: String,
    #[serde(flatten)]
    pub state: JobState,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

struct JobEntry {
    view: JobView,
    handle: Option<JoinHandle<()>>,
}

/// Finished jobs stay queryable for this long.
const FINISHED_JOB_RETENTION_MINUTES: i64 = 60;

/// Running and recently finished jobs.
///
/// Finished jobs past their retention are dropped whenever a new job starts.
#[derive(Clone)]
pub struct JobRegistry {
    inner: Arc<RwLock<HashMap<Uuid, JobEntry>>>,
    retention: Duration,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_retention(Duration::minutes(FINISHED_JOB_RETENTION_MINUTES))
    }
}

impl JobRegistry {
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            retention,
        }
    }

    /// Run `work` in the background and track its outcome.
    pub async fn spawn<F>(&self, event_id: &str, work: F) -> Uuid
    where
        F: Future<Output = Result<ProvisionReport, AppError>> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let view = JobView {
            id,
            event_id: event_id.to_string(),
            state: JobState::Running,
            started_at: Utc::now(),
            finished_at: None,
        };
        {
            let mut jobs = self.inner.write().await;
            let now = Utc::now();
            let before = jobs.len();
            jobs.retain(|_, e| match e.view.finished_at {
                Some(finished) => now - finished < self.retention,
                None => true,
            });
            let pruned = before - jobs.len();
            if pruned > 0 {
                tracing::debug!(pruned, "Dropped finished jobs");
            }
            jobs.insert(id, JobEntry { view, handle: None });
        }

        let registry = self.clone();
        let handle = tokio::spawn(async move {
            let result = work.await;
            registry.finish(id, result).await;
        });

        if let Some(entry) = self.inner.write().await.get_mut(&id) {
            if entry.view.state == JobState::Running {
                entry.handle = Some(handle);
            }
        }
        id
    }

    pub async fn get(&self, id: Uuid) -> Result<JobView, AppError> {
        self.inner
            .read()
            .await
            .get(&id)
            .map(|e| e.view.clone())
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))
    }

    /// Whether a job for `event_id` is still running.
    pub async fn is_running(&self, event_id: &str) -> bool {
        self.inner
            .read()
            .await
            .values()
            .any(|e| e.view.event_id == event_id && e.view.state == JobState::Running)
    }

    /// Abort a running job.
    ///
    /// Remote calls already issued are not rolled back; a team created before
    /// the abort stays in place.
    pub async fn cancel(&self, id: Uuid) -> Result<JobView, AppError> {
        let mut jobs = self.inner.write().await;
        let entry = jobs
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;

        if entry.view.state != JobState::Running {
            return Err(AppError::Validation(format!("Job {} already finished", id)));
        }
        if let Some(handle) = entry.handle.take() {
            handle.abort();
        }
        entry.view.state = JobState::Cancelled;
        entry.view.finished_at = Some(Utc::now());
        tracing::warn!(job_id = %id, event_id = %entry.view.event_id, "Provisioning job cancelled");
        Ok(entry.view.clone())
    }

    async fn finish(&self, id: Uuid, result: Result<ProvisionReport, AppError>) {
        let mut jobs = self.inner.write().await;
        let Some(entry) = jobs.get_mut(&id) else {
            return;
        };
        if entry.view.state != JobState::Running {
            return;
        }
        entry.view.state = match result {
            Ok(report) => JobState::Succeeded { report },
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Provisioning job failed");
                JobState::Failed {
                    code: e.error_code().to_string(),
                    message: e.message(),
                }
            }
        };
        entry.view.finished_at = Some(Utc::now());
        entry.handle = None;
    }
}
