//! Background recalculation jobs

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::types::*;

/// Identifier of a submitted job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "error", rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for the filing key to be free
    Queued,
    Running,
    Completed,
    Failed(GstError),
    Cancelled,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed(_) | JobStatus::Cancelled
        )
    }
}

/// What callers see when polling a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub key: FilingKey,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

struct JobEntry {
    record: JobRecord,
    handle: Option<AbortHandle>,
    /// Past the point of no return: the snapshot is being written
    committing: bool,
}

fn poisoned<T>(_: PoisonError<T>) -> GstError {
    GstError::Storage("job registry lock poisoned".to_string())
}

/// Shared table of submitted jobs. Finished jobs are forgotten once they
/// are older than the retention window.
#[derive(Clone)]
pub struct JobRegistry {
    jobs: Arc<Mutex<HashMap<JobId, JobEntry>>>,
    retention: Duration,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_retention(Duration::hours(1))
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: Duration) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            retention,
        }
    }

    /// Number of jobs still tracked
    pub fn len(&self) -> GstResult<usize> {
        Ok(self.jobs.lock().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> GstResult<bool> {
        Ok(self.len()? == 0)
    }

    fn prune(&self, jobs: &mut HashMap<JobId, JobEntry>) {
        let Some(cutoff) = Utc::now().checked_sub_signed(self.retention) else {
            return;
        };
        let before = jobs.len();
        jobs.retain(|_, entry| entry.record.finished_at.map_or(true, |at| at > cutoff));
        if jobs.len() < before {
            debug!(evicted = before - jobs.len(), "evicted finished jobs");
        }
    }

    pub(crate) fn register(&self, key: FilingKey) -> GstResult<JobId> {
        let id = JobId::new();
        let record = JobRecord {
            id,
            key,
            status: JobStatus::Queued,
            submitted_at: Utc::now(),
            finished_at: None,
        };
        info!(job = %id, key = %record.key, "recalculation job queued");
        let mut jobs = self.jobs.lock().map_err(poisoned)?;
        self.prune(&mut jobs);
        jobs.insert(
            id,
            JobEntry {
                record,
                handle: None,
                committing: false,
            },
        );
        Ok(id)
    }

    pub(crate) fn attach(&self, id: JobId, handle: AbortHandle) -> GstResult<()> {
        if let Some(entry) = self.jobs.lock().map_err(poisoned)?.get_mut(&id) {
            entry.handle = Some(handle);
        }
        Ok(())
    }

    pub(crate) fn mark_running(&self, id: JobId) -> GstResult<()> {
        if let Some(entry) = self.jobs.lock().map_err(poisoned)?.get_mut(&id) {
            if entry.record.status == JobStatus::Queued {
                entry.record.status = JobStatus::Running;
                debug!(job = %id, "recalculation job running");
            }
        }
        Ok(())
    }

    /// Claim the right to persist. Returns false when the job was cancelled
    /// first.
    pub(crate) fn begin_commit(&self, id: JobId) -> GstResult<bool> {
        let mut jobs = self.jobs.lock().map_err(poisoned)?;
        match jobs.get_mut(&id) {
            Some(entry) if !entry.record.status.is_finished() => {
                entry.committing = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub(crate) fn finish(&self, id: JobId, outcome: GstResult<()>) -> GstResult<()> {
        let mut jobs = self.jobs.lock().map_err(poisoned)?;
        let Some(entry) = jobs.get_mut(&id) else {
            return Ok(());
        };
        if entry.record.status.is_finished() {
            return Ok(());
        }

        entry.record.status = match outcome {
            Ok(()) => {
                info!(job = %id, key = %entry.record.key, "recalculation job completed");
                JobStatus::Completed
            }
            Err(err) => {
                warn!(
                    job = %id,
                    key = %entry.record.key,
                    error = %err,
                    "recalculation job failed"
                );
                JobStatus::Failed(err)
            }
        };
        entry.record.finished_at = Some(Utc::now());
        entry.handle = None;
        Ok(())
    }

    /// Current state of a job
    pub fn status(&self, id: JobId) -> GstResult<JobRecord> {
        let mut jobs = self.jobs.lock().map_err(poisoned)?;
        self.prune(&mut jobs);
        jobs.get(&id)
            .map(|entry| entry.record.clone())
            .ok_or_else(|| GstError::JobNotFound(id.to_string()))
    }

    /// Abort a queued or running job. A job that already finished, or is
    /// writing its snapshot, is left alone; the returned record shows the
    /// state it ended in.
    pub fn cancel(&self, id: JobId) -> GstResult<JobRecord> {
        let mut jobs = self.jobs.lock().map_err(poisoned)?;
        let entry = jobs
            .get_mut(&id)
            .ok_or_else(|| GstError::JobNotFound(id.to_string()))?;

        if !entry.record.status.is_finished() && !entry.committing {
            if let Some(handle) = entry.handle.take() {
                handle.abort();
            }
            entry.record.status = JobStatus::Cancelled;
            entry.record.finished_at = Some(Utc::now());
            info!(job = %id, key = %entry.record.key, "recalculation job cancelled");
        }

        Ok(entry.record.clone())
    }
}
