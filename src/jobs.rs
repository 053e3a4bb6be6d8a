/*!
 * In-memory job table for fire-and-forget renders.
 *
 * Records live for the lifetime of the process; there is no persistence.
 */

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a submitted render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, waiting for the render lock
    Pending,
    /// Rendering
    Processing,
    /// Output written
    Completed,
    /// Render failed, see `error`
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub status: JobStatus,
    pub output: Option<PathBuf>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            output: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Shared job table
#[derive(Debug, Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<Uuid, JobRecord>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending job
    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.jobs.write().insert(id, JobRecord::new(id));
        id
    }

    pub fn get(&self, id: &Uuid) -> Option<JobRecord> {
        self.jobs.read().get(id).cloned()
    }

    pub fn mark_processing(&self, id: &Uuid) {
        self.update(id, |job| job.status = JobStatus::Processing);
    }

    pub fn mark_completed(&self, id: &Uuid, output: PathBuf) {
        self.update(id, |job| {
            job.status = JobStatus::Completed;
            job.output = Some(output);
        });
    }

    pub fn mark_failed(&self, id: &Uuid, error: impl Into<String>) {
        let error = error.into();
        self.update(id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error);
        });
    }

    // Terminal records are frozen
    fn update(&self, id: &Uuid, apply: impl FnOnce(&mut JobRecord)) {
        if let Some(job) = self.jobs.write().get_mut(id) {
            if job.status.is_terminal() {
                return;
            }
            apply(job);
            job.updated_at = Utc::now();
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}
