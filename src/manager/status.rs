// ABOUTME: Work Status Table: per-Job lifecycle state of outstanding image work.
// ABOUTME: One mutex guards the whole map so every transition is atomic to readers.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::types::{ImageWorkRequest, JobName};

/// Lifecycle state of one Job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WorkResultStatus {
    JobCreated,
    Succeeded,
    Failed,
}

impl WorkResultStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkResultStatus::JobCreated)
    }
}

impl std::fmt::Display for WorkResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkResultStatus::JobCreated => write!(f, "job created"),
            WorkResultStatus::Succeeded => write!(f, "succeeded"),
            WorkResultStatus::Failed => write!(f, "failed"),
        }
    }
}

/// How a Job's Pod ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodOutcome {
    Succeeded,
    Failed {
        reason: Option<String>,
        message: Option<String>,
    },
}

/// A table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageWorkResult {
    /// The request that created the Job.
    pub request: ImageWorkRequest,
    pub status: WorkResultStatus,
    /// Failure reason, when the Pod reported one.
    pub reason: Option<String>,
    pub message: Option<String>,
}

impl ImageWorkResult {
    pub fn job_created(request: ImageWorkRequest) -> Self {
        Self {
            request,
            status: WorkResultStatus::JobCreated,
            reason: None,
            message: None,
        }
    }

    /// Image caches are identified by name alone. Callers run one manager per
    /// controller namespace, so a name never refers to two caches.
    fn belongs_to(&self, image_cache: &str) -> bool {
        self.request.image_cache_name() == Some(image_cache)
    }
}

/// Shared, cloneable handle to the table.
#[derive(Debug, Clone, Default)]
pub struct WorkStatusTable {
    entries: Arc<Mutex<HashMap<JobName, ImageWorkResult>>>,
}

impl WorkStatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new entry, replacing any entry under the same Job name.
    pub fn insert(&self, job: JobName, result: ImageWorkResult) -> Option<ImageWorkResult> {
        self.entries.lock().insert(job, result)
    }

    pub fn get(&self, job: &str) -> Option<ImageWorkResult> {
        self.entries.lock().get(job).cloned()
    }

    /// Move a `JobCreated` entry to its terminal state.
    ///
    /// Returns `true` if the entry transitioned. Unknown jobs and entries that
    /// are already terminal are left untouched.
    pub fn finalize(&self, job: &str, outcome: &PodOutcome) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(job) else {
            return false;
        };
        if entry.status.is_terminal() {
            return false;
        }

        match outcome {
            PodOutcome::Succeeded => entry.status = WorkResultStatus::Succeeded,
            PodOutcome::Failed { reason, message } => {
                entry.status = WorkResultStatus::Failed;
                entry.reason = reason.clone();
                entry.message = message.clone();
            }
        }
        true
    }

    /// Fill in a failure reason that was not known when the entry was finalized.
    pub fn annotate_failure(&self, job: &str, reason: Option<String>, message: Option<String>) {
        if let Some(entry) = self.entries.lock().get_mut(job)
            && entry.status == WorkResultStatus::Failed
            && entry.reason.is_none()
        {
            entry.reason = reason;
            entry.message = message;
        }
    }

    /// Entries owned by the image cache named `image_cache`, ordered by Job name.
    ///
    /// The cache's namespace is not compared.
    pub fn entries_for_cache(&self, image_cache: &str) -> Vec<(JobName, ImageWorkResult)> {
        let mut matching: Vec<_> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, result)| result.belongs_to(image_cache))
            .map(|(job, result)| (job.clone(), result.clone()))
            .collect();
        matching.sort_by(|(a, _), (b, _)| a.cmp(b));
        matching
    }

    pub fn remove(&self, job: &str) -> Option<ImageWorkResult> {
        self.entries.lock().remove(job)
    }

    /// Drop every terminal entry of `image_cache`. Returns how many were dropped.
    pub fn prune_image_cache(&self, image_cache: &str) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, result| {
            !(result.belongs_to(image_cache) && result.status.is_terminal())
        });
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
