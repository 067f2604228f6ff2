// ABOUTME: Status aggregation: reconciles an image cache's outstanding Jobs with their Pods.
// ABOUTME: Finalizes table entries, deletes finished purge Jobs, and reports the result once.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Event, Pod};
use kube::ResourceExt;
use serde::Serialize;
use snafu::ResultExt;
use tokio::sync::oneshot;

use super::error::{ApiSnafu, ImageManagerError};
use super::pods::pod_outcome;
use super::status::{ImageWorkResult, PodOutcome, WorkResultStatus};
use super::{ImageManager, JOB_NAME_LABEL, StatusResult};
use crate::types::{JobName, PodName, WorkType};

/// One Job in an [`ImageCacheReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub job: String,
    pub image: String,
    pub node: String,
    pub work_type: WorkType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl JobReport {
    fn new(job: &JobName, entry: &ImageWorkResult) -> Self {
        let (image, node) = entry
            .request
            .target()
            .map(|t| (t.image.clone(), t.node.clone()))
            .unwrap_or_default();
        Self {
            job: job.to_string(),
            image,
            node,
            work_type: entry.request.work_type(),
            reason: entry.reason.clone(),
            message: entry.message.clone(),
        }
    }
}

/// Per-Job outcome of an image cache's work as of one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageCacheReport {
    pub image_cache: String,
    pub succeeded: Vec<JobReport>,
    pub failed: Vec<JobReport>,
    /// Jobs whose Pod has not finished yet.
    pub pending: Vec<JobReport>,
}

impl ImageCacheReport {
    fn new(image_cache: &str) -> Self {
        Self {
            image_cache: image_cache.to_string(),
            ..Default::default()
        }
    }

    fn record(&mut self, job: &JobName, entry: &ImageWorkResult) {
        let report = JobReport::new(job, entry);
        match entry.status {
            WorkResultStatus::JobCreated => self.pending.push(report),
            WorkResultStatus::Succeeded => self.succeeded.push(report),
            WorkResultStatus::Failed => self.failed.push(report),
        }
    }

    /// No Job is still running.
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.pending.len()
    }
}

impl ImageManager {
    /// Reconcile every Job of `image_cache` and send the outcome on `signal`.
    ///
    /// Exactly one value is sent, whether aggregation succeeds or aborts. A
    /// receiver that went away is logged and otherwise ignored.
    ///
    /// Jobs are matched to `image_cache` by name only, regardless of the
    /// namespace recorded in their requests.
    pub async fn update_image_cache_status(
        &self,
        image_cache: &str,
        signal: oneshot::Sender<StatusResult>,
    ) {
        let result = self.aggregate_status(image_cache).await;
        match &result {
            Ok(report) => tracing::debug!(
                image_cache,
                succeeded = report.succeeded.len(),
                failed = report.failed.len(),
                pending = report.pending.len(),
                "aggregated image cache status"
            ),
            Err(e) => tracing::debug!(image_cache, error = %e, "status aggregation aborted"),
        }
        if signal.send(result).is_err() {
            tracing::warn!(image_cache, "status receiver dropped before completion");
        }
    }

    async fn aggregate_status(&self, image_cache: &str) -> StatusResult {
        // The table is snapshotted so no lock is held across API calls; finalize
        // re-checks each entry under the lock.
        for (job, entry) in self.work_status.entries_for_cache(image_cache) {
            if entry.status.is_terminal() {
                continue;
            }
            let pod = self.pod_for_job(&job).await?;
            let Some(outcome) = pod_outcome(&pod) else {
                tracing::debug!(job = %job, pod = %pod.name_any(), "job still running");
                continue;
            };
            if !self.work_status.finalize(job.as_str(), &outcome) {
                continue;
            }
            if let PodOutcome::Failed {
                reason: None,
                message: None,
            } = outcome
            {
                self.explain_failure(&job, &pod).await;
            }
        }

        let mut report = ImageCacheReport::new(image_cache);
        for (job, entry) in self.work_status.entries_for_cache(image_cache) {
            if entry.status.is_terminal() && entry.request.work_type() == WorkType::Purge {
                self.delete_finished_job(&job).await?;
            }
            report.record(&job, &entry);
        }
        Ok(report)
    }

    async fn pod_for_job(&self, job: &JobName) -> Result<Pod, ImageManagerError> {
        let selector = format!("{JOB_NAME_LABEL}={job}");
        let mut pods = self
            .cluster
            .list_pods(&self.config.namespace, &selector)
            .await
            .context(ApiSnafu)?;

        match pods.len() {
            0 => Err(ImageManagerError::NoPodsMatched { job: job.clone() }),
            1 => Ok(pods.remove(0)),
            count => Err(ImageManagerError::AmbiguousPodMatch {
                job: job.clone(),
                count,
            }),
        }
    }

    /// Fill in a failure reason from the Pod's newest Event. Best effort.
    async fn explain_failure(&self, job: &JobName, pod: &Pod) {
        let pod_name = PodName::new(pod.name_any());
        let events = match self
            .cluster
            .list_pod_events(&self.config.namespace, pod_name.as_str())
            .await
        {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!(
                    job = %job,
                    pod = %pod_name,
                    error = %e,
                    "could not list pod events"
                );
                return;
            }
        };
        if let Some(event) = events.iter().max_by_key(|e| event_time(e)) {
            self.work_status
                .annotate_failure(job.as_str(), event.reason.clone(), event.message.clone());
        }
    }

    async fn delete_finished_job(&self, job: &JobName) -> Result<(), ImageManagerError> {
        match self
            .cluster
            .delete_job(&self.config.namespace, job.as_str())
            .await
        {
            Ok(()) => tracing::info!(job = %job, "deleted purge job"),
            Err(e) if e.is_not_found() => tracing::debug!(job = %job, "purge job already gone"),
            Err(e) => return Err(e).context(ApiSnafu),
        }
        self.work_status.remove(job.as_str());
        Ok(())
    }
}

fn event_time(event: &Event) -> Option<DateTime<Utc>> {
    event
        .last_timestamp
        .as_ref()
        .map(|t| t.0)
        .or_else(|| event.event_time.as_ref().map(|t| t.0))
        .or_else(|| event.metadata.creation_timestamp.as_ref().map(|t| t.0))
}
