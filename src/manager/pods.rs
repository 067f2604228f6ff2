// ABOUTME: Pod status correlation: maps a terminal Pod back to its Job's table entry.
// ABOUTME: Also extracts a failure reason from the Pod's container statuses.

use k8s_openapi::api::core::v1::{Pod, PodStatus};
use kube::ResourceExt;

use super::status::PodOutcome;
use super::{ImageManager, JOB_NAME_LABEL};

impl ImageManager {
    /// Record the outcome of a Pod that reached a terminal phase.
    ///
    /// Pods that are still running, carry no `job-name` label, or belong to a
    /// Job this manager does not track are ignored. Entries that are already
    /// terminal keep their first outcome.
    pub fn handle_pod_status_change(&self, pod: &Pod) {
        let Some(job) = owning_job(pod) else {
            tracing::trace!(pod = %pod.name_any(), "pod has no job label");
            return;
        };
        let Some(outcome) = pod_outcome(pod) else {
            tracing::trace!(pod = %pod.name_any(), job, "pod not finished");
            return;
        };

        if self.work_status.finalize(job, &outcome) {
            match &outcome {
                PodOutcome::Succeeded => {
                    tracing::info!(pod = %pod.name_any(), job, "image work succeeded")
                }
                PodOutcome::Failed { reason, message } => tracing::info!(
                    pod = %pod.name_any(),
                    job,
                    reason = reason.as_deref().unwrap_or(""),
                    message = message.as_deref().unwrap_or(""),
                    "image work failed"
                ),
            }
        } else {
            tracing::trace!(job, "no pending entry for job");
        }
    }
}

/// Name of the Job that owns `pod`, from the label the Job controller sets.
pub fn owning_job(pod: &Pod) -> Option<&str> {
    pod.metadata
        .labels
        .as_ref()?
        .get(JOB_NAME_LABEL)
        .map(String::as_str)
}

/// Terminal outcome of `pod`, or `None` while it is pending or running.
pub fn pod_outcome(pod: &Pod) -> Option<PodOutcome> {
    let status = pod.status.as_ref()?;
    match status.phase.as_deref()? {
        "Succeeded" => Some(PodOutcome::Succeeded),
        "Failed" => {
            let (reason, message) = failure_details(status);
            Some(PodOutcome::Failed { reason, message })
        }
        _ => None,
    }
}

/// The first terminated container explains the failure best; fall back to the
/// Pod-level reason (e.g. `DeadlineExceeded`).
fn failure_details(status: &PodStatus) -> (Option<String>, Option<String>) {
    let from_container = status
        .container_statuses
        .iter()
        .flatten()
        .filter_map(|cs| cs.state.as_ref()?.terminated.as_ref())
        .map(|terminated| {
            (
                non_empty(terminated.reason.as_deref()),
                non_empty(terminated.message.as_deref()),
            )
        })
        .find(|(reason, message)| reason.is_some() || message.is_some());

    from_container.unwrap_or_else(|| {
        (
            non_empty(status.reason.as_deref()),
            non_empty(status.message.as_deref()),
        )
    })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
