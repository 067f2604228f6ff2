// ABOUTME: Integration tests for correlating Pod updates with tracked Jobs.
// ABOUTME: Covers terminal, non-terminal, untracked, and repeated Pod updates.

mod support;

use fledged_imagemanager::manager::WorkResultStatus;
use fledged_imagemanager::types::{ImageCacheRef, ImageWorkRequest, NodeTarget};
use support::{failed_job_pod, fake_manager, job_pod};

async fn tracked_job(manager: &fledged_imagemanager::manager::ImageManager) -> String {
    let request = ImageWorkRequest::pull(
        ImageCacheRef::new("kube-fledged", "foo"),
        NodeTarget::new("foo", "bar"),
    );
    manager
        .pull_image(&request)
        .await
        .unwrap()
        .metadata
        .name
        .unwrap()
}

#[tokio::test]
async fn succeeded_pod_marks_job_succeeded() {
    let (manager, _cluster, _status_rx) = fake_manager();
    let job = tracked_job(&manager).await;

    manager.handle_pod_status_change(&job_pod(&job, "Succeeded"));

    assert_eq!(
        manager.work_status().get(&job).unwrap().status,
        WorkResultStatus::Succeeded
    );
}

#[tokio::test]
async fn failed_pod_records_reason() {
    let (manager, _cluster, _status_rx) = fake_manager();
    let job = tracked_job(&manager).await;

    manager.handle_pod_status_change(&failed_job_pod(&job, "Error", "pull access denied"));

    let entry = manager.work_status().get(&job).unwrap();
    assert_eq!(entry.status, WorkResultStatus::Failed);
    assert_eq!(entry.reason.as_deref(), Some("Error"));
    assert_eq!(entry.message.as_deref(), Some("pull access denied"));
}

#[tokio::test]
async fn running_pod_changes_nothing() {
    let (manager, _cluster, _status_rx) = fake_manager();
    let job = tracked_job(&manager).await;

    manager.handle_pod_status_change(&job_pod(&job, "Pending"));
    manager.handle_pod_status_change(&job_pod(&job, "Running"));

    assert_eq!(
        manager.work_status().get(&job).unwrap().status,
        WorkResultStatus::JobCreated
    );
}

#[tokio::test]
async fn untracked_pod_is_ignored() {
    let (manager, _cluster, _status_rx) = fake_manager();
    let job = tracked_job(&manager).await;

    manager.handle_pod_status_change(&job_pod("someone-elses-job", "Succeeded"));

    assert_eq!(manager.work_status().len(), 1);
    assert_eq!(
        manager.work_status().get(&job).unwrap().status,
        WorkResultStatus::JobCreated
    );
}

#[tokio::test]
async fn first_terminal_outcome_wins() {
    let (manager, _cluster, _status_rx) = fake_manager();
    let job = tracked_job(&manager).await;

    manager.handle_pod_status_change(&failed_job_pod(&job, "Error", "boom"));
    manager.handle_pod_status_change(&job_pod(&job, "Succeeded"));

    let entry = manager.work_status().get(&job).unwrap();
    assert_eq!(entry.status, WorkResultStatus::Failed);
    assert_eq!(entry.reason.as_deref(), Some("Error"));
}
