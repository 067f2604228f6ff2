// ABOUTME: Integration tests for the dispatcher loop and the status channel.
// ABOUTME: Drives requests through the work queue end to end against the in-memory cluster.

mod support;

use fledged_imagemanager::cluster::ClusterError;
use fledged_imagemanager::manager::{ErrorKind, WorkResultStatus};
use fledged_imagemanager::types::{ImageCacheRef, ImageWorkRequest, NodeTarget};
use std::time::Duration;
use support::{fake_manager, job_pod};

fn foo_cache() -> ImageCacheRef {
    ImageCacheRef::new("kube-fledged", "foo")
}

#[tokio::test]
async fn pull_then_refresh_reports_success() {
    let (manager, cluster, mut status_rx) = fake_manager();
    let pull = ImageWorkRequest::pull(foo_cache(), NodeTarget::new("foo", "bar"));

    manager.queue().add(pull).unwrap();
    assert!(manager.process_next_work_item().await);

    let job = cluster.job_names().pop().unwrap();
    cluster.add_pod(job_pod(&job, "Succeeded"));

    manager
        .queue()
        .add(ImageWorkRequest::refresh_status(foo_cache()))
        .unwrap();
    assert!(manager.process_next_work_item().await);

    let update = status_rx.recv().await.unwrap();
    assert_eq!(update.image_cache, foo_cache());
    let report = update.result.unwrap();
    assert_eq!(report.image_cache, "foo");
    assert_eq!(report.succeeded[0].job, job);
    assert_eq!(manager.queue().len(), 0);
    assert_eq!(manager.queue().in_flight(), 0);
}

#[tokio::test]
async fn api_failure_is_reported_and_item_released() {
    let (manager, cluster, mut status_rx) = fake_manager();
    cluster.fail_create(ClusterError::internal("fake error"));
    let pull = ImageWorkRequest::pull(foo_cache(), NodeTarget::new("foo", "bar"));

    manager.queue().add(pull).unwrap();
    assert!(manager.process_next_work_item().await);

    assert_eq!(manager.queue().in_flight(), 0);
    assert!(manager.queue().is_empty());
    assert!(manager.work_status().is_empty());

    let update = status_rx.try_recv().unwrap();
    assert_eq!(update.image_cache, foo_cache());
    let err = update.result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Api);
    assert!(err.to_string().starts_with("Internal error occurred:"));
}

#[tokio::test]
async fn malformed_item_is_dropped_without_api_calls() {
    let (manager, cluster, _status_rx) = fake_manager();
    let bad = ImageWorkRequest::pull(foo_cache(), NodeTarget::new("foo", ""));

    manager.queue().add(bad.clone()).unwrap();
    assert!(manager.process_next_work_item().await);

    assert_eq!(cluster.api_calls(), 0);
    assert_eq!(manager.queue().in_flight(), 0);
    assert_eq!(manager.queue().num_requeues(&bad), 0);
}

#[tokio::test]
async fn dispatch_routes_purge_to_delete_image() {
    let (manager, cluster, _status_rx) = fake_manager();
    let purge = ImageWorkRequest::purge(foo_cache(), NodeTarget::new("foo", "bar"));

    manager.dispatch(&purge).await.unwrap();

    let job = cluster.jobs().pop().unwrap();
    let name = job.metadata.name.unwrap();
    assert_eq!(manager.work_status().get(&name).unwrap().request, purge);
}

#[tokio::test]
async fn dispatch_surfaces_job_factory_errors() {
    let (manager, cluster, _status_rx) = fake_manager();
    cluster.fail_create(ClusterError::internal("fake error"));
    let pull = ImageWorkRequest::pull(foo_cache(), NodeTarget::new("foo", "bar"));

    let err = manager.dispatch(&pull).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Api);
}

#[tokio::test]
async fn failed_refresh_is_still_reported() {
    let (manager, _cluster, mut status_rx) = fake_manager();
    let pull = ImageWorkRequest::pull(foo_cache(), NodeTarget::new("foo", "bar"));
    manager.dispatch(&pull).await.unwrap();

    manager
        .dispatch(&ImageWorkRequest::refresh_status(foo_cache()))
        .await
        .unwrap();

    let update = status_rx.recv().await.unwrap();
    let err = update.result.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoPodsMatched);
}

#[tokio::test]
async fn purge_round_trip_cleans_up() {
    let (manager, cluster, mut status_rx) = fake_manager();
    let purge = ImageWorkRequest::purge(foo_cache(), NodeTarget::new("foo", "bar"));
    manager.dispatch(&purge).await.unwrap();
    let job = cluster.job_names().pop().unwrap();
    cluster.add_pod(job_pod(&job, "Succeeded"));

    manager.spawn_status_refresh(foo_cache()).await.unwrap();

    let report = status_rx.recv().await.unwrap().result.unwrap();
    assert_eq!(report.succeeded[0].job, job);
    assert!(cluster.job_names().is_empty());
    assert!(manager.work_status().is_empty());
}

#[tokio::test]
async fn shut_down_queue_stops_the_loop() {
    let (manager, _cluster, _status_rx) = fake_manager();
    manager.queue().shut_down();

    assert!(!manager.process_next_work_item().await);
}

#[tokio::test]
async fn workers_drain_the_queue_and_exit_on_shutdown() {
    let (manager, cluster, _status_rx) = fake_manager();
    let handles = manager.run_workers(3);

    for node in ["node-a", "node-b", "node-c", "node-d"] {
        let pull = ImageWorkRequest::pull(foo_cache(), NodeTarget::new("redis:7", node));
        manager.queue().add(pull).unwrap();
    }

    tokio::time::timeout(Duration::from_secs(5), async {
        while manager.work_status().len() < 4 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("workers did not process the queue");

    manager.queue().shut_down();
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }
    assert_eq!(cluster.job_names().len(), 4);
}

#[tokio::test]
async fn prune_forgets_finished_work() {
    let (manager, cluster, _status_rx) = fake_manager();
    let pull = ImageWorkRequest::pull(foo_cache(), NodeTarget::new("foo", "bar"));
    manager.dispatch(&pull).await.unwrap();
    let job = cluster.job_names().pop().unwrap();
    manager.handle_pod_status_change(&job_pod(&job, "Succeeded"));

    assert_eq!(
        manager.work_status().get(&job).unwrap().status,
        WorkResultStatus::Succeeded
    );
    assert_eq!(manager.prune_image_cache("foo"), 1);
    assert!(manager.work_status().is_empty());
}
