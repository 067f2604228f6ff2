// ABOUTME: Pull and purge command implementation.
// ABOUTME: Runs the image manager in-process and polls the image cache status until it settles.

use fledged_imagemanager::cluster::KubeCluster;
use fledged_imagemanager::config::Config;
use fledged_imagemanager::error::{Error, Result};
use fledged_imagemanager::manager::{ImageCacheReport, ImageManager, StatusUpdate};
use fledged_imagemanager::output::Output;
use fledged_imagemanager::types::{ImageCacheRef, ImageWorkRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Extra time past the Job's active deadline for the Pod to be reported terminal.
const DEADLINE_GRACE: Duration = Duration::from_secs(30);

/// Submit one pull or purge request and wait for its outcome.
pub async fn run_image_work(
    config: Config,
    request: ImageWorkRequest,
    output: Output,
) -> Result<()> {
    let image_cache = request
        .image_cache
        .clone()
        .ok_or_else(|| Error::WorkFailed(format!("{request} has no image cache")))?;

    output.progress("  → Connecting to cluster...");
    let cluster = KubeCluster::try_default().await?;
    let client = cluster.client().clone();

    let workers = config.workers;
    let deadline = Instant::now() + config.image_pull_deadline + DEADLINE_GRACE;
    let (manager, mut status_rx) = ImageManager::with_channel(config, Arc::new(cluster));

    let handles = manager.run_workers(workers);
    let watcher = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.run_pod_watcher(client).await })
    };

    output.progress(&format!("  → Submitting {request}..."));
    let result = match manager.queue().add(request) {
        Ok(()) => wait_for_report(&manager, &image_cache, &mut status_rx, deadline, &output).await,
        Err(e) => Err(e.into()),
    };

    manager.queue().shut_down();
    watcher.abort();
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::warn!(error = %e, "worker task ended abnormally");
        }
    }
    manager.prune_image_cache(&image_cache.name);

    let report = result?;
    output.report(&report);
    if report.has_failures() {
        return Err(Error::WorkFailed(format!(
            "{} of {} jobs for {} failed",
            report.failed.len(),
            report.total(),
            image_cache
        )));
    }
    output.success(&format!("{image_cache} is up to date"));
    Ok(())
}

async fn wait_for_report(
    manager: &ImageManager,
    image_cache: &ImageCacheRef,
    status_rx: &mut mpsc::UnboundedReceiver<StatusUpdate>,
    deadline: Instant,
    output: &Output,
) -> Result<ImageCacheReport> {
    let poll_interval = manager.config().status_poll_interval;
    let refresh = ImageWorkRequest::refresh_status(image_cache.clone());

    loop {
        tokio::time::sleep(poll_interval).await;
        if Instant::now() >= deadline {
            return Err(Error::Timeout(
                image_cache.to_string(),
                manager.config().image_pull_deadline + DEADLINE_GRACE,
            ));
        }

        if manager.work_status().entries_for_cache(&image_cache.name).is_empty() {
            // A rejected Job is reported on the status channel before the
            // queue goes idle.
            if let Ok(StatusUpdate { result: Err(e), .. }) = status_rx.try_recv() {
                return Err(e.into());
            }
            if manager.queue().is_empty() && manager.queue().in_flight() == 0 {
                return Err(Error::WorkFailed(format!("no job was created for {image_cache}")));
            }
            continue;
        }

        manager.queue().add(refresh.clone())?;
        let Some(update) = status_rx.recv().await else {
            return Err(Error::WorkFailed("status channel closed".to_string()));
        };

        match update.result {
            Ok(report) if report.is_complete() => return Ok(report),
            Ok(report) => output.progress(&format!(
                "  → Waiting for {} of {} jobs...",
                report.pending.len(),
                report.total()
            )),
            Err(e) if e.is_transient() => tracing::debug!(error = %e, "retrying status refresh"),
            Err(e) => return Err(e.into()),
        }
    }
}
