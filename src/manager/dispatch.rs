// ABOUTME: Dispatcher loop: pulls requests off the work queue and routes them by work kind.
// ABOUTME: Status refreshes and failed Job submissions report through the status channel.

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::error::ImageManagerError;
use super::{ImageManager, StatusUpdate};
use crate::types::{ImageCacheRef, ImageWork, ImageWorkRequest};

impl ImageManager {
    /// Take one request off the queue and process it.
    ///
    /// Returns `false` once the queue has shut down. Failures are logged,
    /// forwarded on the status channel, and never stop the loop; the item is
    /// always marked done.
    pub async fn process_next_work_item(&self) -> bool {
        let Some(request) = self.queue.get().await else {
            return false;
        };

        if let Err(defect) = request.validate() {
            tracing::error!(request = %request, "dropping malformed work item: {}", defect);
            self.queue.forget(&request);
            self.queue.done(&request);
            return true;
        }

        match self.dispatch(&request).await {
            Ok(()) => {
                self.queue.forget(&request);
                tracing::debug!(request = %request, "processed work item");
            }
            Err(e) => {
                tracing::error!(request = %request, kind = ?e.kind(), "{}", e);
                self.report_failure(&request, e);
            }
        }
        self.queue.done(&request);
        true
    }

    fn report_failure(&self, request: &ImageWorkRequest, error: ImageManagerError) {
        let Some(image_cache) = request.image_cache.clone() else {
            return;
        };
        let update = StatusUpdate {
            image_cache,
            result: Err(error),
        };
        if self.status_tx.send(update).is_err() {
            tracing::debug!("status channel closed");
        }
    }

    /// Route one request to the job factory or the status aggregator.
    ///
    /// # Errors
    ///
    /// Errors from [`ImageManager::pull_image`] and [`ImageManager::delete_image`].
    /// Status refreshes report through the status channel instead.
    pub async fn dispatch(&self, request: &ImageWorkRequest) -> Result<(), ImageManagerError> {
        match &request.work {
            ImageWork::Pull(_) => self.pull_image(request).await.map(drop),
            ImageWork::Purge(_) => self.delete_image(request).await.map(drop),
            ImageWork::RefreshStatus => {
                let image_cache = request.image_cache.clone().ok_or_else(|| {
                    ImageManagerError::InvalidRequest {
                        reason: "status refresh does not name an image cache".to_string(),
                    }
                })?;
                self.spawn_status_refresh(image_cache);
                Ok(())
            }
        }
    }

    /// Aggregate the status of `image_cache` in the background.
    pub fn spawn_status_refresh(&self, image_cache: ImageCacheRef) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let (signal, outcome) = oneshot::channel();
            manager
                .update_image_cache_status(&image_cache.name, signal)
                .await;
            let Ok(result) = outcome.await else {
                tracing::warn!(image_cache = %image_cache, "aggregation ended without a result");
                return;
            };
            let update = StatusUpdate {
                image_cache,
                result,
            };
            if manager.status_tx.send(update).is_err() {
                tracing::debug!("status channel closed");
            }
        })
    }

    /// Start `count` dispatcher loops. They exit when the queue shuts down.
    pub fn run_workers(&self, count: usize) -> Vec<JoinHandle<()>> {
        (0..count.max(1))
            .map(|worker| {
                let manager = self.clone();
                tokio::spawn(async move {
                    tracing::debug!(worker, queue = manager.queue.name(), "worker started");
                    while manager.process_next_work_item().await {}
                    tracing::debug!(worker, "worker stopped");
                })
            })
            .collect()
    }
}
