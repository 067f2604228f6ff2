// ABOUTME: Feeds Pod updates for manager-owned Jobs into the pod status correlator.
// ABOUTME: Uses the kube runtime watcher with its default reconnect backoff.

use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube::runtime::{WatchStreamExt, watcher};

use super::{ImageManager, MANAGED_BY_LABEL, MANAGED_BY_VALUE};

impl ImageManager {
    /// Watch Pods labelled as managed by this component until the stream ends.
    pub async fn run_pod_watcher(&self, client: kube::Client) {
        let pods: Api<Pod> = Api::namespaced(client, &self.config.namespace);
        let selector = format!("{MANAGED_BY_LABEL}={MANAGED_BY_VALUE}");
        let stream = watcher(pods, watcher::Config::default().labels(&selector))
            .default_backoff()
            .applied_objects();
        futures::pin_mut!(stream);

        tracing::debug!(namespace = %self.config.namespace, "watching helper pods");
        while let Some(event) = stream.next().await {
            match event {
                Ok(pod) => self.handle_pod_status_change(&pod),
                Err(e) => tracing::warn!(error = %e, "pod watch error"),
            }
        }
    }
}
