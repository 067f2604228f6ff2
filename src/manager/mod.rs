// ABOUTME: Work-queue driven image manager: turns pull/purge requests into per-node Jobs.
// ABOUTME: Wires the job factory, pod correlator, status aggregator, and dispatcher together.

mod aggregate;
mod dispatch;
mod error;
mod jobs;
mod pods;
mod status;
mod watcher;

pub use aggregate::{ImageCacheReport, JobReport};
pub use error::{
    AmbiguousPodMatchSnafu, ApiSnafu, ErrorKind, ImageManagerError, InvalidRequestSnafu,
    NoPodsMatchedSnafu,
};
pub use jobs::build_job;
pub use pods::{owning_job, pod_outcome};
pub use status::{ImageWorkResult, PodOutcome, WorkResultStatus, WorkStatusTable};

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::cluster::ClusterApi;
use crate::config::Config;
use crate::queue::WorkQueue;
use crate::types::{ImageCacheRef, ImageWorkRequest};

/// Marks Jobs and Pods created by the image manager.
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY_VALUE: &str = "kubefledged-image-manager";
pub const IMAGE_CACHE_LABEL: &str = "kubefledged.io/image-cache";
pub const WORK_TYPE_LABEL: &str = "kubefledged.io/work-type";
pub const IMAGE_LABEL: &str = "kubefledged.io/image";
/// Set by the Job controller on every Pod it creates for a Job.
pub const JOB_NAME_LABEL: &str = "job-name";

/// Outcome of one status aggregation pass.
pub type StatusResult = Result<ImageCacheReport, ImageManagerError>;

/// Aggregation outcome forwarded to the image cache controller.
#[derive(Debug)]
pub struct StatusUpdate {
    pub image_cache: ImageCacheRef,
    pub result: StatusResult,
}

/// Node-level execution engine for image cache work.
///
/// Cheap to clone: clones share the queue, the Work Status Table, and the
/// cluster client, so each dispatcher loop and spawned aggregation task works
/// on its own handle.
#[derive(Clone)]
pub struct ImageManager {
    config: Arc<Config>,
    cluster: Arc<dyn ClusterApi>,
    queue: WorkQueue<ImageWorkRequest>,
    status_tx: mpsc::UnboundedSender<StatusUpdate>,
    work_status: WorkStatusTable,
}

impl std::fmt::Debug for ImageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageManager")
            .field("namespace", &self.config.namespace)
            .field("queue", &self.queue)
            .field("tracked_jobs", &self.work_status.len())
            .finish()
    }
}

impl ImageManager {
    pub fn new(
        config: Config,
        cluster: Arc<dyn ClusterApi>,
        queue: WorkQueue<ImageWorkRequest>,
        status_tx: mpsc::UnboundedSender<StatusUpdate>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            cluster,
            queue,
            status_tx,
            work_status: WorkStatusTable::new(),
        }
    }

    /// Create a manager with its own work queue and status channel.
    pub fn with_channel(
        config: Config,
        cluster: Arc<dyn ClusterApi>,
    ) -> (Self, mpsc::UnboundedReceiver<StatusUpdate>) {
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let queue = WorkQueue::new("ImagePullerStatus");
        (Self::new(config, cluster, queue, status_tx), status_rx)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn queue(&self) -> &WorkQueue<ImageWorkRequest> {
        &self.queue
    }

    pub fn work_status(&self) -> &WorkStatusTable {
        &self.work_status
    }

    /// Forget finished work of an image cache once its status has been recorded.
    pub fn prune_image_cache(&self, image_cache: &str) -> usize {
        let pruned = self.work_status.prune_image_cache(image_cache);
        tracing::debug!(image_cache, pruned, "pruned finished work");
        pruned
    }
}
