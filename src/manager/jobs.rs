// ABOUTME: Job factory: builds and submits the helper Job for a pull or purge on one node.
// ABOUTME: Records a JobCreated entry in the Work Status Table keyed by the created Job's name.

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, HostPathVolumeSource, PodSpec, PodTemplateSpec, Toleration, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::ResourceExt;
use snafu::{OptionExt, ResultExt};
use std::collections::BTreeMap;

use super::error::{ApiSnafu, ImageManagerError, InvalidRequestSnafu};
use super::status::ImageWorkResult;
use super::{
    IMAGE_CACHE_LABEL, IMAGE_LABEL, ImageManager, MANAGED_BY_LABEL, MANAGED_BY_VALUE,
    WORK_TYPE_LABEL,
};
use crate::config::{Config, ImagePullPolicy};
use crate::types::{
    ContainerRuntime, ImageAction, ImageCacheRef, ImageRef, ImageWork, ImageWorkRequest, JobName,
    NodeTarget, WorkType,
};

const IMAGE_CACHE_API_VERSION: &str = "kubefledged.io/v1alpha2";
const IMAGE_CACHE_KIND: &str = "ImageCache";
const HELPER_CONTAINER: &str = "image-manager";
const RUNTIME_VOLUME: &str = "container-runtime";
const HOSTNAME_LABEL: &str = "kubernetes.io/hostname";

impl ImageManager {
    /// Create a Job that pulls the requested image onto the requested node.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if the request has no owning image cache or is not pull
    /// work; `Api` if the API server rejects the Job.
    pub async fn pull_image(&self, request: &ImageWorkRequest) -> Result<Job, ImageManagerError> {
        self.submit(request, WorkType::Create).await
    }

    /// Create a Job that removes the requested image from the requested node.
    ///
    /// # Errors
    ///
    /// Same as [`ImageManager::pull_image`].
    pub async fn delete_image(
        &self,
        request: &ImageWorkRequest,
    ) -> Result<Job, ImageManagerError> {
        self.submit(request, WorkType::Purge).await
    }

    async fn submit(
        &self,
        request: &ImageWorkRequest,
        work_type: WorkType,
    ) -> Result<Job, ImageManagerError> {
        let image_cache = request.image_cache.as_ref().context(InvalidRequestSnafu {
            reason: "image cache reference is missing",
        })?;
        let target = match (&request.work, work_type) {
            (ImageWork::Pull(target), WorkType::Create)
            | (ImageWork::Purge(target), WorkType::Purge) => target,
            _ => {
                return InvalidRequestSnafu {
                    reason: format!("expected {} work, got {}", work_type, request),
                }
                .fail();
            }
        };

        let job = build_job(&self.config, image_cache, target, work_type)?;
        let created = self
            .cluster
            .create_job(&self.config.namespace, &job)
            .await
            .context(ApiSnafu)?;

        let job_name = JobName::new(created.name_any());
        tracing::info!(
            job = %job_name,
            image = %target.image,
            node = %target.node,
            runtime = %target.runtime(),
            "created {} job",
            work_type
        );
        self.work_status
            .insert(job_name, ImageWorkResult::job_created(request.clone()));

        Ok(created)
    }
}

/// Build the helper Job for `work_type` of `target`, owned by `image_cache`.
///
/// The Job runs one helper container pinned to the target node. Purge Jobs get
/// the node's container runtime socket mounted from the host.
pub fn build_job(
    config: &Config,
    image_cache: &ImageCacheRef,
    target: &NodeTarget,
    work_type: WorkType,
) -> Result<Job, ImageManagerError> {
    let image = target.image_ref().map_err(|e| ImageManagerError::InvalidRequest {
        reason: format!("image {:?}: {}", target.image, e),
    })?;
    let runtime = target.runtime();
    let (mount, script) = match work_type {
        WorkType::Create => (
            runtime.mount(ImageAction::Pull),
            pull_script(runtime, &image, config.image_pull_policy),
        ),
        WorkType::Purge => (
            runtime.mount(ImageAction::Remove),
            runtime.command(ImageAction::Remove, &image),
        ),
    };

    let labels = BTreeMap::from([
        (MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string()),
        (IMAGE_CACHE_LABEL.to_string(), image_cache.name.clone()),
        (WORK_TYPE_LABEL.to_string(), work_type.label().to_string()),
        (IMAGE_LABEL.to_string(), image.label_value()),
    ]);

    let container = Container {
        name: HELPER_CONTAINER.to_string(),
        image: Some(config.helper_image.clone()),
        image_pull_policy: Some(ImagePullPolicy::IfNotPresent.to_string()),
        command: Some(vec!["/bin/sh".to_string(), "-c".to_string()]),
        args: Some(vec![script]),
        volume_mounts: Some(vec![VolumeMount {
            name: RUNTIME_VOLUME.to_string(),
            mount_path: mount.path.to_string(),
            ..Default::default()
        }]),
        ..Default::default()
    };

    Ok(Job {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-", image_cache.name)),
            namespace: Some(config.namespace.clone()),
            labels: Some(labels.clone()),
            owner_references: owner_reference(config, image_cache).map(|owner| vec![owner]),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(0),
            active_deadline_seconds: Some(config.active_deadline_seconds()),
            // Purge Jobs are deleted as soon as their outcome is recorded.
            ttl_seconds_after_finished: match work_type {
                WorkType::Create => config.ttl_seconds_after_finished(),
                WorkType::Purge => None,
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    restart_policy: Some("Never".to_string()),
                    node_selector: Some(BTreeMap::from([(
                        HOSTNAME_LABEL.to_string(),
                        target.node.clone(),
                    )])),
                    tolerations: Some(vec![Toleration {
                        operator: Some("Exists".to_string()),
                        ..Default::default()
                    }]),
                    service_account_name: config.service_account.clone(),
                    containers: vec![container],
                    volumes: Some(vec![Volume {
                        name: RUNTIME_VOLUME.to_string(),
                        host_path: Some(HostPathVolumeSource {
                            path: mount.path.to_string(),
                            type_: Some(mount.kind.to_string()),
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    })
}

fn pull_script(runtime: ContainerRuntime, image: &ImageRef, policy: ImagePullPolicy) -> String {
    let pull = runtime.command(ImageAction::Pull, image);
    let inspect = runtime.command(ImageAction::Inspect, image);
    match policy {
        ImagePullPolicy::Always => pull,
        ImagePullPolicy::IfNotPresent => format!("{inspect} >/dev/null 2>&1 || {pull}"),
        ImagePullPolicy::Never => format!("{inspect} >/dev/null"),
    }
}

/// Owner references cannot cross namespaces and need the owner's UID.
fn owner_reference(config: &Config, image_cache: &ImageCacheRef) -> Option<OwnerReference> {
    let uid = image_cache.uid.as_ref()?;
    if image_cache.namespace != config.namespace {
        return None;
    }
    Some(OwnerReference {
        api_version: IMAGE_CACHE_API_VERSION.to_string(),
        kind: IMAGE_CACHE_KIND.to_string(),
        name: image_cache.name.clone(),
        uid: uid.clone(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}
