// ABOUTME: Test support utilities.
// ABOUTME: Provides an in-memory ClusterApi, Pod/Event fixtures, and tracing setup.

use async_trait::async_trait;
use fledged_imagemanager::cluster::{ClusterApi, ClusterError};
use fledged_imagemanager::config::Config;
use fledged_imagemanager::manager::{ImageManager, JOB_NAME_LABEL, StatusUpdate};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{
    ContainerState, ContainerStateTerminated, ContainerStatus, Event, ObjectReference, Pod,
    PodStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Once};
use tokio::sync::mpsc;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("fledged_imagemanager=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Manager over a fresh [`FakeCluster`] with default configuration.
#[allow(dead_code)]
pub fn fake_manager() -> (
    ImageManager,
    Arc<FakeCluster>,
    mpsc::UnboundedReceiver<StatusUpdate>,
) {
    init_tracing();
    let cluster = Arc::new(FakeCluster::default());
    let (manager, status_rx) = ImageManager::with_channel(Config::default(), cluster.clone());
    (manager, cluster, status_rx)
}

#[derive(Default)]
struct FakeState {
    jobs: BTreeMap<String, Job>,
    deleted: Vec<String>,
    pods: Vec<Pod>,
    events: HashMap<String, Vec<Event>>,
    next_suffix: u32,
    create_error: Option<ClusterError>,
    delete_error: Option<ClusterError>,
    list_pods_error: Option<ClusterError>,
    list_events_error: Option<ClusterError>,
    api_calls: usize,
}

/// In-memory stand-in for the Kubernetes API.
///
/// Created Jobs get their `generateName` plus a counter as name. Pods and
/// Events are whatever the test put in.
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<FakeState>,
}

#[allow(dead_code)]
impl FakeCluster {
    pub fn fail_create(&self, error: ClusterError) {
        self.state.lock().create_error = Some(error);
    }

    pub fn fail_delete(&self, error: ClusterError) {
        self.state.lock().delete_error = Some(error);
    }

    pub fn fail_list_pods(&self, error: ClusterError) {
        self.state.lock().list_pods_error = Some(error);
    }

    pub fn fail_list_events(&self, error: ClusterError) {
        self.state.lock().list_events_error = Some(error);
    }

    pub fn add_pod(&self, pod: Pod) {
        self.state.lock().pods.push(pod);
    }

    /// Replace the Pod with the same name.
    pub fn update_pod(&self, pod: Pod) {
        let mut state = self.state.lock();
        state.pods.retain(|p| p.metadata.name != pod.metadata.name);
        state.pods.push(pod);
    }

    pub fn add_event(&self, pod_name: &str, event: Event) {
        self.state
            .lock()
            .events
            .entry(pod_name.to_string())
            .or_default()
            .push(event);
    }

    /// Jobs currently stored, by name.
    pub fn jobs(&self) -> Vec<Job> {
        self.state.lock().jobs.values().cloned().collect()
    }

    pub fn job_names(&self) -> Vec<String> {
        self.state.lock().jobs.keys().cloned().collect()
    }

    pub fn deleted_jobs(&self) -> Vec<String> {
        self.state.lock().deleted.clone()
    }

    /// Number of calls made against the fake, failed ones included.
    pub fn api_calls(&self) -> usize {
        self.state.lock().api_calls
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn create_job(&self, namespace: &str, job: &Job) -> Result<Job, ClusterError> {
        let mut state = self.state.lock();
        state.api_calls += 1;
        if let Some(error) = state.create_error.clone() {
            return Err(error);
        }

        state.next_suffix += 1;
        let prefix = job.metadata.generate_name.clone().unwrap_or_default();
        let name = format!("{}{:05}", prefix, state.next_suffix);

        let mut created = job.clone();
        created.metadata.name = Some(name.clone());
        created.metadata.namespace = Some(namespace.to_string());
        state.jobs.insert(name, created.clone());
        Ok(created)
    }

    async fn delete_job(&self, _namespace: &str, name: &str) -> Result<(), ClusterError> {
        let mut state = self.state.lock();
        state.api_calls += 1;
        if let Some(error) = state.delete_error.clone() {
            return Err(error);
        }
        if state.jobs.remove(name).is_none() {
            return Err(ClusterError::not_found("jobs.batch", name));
        }
        state.deleted.push(name.to_string());
        Ok(())
    }

    async fn list_pods(
        &self,
        _namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Pod>, ClusterError> {
        let mut state = self.state.lock();
        state.api_calls += 1;
        if let Some(error) = state.list_pods_error.clone() {
            return Err(error);
        }

        let (key, value) = label_selector.split_once('=').unwrap_or((label_selector, ""));
        Ok(state
            .pods
            .iter()
            .filter(|pod| {
                pod.metadata
                    .labels
                    .as_ref()
                    .and_then(|labels| labels.get(key))
                    .is_some_and(|v| v == value)
            })
            .cloned()
            .collect())
    }

    async fn list_pod_events(
        &self,
        _namespace: &str,
        pod_name: &str,
    ) -> Result<Vec<Event>, ClusterError> {
        let mut state = self.state.lock();
        state.api_calls += 1;
        if let Some(error) = state.list_events_error.clone() {
            return Err(error);
        }
        Ok(state.events.get(pod_name).cloned().unwrap_or_default())
    }
}

/// Pod named `<job>-pod` owned by `job`, in `phase`.
#[allow(dead_code)]
pub fn job_pod(job: &str, phase: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(format!("{job}-pod")),
            namespace: Some("kube-fledged".to_string()),
            labels: Some(BTreeMap::from([(
                JOB_NAME_LABEL.to_string(),
                job.to_string(),
            )])),
            ..Default::default()
        },
        status: Some(PodStatus {
            phase: Some(phase.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Failed Pod whose helper container terminated with `reason` and `message`.
#[allow(dead_code)]
pub fn failed_job_pod(job: &str, reason: &str, message: &str) -> Pod {
    let mut pod = job_pod(job, "Failed");
    if let Some(status) = pod.status.as_mut() {
        status.container_statuses = Some(vec![ContainerStatus {
            name: "image-manager".to_string(),
            state: Some(ContainerState {
                terminated: Some(ContainerStateTerminated {
                    exit_code: 1,
                    reason: Some(reason.to_string()),
                    message: Some(message.to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);
    }
    pod
}

/// Event about `pod_name`, `age_secs` seconds before a fixed instant.
#[allow(dead_code)]
pub fn pod_event(pod_name: &str, reason: &str, message: &str, age_secs: i64) -> Event {
    let at = chrono::DateTime::from_timestamp(1_700_000_000 - age_secs, 0).unwrap_or_default();
    Event {
        metadata: ObjectMeta {
            name: Some(format!("{pod_name}.{age_secs}")),
            ..Default::default()
        },
        involved_object: ObjectReference {
            kind: Some("Pod".to_string()),
            name: Some(pod_name.to_string()),
            ..Default::default()
        },
        reason: Some(reason.to_string()),
        message: Some(message.to_string()),
        last_timestamp: Some(Time(at)),
        ..Default::default()
    }
}
