// ABOUTME: The slice of the Kubernetes API the image manager consumes.
// ABOUTME: ClusterApi trait plus ClusterError carrying the API server's own messages.

mod client;

pub use client::KubeCluster;

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Event, Pod};
use std::fmt;

/// Cluster operations used to run and observe helper Jobs.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Create `job` and return the object as stored by the API server.
    async fn create_job(&self, namespace: &str, job: &Job) -> Result<Job, ClusterError>;

    /// Delete a Job together with its Pods.
    async fn delete_job(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    /// List Pods matching a label selector such as `job-name=foo-x7k2p`.
    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Pod>, ClusterError>;

    /// List Events whose involved object is the named Pod.
    async fn list_pod_events(
        &self,
        namespace: &str,
        pod_name: &str,
    ) -> Result<Vec<Event>, ClusterError>;
}

/// Errors from the cluster API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClusterError {
    /// The API server rejected the request. Displays the server's message as is.
    #[error("{message}")]
    Api {
        code: u16,
        reason: String,
        message: String,
    },

    /// The request did not get a response from the API server.
    #[error("{0}")]
    Transport(String),
}

impl ClusterError {
    /// The error the API server returns for an internal failure.
    pub fn internal(cause: impl fmt::Display) -> Self {
        ClusterError::Api {
            code: 500,
            reason: "InternalError".to_string(),
            message: format!("Internal error occurred: {}", cause),
        }
    }

    pub fn not_found(resource: &str, name: &str) -> Self {
        ClusterError::Api {
            code: 404,
            reason: "NotFound".to_string(),
            message: format!("{} \"{}\" not found", resource, name),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::Api { code: 404, .. })
    }

    /// HTTP status code, if the API server answered.
    pub fn code(&self) -> Option<u16> {
        match self {
            ClusterError::Api { code, .. } => Some(*code),
            ClusterError::Transport(_) => None,
        }
    }
}

impl From<kube::Error> for ClusterError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(response) => ClusterError::Api {
                code: response.code,
                reason: response.reason,
                message: response.message,
            },
            other => ClusterError::Transport(other.to_string()),
        }
    }
}
