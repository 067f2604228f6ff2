// ABOUTME: Application-wide error types for the image manager binary and config loading.
// ABOUTME: Uses thiserror; component errors live next to their components.

use std::path::PathBuf;
use thiserror::Error;

use crate::manager::ImageManagerError;
use crate::queue::QueueError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("kubernetes client error: {0}")]
    Kube(#[from] kube::Error),

    #[error(transparent)]
    Manager(#[from] ImageManagerError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("{0} did not finish within {1:?}")]
    Timeout(String, std::time::Duration),

    #[error("{0}")]
    WorkFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
