// ABOUTME: Work requests submitted to the image manager by the image cache controller.
// ABOUTME: A tagged union of pull, purge, and status-refresh work tied to an owning ImageCache.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::{ContainerRuntime, ImageRef, ParseImageRefError};

/// Reference to the ImageCache custom resource that asked for the work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageCacheRef {
    pub namespace: String,
    pub name: String,
    /// Needed to set an owner reference on created Jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

impl ImageCacheRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            uid: None,
        }
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }
}

impl fmt::Display for ImageCacheRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseImageCacheRefError {
    #[error("expected NAMESPACE/NAME[@UID], got {0:?}")]
    Format(String),
}

impl FromStr for ImageCacheRef {
    type Err = ParseImageCacheRefError;

    /// Parses `namespace/name` with an optional `@uid` suffix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, uid) = match s.split_once('@') {
            Some((key, uid)) if !uid.is_empty() => (key, Some(uid)),
            Some(_) => return Err(ParseImageCacheRefError::Format(s.to_string())),
            None => (s, None),
        };
        match key.split_once('/') {
            Some((namespace, name))
                if !namespace.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                let cache = ImageCacheRef::new(namespace, name);
                Ok(match uid {
                    Some(uid) => cache.with_uid(uid),
                    None => cache,
                })
            }
            _ => Err(ParseImageCacheRefError::Format(s.to_string())),
        }
    }
}

/// Kind of node-level work a Job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WorkType {
    /// Pull the image onto the node.
    #[default]
    Create,
    /// Delete the image from the node.
    Purge,
}

impl WorkType {
    /// Value of the `kubefledged.io/work-type` label.
    pub fn label(&self) -> &'static str {
        match self {
            WorkType::Create => "pull",
            WorkType::Purge => "purge",
        }
    }
}

impl fmt::Display for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// An image on a specific node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeTarget {
    pub image: String,
    pub node: String,
    /// `<runtime>://<version>` as reported in the node's status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_runtime_version: Option<String>,
}

impl NodeTarget {
    pub fn new(image: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            node: node.into(),
            container_runtime_version: None,
        }
    }

    pub fn with_runtime_version(mut self, version: impl Into<String>) -> Self {
        self.container_runtime_version = Some(version.into());
        self
    }

    pub fn runtime(&self) -> ContainerRuntime {
        ContainerRuntime::from_version(self.container_runtime_version.as_deref())
    }

    pub fn image_ref(&self) -> Result<ImageRef, ParseImageRefError> {
        ImageRef::parse(&self.image)
    }
}

/// What a request asks for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageWork {
    Pull(NodeTarget),
    Purge(NodeTarget),
    /// Re-evaluate every outstanding job of the owning image cache.
    RefreshStatus,
}

/// A unit of work on the image manager's queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageWorkRequest {
    pub work: ImageWork,
    /// Required. Left optional so a request assembled by hand without an owner
    /// is rejected by the job factory instead of being unrepresentable.
    pub image_cache: Option<ImageCacheRef>,
}

/// Reasons a dequeued request cannot be processed at all.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkRequestError {
    #[error("node name is empty")]
    EmptyNode,

    #[error("invalid image: {0}")]
    InvalidImage(#[from] ParseImageRefError),

    #[error("status refresh does not name an image cache")]
    RefreshWithoutImageCache,
}

impl ImageWorkRequest {
    pub fn pull(image_cache: ImageCacheRef, target: NodeTarget) -> Self {
        Self {
            work: ImageWork::Pull(target),
            image_cache: Some(image_cache),
        }
    }

    pub fn purge(image_cache: ImageCacheRef, target: NodeTarget) -> Self {
        Self {
            work: ImageWork::Purge(target),
            image_cache: Some(image_cache),
        }
    }

    pub fn refresh_status(image_cache: ImageCacheRef) -> Self {
        Self {
            work: ImageWork::RefreshStatus,
            image_cache: Some(image_cache),
        }
    }

    pub fn work_type(&self) -> WorkType {
        match self.work {
            ImageWork::Purge(_) => WorkType::Purge,
            ImageWork::Pull(_) | ImageWork::RefreshStatus => WorkType::Create,
        }
    }

    pub fn target(&self) -> Option<&NodeTarget> {
        match &self.work {
            ImageWork::Pull(target) | ImageWork::Purge(target) => Some(target),
            ImageWork::RefreshStatus => None,
        }
    }

    pub fn image_cache_name(&self) -> Option<&str> {
        self.image_cache.as_ref().map(|cache| cache.name.as_str())
    }

    /// Structural checks applied when the request is dequeued. A missing owner
    /// on node work is left to the job factory, which reports it as invalid.
    pub fn validate(&self) -> Result<(), WorkRequestError> {
        match &self.work {
            ImageWork::Pull(target) | ImageWork::Purge(target) => {
                if target.node.trim().is_empty() {
                    return Err(WorkRequestError::EmptyNode);
                }
                target.image_ref()?;
                Ok(())
            }
            ImageWork::RefreshStatus if self.image_cache.is_none() => {
                Err(WorkRequestError::RefreshWithoutImageCache)
            }
            ImageWork::RefreshStatus => Ok(()),
        }
    }
}

impl fmt::Display for ImageWorkRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let owner = self
            .image_cache
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "<none>".to_string());
        match &self.work {
            ImageWork::Pull(t) => write!(f, "pull {} on {} for {}", t.image, t.node, owner),
            ImageWork::Purge(t) => write!(f, "purge {} from {} for {}", t.image, t.node, owner),
            ImageWork::RefreshStatus => write!(f, "status refresh for {}", owner),
        }
    }
}
