// ABOUTME: Container runtime flavor of a target node, parsed from the node's runtime version.
// ABOUTME: Pulls are runtime-agnostic; removal picks the docker, containerd or cri-o socket.

use serde::{Deserialize, Serialize};

use super::ImageRef;

const DOCKER_SOCKET: &str = "/var/run/docker.sock";
const CONTAINERD_SOCKET: &str = "/run/containerd/containerd.sock";
const CRIO_SOCKET: &str = "/var/run/crio/crio.sock";
/// crictl probes the well-known CRI sockets under /run when no endpoint is given.
const GENERIC_RUN_DIR: &str = "/run";

/// The container runtime running on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    Docker,
    Containerd,
    #[serde(rename = "cri-o")]
    CriO,
    /// Unknown or unreported runtime: fall back to crictl's own endpoint discovery.
    #[default]
    Generic,
}

/// What the helper container should do with an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAction {
    Pull,
    Inspect,
    Remove,
}

/// Host path the helper container needs mounted to reach the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeMount {
    pub path: &'static str,
    /// Kubernetes hostPath type (`Socket` or `Directory`).
    pub kind: &'static str,
}

impl ContainerRuntime {
    /// Parse a node's `status.nodeInfo.containerRuntimeVersion`, e.g. `containerd://1.7.2`.
    pub fn from_version(version: Option<&str>) -> Self {
        let Some(version) = version else {
            return ContainerRuntime::Generic;
        };
        let scheme = version
            .split_once("://")
            .map(|(scheme, _)| scheme)
            .unwrap_or(version)
            .trim()
            .to_ascii_lowercase();

        match scheme.as_str() {
            "docker" => ContainerRuntime::Docker,
            "containerd" => ContainerRuntime::Containerd,
            "cri-o" | "crio" => ContainerRuntime::CriO,
            _ => ContainerRuntime::Generic,
        }
    }

    /// Host path the helper needs for `action`.
    ///
    /// Pulls go through crictl's endpoint discovery under `/run` on every
    /// runtime; only removal talks to the runtime's own socket.
    pub fn mount(&self, action: ImageAction) -> RuntimeMount {
        let socket = match (action, self) {
            (ImageAction::Pull | ImageAction::Inspect, _) | (_, ContainerRuntime::Generic) => {
                return RuntimeMount {
                    path: GENERIC_RUN_DIR,
                    kind: "Directory",
                };
            }
            (ImageAction::Remove, ContainerRuntime::Docker) => DOCKER_SOCKET,
            (ImageAction::Remove, ContainerRuntime::Containerd) => CONTAINERD_SOCKET,
            (ImageAction::Remove, ContainerRuntime::CriO) => CRIO_SOCKET,
        };
        RuntimeMount {
            path: socket,
            kind: "Socket",
        }
    }

    /// Shell command performing `action` on `image`.
    pub fn command(&self, action: ImageAction, image: &ImageRef) -> String {
        match action {
            ImageAction::Pull => format!("crictl pull {image}"),
            ImageAction::Inspect => format!("crictl inspecti {image}"),
            ImageAction::Remove => self.remove_command(image),
        }
    }

    fn remove_command(&self, image: &ImageRef) -> String {
        match (self, self.mount(ImageAction::Remove)) {
            (ContainerRuntime::Docker, _) => format!("docker image rm {image}"),
            (_, RuntimeMount { path, kind: "Socket" }) => {
                format!("crictl --runtime-endpoint unix://{path} rmi {image}")
            }
            _ => format!("crictl rmi {image}"),
        }
    }
}

impl std::fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerRuntime::Docker => write!(f, "docker"),
            ContainerRuntime::Containerd => write!(f, "containerd"),
            ContainerRuntime::CriO => write!(f, "cri-o"),
            ContainerRuntime::Generic => write!(f, "generic"),
        }
    }
}
