// ABOUTME: Configuration for the image manager, read from fledged.yml.
// ABOUTME: Static for the process lifetime; durations use humantime syntax (30s, 5m).

mod pull_policy;

pub use pull_policy::ImagePullPolicy;

use crate::error::{Error, Result};
use crate::types::ImageRef;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "fledged.yml";
pub const CONFIG_FILENAME_ALT: &str = "fledged.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".fledged/config.yml";

pub const DEFAULT_NAMESPACE: &str = "kube-fledged";
pub const DEFAULT_HELPER_IMAGE: &str = "senthilrch/kubefledged-cri-client:v0.10.0";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Namespace the helper Jobs run in.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// How long a pull Job may stay non-terminal; becomes the Job's active deadline.
    #[serde(default = "default_image_pull_deadline", with = "humantime_serde")]
    pub image_pull_deadline: Duration,

    /// Image of the helper container that talks to the node's runtime.
    #[serde(default = "default_helper_image")]
    pub helper_image: String,

    #[serde(default)]
    pub image_pull_policy: ImagePullPolicy,

    /// Lets the cluster garbage-collect finished pull Jobs.
    #[serde(default, with = "humantime_serde")]
    pub job_ttl_after_finished: Option<Duration>,

    #[serde(default)]
    pub service_account: Option<String>,

    /// Number of concurrent dispatcher loops.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Interval between status refreshes issued by the CLI while it waits.
    #[serde(default = "default_status_poll_interval", with = "humantime_serde")]
    pub status_poll_interval: Duration,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_image_pull_deadline() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_helper_image() -> String {
    DEFAULT_HELPER_IMAGE.to_string()
}

fn default_workers() -> usize {
    1
}

fn default_status_poll_interval() -> Duration {
    Duration::from_secs(2)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            image_pull_deadline: default_image_pull_deadline(),
            helper_image: default_helper_image(),
            image_pull_policy: ImagePullPolicy::default(),
            job_ttl_after_finished: None,
            service_account: None,
            workers: default_workers(),
            status_poll_interval: default_status_poll_interval(),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load the first config file found in `dir`, or the defaults if there is none.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        match candidates.iter().find(|path| path.exists()) {
            Some(path) => {
                tracing::debug!("loading config from {}", path.display());
                Self::load(path)
            }
            None => {
                tracing::debug!("no config file in {}, using defaults", dir.display());
                Ok(Self::default())
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.namespace.trim().is_empty() {
            return Err(Error::InvalidConfig("namespace cannot be empty".to_string()));
        }
        ImageRef::parse(&self.helper_image)
            .map_err(|e| Error::InvalidConfig(format!("helper_image: {}", e)))?;
        if self.image_pull_deadline < Duration::from_secs(1) {
            return Err(Error::InvalidConfig(
                "image_pull_deadline must be at least 1s".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be at least 1".to_string()));
        }
        if matches!(&self.service_account, Some(sa) if sa.trim().is_empty()) {
            return Err(Error::InvalidConfig(
                "service_account cannot be empty when set".to_string(),
            ));
        }
        Ok(())
    }

    /// `activeDeadlineSeconds` for helper Jobs.
    pub fn active_deadline_seconds(&self) -> i64 {
        i64::try_from(self.image_pull_deadline.as_secs())
            .unwrap_or(i64::MAX)
            .max(1)
    }

    /// `ttlSecondsAfterFinished` for helper Jobs, if configured.
    pub fn ttl_seconds_after_finished(&self) -> Option<i32> {
        self.job_ttl_after_finished
            .map(|ttl| i32::try_from(ttl.as_secs()).unwrap_or(i32::MAX))
    }
}
