// ABOUTME: Image manager error types with the SNAFU pattern.
// ABOUTME: Distinguishes caller defects, API failures, and Pod/Job correlation problems.

use snafu::Snafu;

use crate::cluster::ClusterError;
use crate::types::JobName;

/// Failures of the job factory and the status aggregator.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ImageManagerError {
    /// The request broke the caller contract (no owning image cache).
    #[snafu(display("invalid image work request: {reason}"))]
    InvalidRequest { reason: String },

    /// The cluster API failed. Displays the API server's text unchanged.
    #[snafu(display("{source}"))]
    Api { source: ClusterError },

    /// No Pod carries the job's label yet.
    #[snafu(display("No pods matched job {job}"))]
    NoPodsMatched { job: JobName },

    /// More than one Pod claims to belong to the job.
    #[snafu(display("More than one pod matched job {job} ({count} pods)"))]
    AmbiguousPodMatch { job: JobName, count: usize },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Programming error in the caller; never retried.
    InvalidRequest,
    /// The cluster API rejected or failed a call.
    Api,
    /// The job's Pod is not visible yet; refresh again later.
    NoPodsMatched,
    /// One-Pod-per-Job was violated; needs investigation.
    AmbiguousPodMatch,
}

impl ImageManagerError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImageManagerError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            ImageManagerError::Api { .. } => ErrorKind::Api,
            ImageManagerError::NoPodsMatched { .. } => ErrorKind::NoPodsMatched,
            ImageManagerError::AmbiguousPodMatch { .. } => ErrorKind::AmbiguousPodMatch,
        }
    }

    /// Whether re-issuing a status refresh later is expected to clear the error.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::NoPodsMatched
    }
}

impl From<ClusterError> for ImageManagerError {
    fn from(source: ClusterError) -> Self {
        ImageManagerError::Api { source }
    }
}
