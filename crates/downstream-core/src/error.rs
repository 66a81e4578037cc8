//! Error taxonomy for downstream triggering.

use drone_client::{BuildStatus, ClientError};

/// A repository entry that is not `owner/name[@selector]`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unable to parse repository name {entry}")]
pub struct TargetParseError {
    pub entry: String,
}

/// Errors produced while collecting build parameters.
#[derive(Debug, thiserror::Error)]
pub enum ParamError {
    #[error("invalid param '{entry}'; must be KEY=VALUE or file path (no such file)")]
    NoSuchFile { entry: String },

    #[error("unable to read params file {path}: {reason}")]
    UnreadableFile { path: String, reason: String },

    #[error("param_from_env {key} is not set (env var not set)")]
    EnvVarNotSet { key: String },
}

/// Downstream errors. Every variant is fatal for the whole run.
#[derive(Debug, thiserror::Error)]
pub enum DownstreamError {
    // configuration
    #[error("you must provide your drone access token")]
    MissingToken,

    #[error("you must provide your drone server")]
    MissingServer,

    #[error("only one of wait and last_successful can be true; choose one")]
    ConflictingWaitFlags,

    #[error("invalid duration '{0}'")]
    InvalidDuration(String),

    #[error(transparent)]
    InvalidTarget(#[from] TargetParseError),

    #[error("unable to parse params: {0}")]
    Params(#[from] ParamError),

    #[error("build no or branch must be mentioned for deploy of {entry}, format repository@build/branch")]
    MissingDeploySelector { entry: String },

    #[error("for deploy of {entry} build no must be numeric only or for branch deploy last_successful should be true, format repository@build/branch")]
    NonNumericDeploySelector { entry: String },

    // resolution
    #[error("unable to get requested build {number} for deploy for {entry}")]
    BuildNotFound { entry: String, number: u64 },

    #[error("unable to get latest build for {entry}: {source}")]
    LatestBuildNotFound { entry: String, source: ClientError },

    #[error("unable to get last successful build for {entry}")]
    NoSuccessfulBuild { entry: String },

    // transient, fatal outside the waiting state
    #[error("unable to fetch build state for {entry}: {source}")]
    Fetch { entry: String, source: ClientError },

    #[error("unable to trigger {action} for {entry}: {source}")]
    Trigger {
        entry: String,
        action: &'static str,
        source: ClientError,
    },

    // timeouts
    #[error("timed out waiting on a build for {entry}")]
    PollTimeout { entry: String },

    #[error("timed out waiting for build {number} of {entry}")]
    BlockTimeout { entry: String, number: u64 },

    // blocking
    #[error("build {number} of {entry} did not succeed: {status}")]
    BuildFailed {
        entry: String,
        number: u64,
        status: BuildStatus,
    },

    #[error("unable to check build {number} of {entry}: {source}")]
    BlockFetch {
        entry: String,
        number: u64,
        source: ClientError,
    },

    #[error("canceled downstream build {number} of {entry}")]
    Cancelled { entry: String, number: u64 },

    #[error("could not cancel downstream build {number} of {entry}: {source}")]
    CancelFailed {
        entry: String,
        number: u64,
        source: ClientError,
    },
}

impl DownstreamError {
    /// Failures a target already waiting on an in-flight build shrugs off
    /// until the next tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DownstreamError::Fetch { .. } | DownstreamError::Trigger { .. }
        )
    }
}

/// Result type for downstream operations.
pub type Result<T> = std::result::Result<T, DownstreamError>;
