//! Build model as returned by the Drone API.

use serde::{Deserialize, Serialize};

/// Status of a remote build.
///
/// The server owns the status vocabulary; anything outside the known set is
/// preserved verbatim in `Other` and treated as non-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BuildStatus {
    Pending,
    Running,
    Passing,
    Failing,
    Error,
    Killed,
    Declined,
    Skipped,
    Other(String),
}

impl BuildStatus {
    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            BuildStatus::Pending => "pending",
            BuildStatus::Running => "running",
            BuildStatus::Passing => "success",
            BuildStatus::Failing => "failure",
            BuildStatus::Error => "error",
            BuildStatus::Killed => "killed",
            BuildStatus::Declined => "declined",
            BuildStatus::Skipped => "skipped",
            BuildStatus::Other(raw) => raw,
        }
    }

    /// Still queued or executing; a new trigger would race it.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, BuildStatus::Pending | BuildStatus::Running)
    }

    /// No further transition will happen.
    pub fn is_terminal(&self) -> bool {
        self.is_success() || self.is_failure()
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BuildStatus::Passing)
    }

    /// Terminal states other than success.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            BuildStatus::Error
                | BuildStatus::Killed
                | BuildStatus::Failing
                | BuildStatus::Declined
                | BuildStatus::Skipped
        )
    }
}

impl From<String> for BuildStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "pending" => BuildStatus::Pending,
            "running" => BuildStatus::Running,
            "success" | "passing" => BuildStatus::Passing,
            "failure" | "failing" => BuildStatus::Failing,
            "error" => BuildStatus::Error,
            "killed" => BuildStatus::Killed,
            "declined" => BuildStatus::Declined,
            "skipped" => BuildStatus::Skipped,
            _ => BuildStatus::Other(raw),
        }
    }
}

impl From<&str> for BuildStatus {
    fn from(raw: &str) -> Self {
        BuildStatus::from(raw.to_string())
    }
}

impl From<BuildStatus> for String {
    fn from(status: BuildStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A build on the remote server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    #[serde(default)]
    pub id: i64,

    pub number: u64,

    pub status: BuildStatus,

    /// Event that created the build (push, promote, custom, ...)
    #[serde(default)]
    pub event: String,

    /// Source branch
    #[serde(default)]
    pub source: String,

    /// Target branch, or the environment for promotions
    #[serde(default)]
    pub target: String,

    #[serde(default)]
    pub after: String,

    #[serde(default)]
    pub deploy_to: String,

    /// Unix seconds
    #[serde(default)]
    pub created: i64,

    #[serde(default)]
    pub started: i64,

    #[serde(default)]
    pub finished: i64,
}

impl Build {
    /// Minimal build, mostly for fakes and tests.
    pub fn new(number: u64, source: impl Into<String>, status: impl Into<BuildStatus>) -> Self {
        Build {
            id: number as i64,
            number,
            status: status.into(),
            event: String::new(),
            source: source.into(),
            target: String::new(),
            after: String::new(),
            deploy_to: String::new(),
            created: 0,
            started: 0,
            finished: 0,
        }
    }
}
