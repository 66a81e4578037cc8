//! The remote CI contract the orchestrator drives.
//!
//! Implementations: [`crate::DroneClient`] over HTTP and
//! [`crate::fakes::ScriptedClient`] in memory.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::build::Build;
use crate::error::ClientError;

/// Result type for client operations
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Extra parameters passed to a triggered build, ordered by key.
pub type BuildParams = BTreeMap<String, String>;

/// Remote CI operations needed to trigger and await downstream builds.
///
/// Every call may fail with a transport or HTTP error. Calls are not
/// cancellable mid-flight; callers bound them only between calls.
#[async_trait]
pub trait CiClient: Send + Sync {
    /// Latest build for `branch`. An empty branch means the default branch.
    async fn last_build(&self, owner: &str, name: &str, branch: &str) -> ClientResult<Build>;

    /// Build by number.
    async fn build(&self, owner: &str, name: &str, number: u64) -> ClientResult<Build>;

    /// Recent builds, newest first.
    async fn list_builds(&self, owner: &str, name: &str) -> ClientResult<Vec<Build>>;

    /// Start a new build from an existing one. Returns the new build.
    async fn restart_build(
        &self,
        owner: &str,
        name: &str,
        number: u64,
        params: &BuildParams,
    ) -> ClientResult<Build>;

    /// Promote an existing build to `environment`. Returns the deployment build.
    async fn promote_build(
        &self,
        owner: &str,
        name: &str,
        number: u64,
        environment: &str,
        params: &BuildParams,
    ) -> ClientResult<Build>;

    /// Stop a running build.
    async fn cancel_build(&self, owner: &str, name: &str, number: u64) -> ClientResult<()>;
}
