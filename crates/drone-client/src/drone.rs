//! Drone REST API client
//!
//! Talks to the `/api/repos/{owner}/{name}/builds` family of endpoints with a
//! bearer token. Trigger parameters travel as query values, which is how the
//! server injects them into the pipeline environment.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::build::Build;
use crate::client::{BuildParams, CiClient, ClientResult};
use crate::error::ClientError;

/// Drone connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DroneConfig {
    /// Server URL, e.g. `https://drone.example.com`
    pub server_url: String,
    /// Personal access token
    pub token: String,
}

impl DroneConfig {
    pub fn new(server_url: &str, token: &str) -> Self {
        DroneConfig {
            server_url: server_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }
}

/// HTTP implementation of [`CiClient`].
pub struct DroneClient {
    config: DroneConfig,
    http_client: reqwest::Client,
}

impl DroneClient {
    /// Create a new Drone client
    pub fn new(config: DroneConfig) -> ClientResult<Self> {
        if !config.server_url.starts_with("http://") && !config.server_url.starts_with("https://")
        {
            return Err(ClientError::InvalidServer(config.server_url));
        }

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("downstream/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(DroneClient {
            config,
            http_client,
        })
    }

    pub fn server_url(&self) -> &str {
        &self.config.server_url
    }

    fn builds_url(&self, owner: &str, name: &str) -> String {
        format!(
            "{}/api/repos/{}/{}/builds",
            self.config.server_url, owner, name
        )
    }

    fn build_url(&self, owner: &str, name: &str, number: u64) -> String {
        format!("{}/{}", self.builds_url(owner, name), number)
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> ClientResult<Response> {
        let response = request.bearer_auth(&self.config.token).send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), what, "drone response");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::NOT_FOUND => ClientError::NotFound(what.to_string()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ClientError::Unauthorized(what.to_string())
            }
            _ => ClientError::Http {
                status: status.as_u16(),
                body: body.trim().to_string(),
            },
        })
    }

    async fn json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> ClientResult<T> {
        let response = self.send(request, what).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl CiClient for DroneClient {
    async fn last_build(&self, owner: &str, name: &str, branch: &str) -> ClientResult<Build> {
        let mut request = self
            .http_client
            .get(format!("{}/latest", self.builds_url(owner, name)));
        if !branch.is_empty() {
            request = request.query(&[("branch", branch)]);
        }
        self.json(request, &format!("latest build of {owner}/{name}@{branch}"))
            .await
    }

    async fn build(&self, owner: &str, name: &str, number: u64) -> ClientResult<Build> {
        let request = self.http_client.get(self.build_url(owner, name, number));
        self.json(request, &format!("build {number} of {owner}/{name}"))
            .await
    }

    async fn list_builds(&self, owner: &str, name: &str) -> ClientResult<Vec<Build>> {
        let request = self.http_client.get(self.builds_url(owner, name));
        self.json(request, &format!("builds of {owner}/{name}")).await
    }

    async fn restart_build(
        &self,
        owner: &str,
        name: &str,
        number: u64,
        params: &BuildParams,
    ) -> ClientResult<Build> {
        let request = self
            .http_client
            .post(self.build_url(owner, name, number))
            .query(params);
        self.json(request, &format!("build {number} of {owner}/{name}"))
            .await
    }

    async fn promote_build(
        &self,
        owner: &str,
        name: &str,
        number: u64,
        environment: &str,
        params: &BuildParams,
    ) -> ClientResult<Build> {
        let request = self
            .http_client
            .post(format!("{}/promote", self.build_url(owner, name, number)))
            .query(&[("target", environment)])
            .query(params);
        self.json(request, &format!("build {number} of {owner}/{name}"))
            .await
    }

    async fn cancel_build(&self, owner: &str, name: &str, number: u64) -> ClientResult<()> {
        let request = self.http_client.delete(self.build_url(owner, name, number));
        self.send(request, &format!("build {number} of {owner}/{name}"))
            .await
            .map(|_| ())
    }
}
