//! HTTP client for the cluster management API.
//!
//! Implements the collaborator traits of [`crate::repository`] on top of a
//! Proxmox-style REST layout rooted at `/api2/json`. Reads are retried with
//! the connection's [`RetryPolicy`]; lifecycle writes are sent once and left
//! to the orchestrator's retry decision.

mod types;
mod workload;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{Node, TaskStatus, WorkloadEntry};
use crate::repository::{ClusterListing, NodeRepository, TaskRepository, poll_task};
use crate::retry::{Method, RetryPolicy};

pub use types::upid_node;
pub use workload::WorkloadClient;

use types::{Envelope, GuestDto, NodeDto, TaskStatusDto};

/// Connection settings for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base address, e.g. `https://pve1:8006`.
    pub server: String,
    /// Sent verbatim as the `Authorization` header.
    pub authorization: Option<String>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    pub retry: RetryPolicy,
    /// Interval between task status polls.
    pub poll_interval: Duration,
}

impl ClientConfig {
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            authorization: None,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            insecure: false,
            retry: RetryPolicy::default(),
            poll_interval: crate::repository::TASK_POLL_INTERVAL,
        }
    }

    /// Parse the server address and append the API root.
    pub fn base_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.server)
            .map_err(|e| Error::Config(format!("invalid server address '{}': {e}", self.server)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "server address must be http or https, got '{}'",
                url.scheme()
            )));
        }
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("server address '{}' cannot be a base", self.server)))?
            .pop_if_empty()
            .extend(["api2", "json"]);
        Ok(url)
    }
}

/// Client for the cluster management API.
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    authorization: Option<String>,
    retry: RetryPolicy,
    poll_interval: Duration,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base = config.base_url()?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base,
            authorization: config.authorization,
            retry: config.retry,
            poll_interval: config.poll_interval,
        })
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("invalid API base '{}'", self.base)))?
            .extend(segments);
        Ok(url)
    }

    /// GET with retry.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.url(segments)?;
        self.retry
            .with_retry(Method::Read, || {
                self.send(reqwest::Method::GET, url.clone(), query)
            })
            .await
    }

    /// POST without retry.
    pub(crate) async fn post<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        self.send(reqwest::Method::POST, self.url(segments)?, &[]).await
    }

    /// DELETE without retry.
    pub(crate) async fn delete<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        self.send(reqwest::Method::DELETE, self.url(segments)?, &[]).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<T> {
        debug!(method = %method, path = url.path(), "API request");

        let mut request = self.http.request(method, url).query(query);
        if let Some(auth) = &self.authorization {
            request = request.header(AUTHORIZATION, auth);
        }

        let response = request.send().await.map_err(Error::from_transport)?;
        let status = response.status();
        let body = response.bytes().await.map_err(Error::from_transport)?;

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        let envelope: Envelope<T> = serde_json::from_slice(&body)?;
        Ok(envelope.data)
    }

    /// Every guest row of the cluster resource index.
    pub(crate) async fn cluster_guests(&self) -> Result<Vec<GuestDto>> {
        self.get(&["cluster", "resources"], &[("type", "vm")]).await
    }
}

/// Best-effort error text from a failed response.
fn error_message(status: reqwest::StatusCode, body: &[u8]) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        errors: Option<serde_json::Map<String, serde_json::Value>>,
    }

    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        if let Some(errors) = parsed.errors.filter(|e| !e.is_empty()) {
            return errors
                .iter()
                .map(|(field, err)| match err.as_str() {
                    Some(text) => format!("{field}: {}", text.trim()),
                    None => format!("{field}: {err}"),
                })
                .collect::<Vec<_>>()
                .join("; ");
        }
        if let Some(message) = parsed.message.filter(|m| !m.trim().is_empty()) {
            return message.trim().to_string();
        }
    }
    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}

#[async_trait]
impl ClusterListing for ApiClient {
    async fn list_workloads(&self) -> Result<Vec<WorkloadEntry>> {
        Ok(self
            .cluster_guests()
            .await?
            .into_iter()
            .filter_map(GuestDto::into_entry)
            .collect())
    }
}

#[async_trait]
impl NodeRepository for ApiClient {
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let nodes: Vec<NodeDto> = self.get(&["nodes"], &[]).await?;
        let mut nodes: Vec<Node> = nodes.into_iter().map(Node::from).collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(nodes)
    }
}

#[async_trait]
impl TaskRepository for ApiClient {
    async fn find(&self, task: &str) -> Result<TaskStatus> {
        let node = upid_node(task).ok_or_else(|| Error::InvalidTaskRef(task.to_string()))?;
        let status: TaskStatusDto = self
            .get(&["nodes", node, "tasks", task, "status"], &[])
            .await?;
        Ok(status.into())
    }

    async fn wait(&self, task: &str, timeout: Duration) -> Result<TaskStatus> {
        poll_task(self, task, timeout, self.poll_interval).await
    }
}
