//! HTTP client for the model daemon's REST API.
//!
//! One [`DaemonClient`] is built at process start and shared (`Arc`) by the
//! prober, the front-ends and background download tasks. Each call carries
//! its own timeout, sized for what the daemon has to do: listing is quick,
//! pulling a model can take minutes.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::status::ModelSummary;

/// Default daemon address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

const LIST_TIMEOUT: Duration = Duration::from_secs(10);
const PULL_TIMEOUT: Duration = Duration::from_secs(300);
const DELETE_TIMEOUT: Duration = Duration::from_secs(30);
const SHOW_TIMEOUT: Duration = Duration::from_secs(30);
const GENERATE_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors from daemon API calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to connect to daemon at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("daemon returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("failed to parse daemon response: {0}")]
    Parse(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl ClientError {
    fn from_transport(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_connect() {
            ClientError::Unreachable {
                url: url.to_string(),
                reason: err.to_string(),
            }
        } else if err.is_decode() {
            ClientError::Parse(err.to_string())
        } else {
            ClientError::Request(err.to_string())
        }
    }
}

/// `GET /api/tags` body.
#[derive(Debug, Deserialize)]
pub(crate) struct TagsResponse {
    #[serde(default)]
    pub models: Vec<WireModel>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireModel {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    modified_at: String,
    #[serde(default)]
    details: Option<WireModelDetails>,
}

#[derive(Debug, Deserialize)]
struct WireModelDetails {
    #[serde(default)]
    family: Option<String>,
}

impl From<WireModel> for ModelSummary {
    fn from(wire: WireModel) -> Self {
        let name = wire.name.unwrap_or_else(|| "Unknown".to_string());
        let summary = ModelSummary::new(name, wire.size, &wire.modified_at);
        match wire.details.and_then(|d| d.family) {
            Some(family) if !family.is_empty() => summary.with_family(family),
            _ => summary,
        }
    }
}

impl TagsResponse {
    pub(crate) fn into_summaries(self) -> Vec<ModelSummary> {
        self.models.into_iter().map(ModelSummary::from).collect()
    }
}

#[derive(Debug, Serialize)]
struct NameRequest<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct PullRequest<'a> {
    name: &'a str,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

/// Client for one daemon instance.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    http: Client,
    base_url: String,
}

impl DaemonClient {
    /// Create a client for the daemon at `base_url`. A trailing `/` is dropped.
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .user_agent(crate::build_info::user_agent())
            .build()
            .unwrap_or_default();
        Self::with_http_client(http, base_url)
    }

    /// Create a client that reuses an existing `reqwest::Client`.
    pub fn with_http_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn from_config(config: &herdctl_config::DaemonConfig) -> Self {
        Self::new(config.base_url.as_str())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Build a request with a per-call timeout. Used by the prober as well.
    pub(crate) fn request(&self, method: Method, path: &str, timeout: Duration) -> RequestBuilder {
        self.http
            .request(method, self.endpoint(path))
            .timeout(timeout)
    }

    async fn send(&self, path: &str, builder: RequestBuilder) -> Result<Response, ClientError> {
        let url = self.endpoint(path);
        debug!(url = %url, "daemon request");

        let resp = builder
            .send()
            .await
            .map_err(|e| ClientError::from_transport(&url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        builder: RequestBuilder,
    ) -> Result<T, ClientError> {
        let url = self.endpoint(path);
        let resp = self.send(path, builder).await?;
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ClientError::from_transport(&url, e))?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Parse(format!("{path}: {e}")))
    }

    // ── Typed API methods ──────────────────────────────────────────────

    /// List locally available models.
    pub async fn list_models(&self) -> Result<Vec<ModelSummary>, ClientError> {
        let path = "/api/tags";
        let builder = self.request(Method::GET, path, LIST_TIMEOUT);
        let tags: TagsResponse = self.send_json(path, builder).await?;
        Ok(tags.into_summaries())
    }

    /// Download a model. Blocks until the daemon reports the pull finished.
    pub async fn pull_model(&self, name: &str) -> Result<(), ClientError> {
        let path = "/api/pull";
        let builder = self
            .request(Method::POST, path, PULL_TIMEOUT)
            .json(&PullRequest {
                name,
                stream: false,
            });
        self.send(path, builder).await?;
        Ok(())
    }

    /// Remove a model from the daemon's store.
    pub async fn delete_model(&self, name: &str) -> Result<(), ClientError> {
        let path = "/api/delete";
        let builder = self
            .request(Method::DELETE, path, DELETE_TIMEOUT)
            .json(&NameRequest { name });
        self.send(path, builder).await?;
        Ok(())
    }

    /// Fetch a model's metadata (modelfile, parameters, template, details).
    pub async fn show_model(&self, name: &str) -> Result<serde_json::Value, ClientError> {
        let path = "/api/show";
        let builder = self
            .request(Method::POST, path, SHOW_TIMEOUT)
            .json(&NameRequest { name });
        self.send_json(path, builder).await
    }

    /// Run a single non-streaming completion and return its text.
    pub async fn generate(&self, model: &str, prompt: &str) -> Result<String, ClientError> {
        let path = "/api/generate";
        let builder = self
            .request(Method::POST, path, GENERATE_TIMEOUT)
            .json(&GenerateRequest {
                model,
                prompt,
                stream: false,
            });
        let resp: GenerateResponse = self.send_json(path, builder).await?;
        if let Some(error) = resp.error {
            return Err(ClientError::Request(error));
        }
        Ok(resp.response)
    }
}

impl Default for DaemonClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
