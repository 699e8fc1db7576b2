//! Request and response bodies for the browser API.
//!
//! Every response carries a `success` flag. Failures add an `error` string
//! and are usually sent with HTTP 200 so the page can render them inline.

use herdctl_core::chat::ChatTurn;
use herdctl_core::diagnostics::{DiagnosticLog, Issue};
use herdctl_core::{ControlAvailability, ModelSummary, OperationResult, ServerState, ServerStatus};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/download` and `POST /api/delete`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelNameRequest {
    #[serde(default)]
    pub model_name: Option<String>,
}

impl ModelNameRequest {
    /// The trimmed model name, if one was given.
    pub fn name(&self) -> Option<&str> {
        self.model_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// One row of the model table, preformatted for display.
#[derive(Debug, Clone, Serialize)]
pub struct ModelView {
    pub name: String,
    pub size: String,
    pub modified_at: String,
    pub family: String,
    pub raw_size: u64,
}

impl From<&ModelSummary> for ModelView {
    fn from(model: &ModelSummary) -> Self {
        Self {
            name: model.name.clone(),
            size: model.display_size(),
            modified_at: model.modified_at.display(),
            family: model.family.clone(),
            raw_size: model.size_bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelsResponse {
    pub success: bool,
    pub models: Vec<ModelView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InfoResponse {
    pub success: bool,
    pub info: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    pub success: bool,
    pub response: String,
}

/// `GET /api/server/status`. A stopped daemon is a successful answer.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub status: ServerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub controls: ControlAvailability,
    pub busy: bool,
    pub version: String,
}

impl StatusResponse {
    pub fn new(status: &ServerStatus, busy: bool) -> Self {
        Self {
            success: true,
            status: status.state(),
            models_count: status.model_count(),
            response_time: status.response_time_secs(),
            error: status.error_message().map(str::to_string),
            controls: ControlAvailability::for_state(status.state(), busy),
            busy,
            version: herdctl_core::build_info::version_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogsResponse {
    pub success: bool,
    pub logs: Vec<DiagnosticLog>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorsResponse {
    pub success: bool,
    pub errors: Vec<Issue>,
}

/// Outcome of `POST /api/server/{start,stop,restart}`.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleResponse {
    pub action: &'static str,
    #[serde(flatten)]
    pub result: OperationResult,
}
