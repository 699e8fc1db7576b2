//! Status snapshots and model inventory types.
//!
//! A [`ServerStatus`] is an immutable value produced by every probe. Its
//! constructors are the only way to build one, which keeps the state/field
//! pairing consistent: a running daemon always carries a model list and no
//! error, while a stopped, timed-out or failing daemon always carries an
//! error and no model list.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Serialize, Serializer};

use crate::format::{format_datetime, format_size, parse_timestamp};

/// Coarse daemon state after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerState {
    Running,
    Stopped,
    Timeout,
    Error,
    /// No probe has completed yet.
    Unknown,
}

impl ServerState {
    pub fn as_str(self) -> &'static str {
        match self {
            ServerState::Running => "running",
            ServerState::Stopped => "stopped",
            ServerState::Timeout => "timeout",
            ServerState::Error => "error",
            ServerState::Unknown => "unknown",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ServerState::Running => "Running",
            ServerState::Stopped => "Stopped",
            ServerState::Timeout => "Timeout",
            ServerState::Error => "Error",
            ServerState::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// When a model was last modified, as reported by the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModifiedAt {
    Timestamp(DateTime<FixedOffset>),
    /// The daemon's value did not parse as RFC 3339.
    Raw(String),
}

impl ModifiedAt {
    pub fn parse(raw: &str) -> Self {
        match parse_timestamp(raw) {
            Some(ts) => ModifiedAt::Timestamp(ts),
            None => ModifiedAt::Raw(raw.to_string()),
        }
    }

    /// `YYYY-MM-DD HH:MM` for timestamps, the raw text otherwise.
    pub fn display(&self) -> String {
        match self {
            ModifiedAt::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M").to_string(),
            ModifiedAt::Raw(raw) => format_datetime(raw),
        }
    }
}

impl Serialize for ModifiedAt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ModifiedAt::Timestamp(ts) => serializer.serialize_str(&ts.to_rfc3339()),
            ModifiedAt::Raw(raw) => serializer.serialize_str(raw),
        }
    }
}

/// One entry of the daemon's model inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub size_bytes: u64,
    pub modified_at: ModifiedAt,
    pub family: String,
}

impl ModelSummary {
    pub const UNKNOWN_FAMILY: &'static str = "Unknown";

    pub fn new(name: impl Into<String>, size_bytes: u64, modified_at: &str) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            modified_at: ModifiedAt::parse(modified_at),
            family: Self::UNKNOWN_FAMILY.to_string(),
        }
    }

    pub fn with_family(mut self, family: impl Into<String>) -> Self {
        self.family = family.into();
        self
    }

    pub fn display_size(&self) -> String {
        format_size(self.size_bytes)
    }

    /// Size in mebibytes with one decimal, as the status views list it.
    pub fn size_mb(&self) -> String {
        format!("{:.1} MB", self.size_bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Immutable result of one probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerStatus {
    state: ServerState,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_time_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    models: Option<Vec<ModelSummary>>,
}

impl ServerStatus {
    pub fn running(models: Vec<ModelSummary>, response_time_secs: f64) -> Self {
        Self {
            state: ServerState::Running,
            error: None,
            response_time_secs: Some(response_time_secs),
            models: Some(models),
        }
    }

    pub fn stopped(error: impl Into<String>) -> Self {
        Self::failed(ServerState::Stopped, error.into(), None)
    }

    pub fn timed_out(error: impl Into<String>) -> Self {
        Self::failed(ServerState::Timeout, error.into(), None)
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::failed(ServerState::Error, error.into(), None)
    }

    /// The daemon answered, but with a non-success status code.
    pub fn http_error(status: u16, response_time_secs: f64) -> Self {
        Self::failed(
            ServerState::Error,
            format!("HTTP {status}"),
            Some(response_time_secs),
        )
    }

    pub fn unknown() -> Self {
        Self {
            state: ServerState::Unknown,
            error: None,
            response_time_secs: None,
            models: None,
        }
    }

    fn failed(state: ServerState, error: String, response_time_secs: Option<f64>) -> Self {
        Self {
            state,
            error: Some(error),
            response_time_secs,
            models: None,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ServerState::Running
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn response_time_secs(&self) -> Option<f64> {
        self.response_time_secs
    }

    /// The inventory, present only when the daemon is running.
    pub fn models(&self) -> Option<&[ModelSummary]> {
        self.models.as_deref()
    }

    pub fn model_count(&self) -> Option<usize> {
        self.models.as_ref().map(Vec::len)
    }
}

impl Default for ServerStatus {
    fn default() -> Self {
        Self::unknown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn all_states() -> Vec<ServerStatus> {
        vec![
            ServerStatus::running(vec![], 0.01),
            ServerStatus::running(vec![ModelSummary::new("llama2:7b", 10, "")], 0.2),
            ServerStatus::stopped("Connection refused"),
            ServerStatus::timed_out("Request timed out"),
            ServerStatus::error("boom"),
            ServerStatus::http_error(500, 0.1),
        ]
    }

    #[test]
    fn test_running_iff_models_and_no_error() {
        for status in all_states() {
            let running = status.state() == ServerState::Running;
            assert_eq!(
                running,
                status.models().is_some() && status.error_message().is_none(),
                "{status:?}"
            );
            if !running {
                assert!(status.error_message().is_some());
                assert!(status.models().is_none());
            }
        }
    }

    #[test]
    fn test_http_error_message() {
        let status = ServerStatus::http_error(503, 0.05);
        assert_eq!(status.state(), ServerState::Error);
        assert_eq!(status.error_message(), Some("HTTP 503"));
        assert_eq!(status.response_time_secs(), Some(0.05));
    }

    #[test]
    fn test_unknown_has_nothing() {
        let status = ServerStatus::default();
        assert_eq!(status.state(), ServerState::Unknown);
        assert!(status.error_message().is_none());
        assert!(status.model_count().is_none());
    }

    #[test]
    fn test_state_serializes_lowercase() {
        let json = serde_json::to_value(ServerStatus::stopped("Connection refused")).unwrap();
        assert_eq!(json["state"], "stopped");
        assert_eq!(json["error"], "Connection refused");
        assert!(json.get("models").is_none());
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(ServerState::Timeout.to_string(), "Timeout");
        assert_eq!(ServerState::Timeout.as_str(), "timeout");
    }

    #[test]
    fn test_modified_at_parsing() {
        let parsed = ModifiedAt::parse("2024-01-15T10:30:00Z");
        assert!(matches!(parsed, ModifiedAt::Timestamp(_)));
        assert_eq!(parsed.display(), "2024-01-15 10:30");

        let raw = ModifiedAt::parse("last tuesday");
        assert_eq!(raw, ModifiedAt::Raw("last tuesday".to_string()));
        assert_eq!(raw.display(), "last tuesday");
    }

    #[test]
    fn test_model_summary_defaults_and_sizes() {
        let model = ModelSummary::new("mistral:7b", 4_109_000_000, "2024-01-14T14:20:00Z");
        assert_eq!(model.family, "Unknown");
        assert_eq!(model.display_size(), "3.8 GB");
        assert_eq!(model.size_mb(), "3918.6 MB");

        let model = model.with_family("mistral");
        assert_eq!(model.family, "mistral");
    }
}
