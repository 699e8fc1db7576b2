//! Human-facing diagnostics derived from a status snapshot.
//!
//! The daemon exposes no log API, so the "server logs" and "server issues"
//! views are synthesized from the latest probe.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::status::{ServerState, ServerStatus};

/// Response time above which a running daemon is reported as slow.
pub const SLOW_RESPONSE_SECS: f64 = 2.0;

const MAX_MODEL_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticLog {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

/// A problem worth showing to the operator, with a hint for fixing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub timestamp: DateTime<Utc>,
    pub level: Severity,
    pub title: String,
    pub error: String,
    pub detail: String,
    pub suggestion: String,
}

pub fn server_logs(status: &ServerStatus, base_url: &str, at: DateTime<Utc>) -> Vec<DiagnosticLog> {
    let log = |level, message: String| DiagnosticLog {
        timestamp: at,
        level,
        message,
    };

    let Some(models) = status.models() else {
        let error = status.error_message().unwrap_or("Unknown error");
        return vec![log(
            LogLevel::Error,
            format!("Ollama server is not responding: {error}"),
        )];
    };

    let mut logs = vec![
        log(
            LogLevel::Info,
            format!("Ollama server is running on {base_url}"),
        ),
        log(LogLevel::Info, format!("Loaded {} models", models.len())),
    ];
    logs.extend(models.iter().take(MAX_MODEL_LINES).map(|m| {
        log(
            LogLevel::Success,
            format!("Model {} is available", m.name),
        )
    }));
    logs.push(log(
        LogLevel::Info,
        "API endpoints responding normally".to_string(),
    ));
    logs
}

pub fn server_issues(status: &ServerStatus, base_url: &str, at: DateTime<Utc>) -> Vec<Issue> {
    let issue = |level, title: &str, error: String, detail: String, suggestion: &str| Issue {
        timestamp: at,
        level,
        title: title.to_string(),
        error,
        detail,
        suggestion: suggestion.to_string(),
    };

    match status.state() {
        ServerState::Stopped => vec![issue(
            Severity::Critical,
            "Server Not Running",
            "Ollama server is not responding".to_string(),
            format!("Connection refused to {base_url}"),
            "Start the Ollama server using \"ollama serve\" command",
        )],
        ServerState::Timeout => vec![issue(
            Severity::Error,
            "Server Timeout",
            "Server request timed out".to_string(),
            format!("Request to {base_url}/api/tags timed out"),
            "Check server load and network connectivity",
        )],
        ServerState::Error => vec![issue(
            Severity::Error,
            "Server Error",
            status
                .error_message()
                .unwrap_or("Unknown server error")
                .to_string(),
            format!("HTTP response from {base_url}"),
            "Check Ollama server logs for more details",
        )],
        ServerState::Running => match status.response_time_secs() {
            Some(rt) if rt > SLOW_RESPONSE_SECS => vec![issue(
                Severity::Warning,
                "Slow Response Time",
                format!("API response time: {rt:.2}s (threshold: {SLOW_RESPONSE_SECS:.1}s)"),
                "API response measurement".to_string(),
                "Consider checking server load or using a smaller model",
            )],
            _ => Vec::new(),
        },
        ServerState::Unknown => Vec::new(),
    }
}
