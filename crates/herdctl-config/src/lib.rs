#![deny(unsafe_code)]

//! Configuration loading and validation for herdctl.
//!
//! Loads TOML configuration files and validates them. Every field has a
//! default, so an empty file (or no file at all) yields a working setup
//! that talks to a daemon on `http://localhost:11434`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the managed daemon lives and how patiently to probe it.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// Start/stop candidate commands and lifecycle delays.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Periodic status monitoring.
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Browser front-end listener.
    #[serde(default)]
    pub web: WebConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection settings for the managed daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Base URL of the daemon's HTTP API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Probe timeout used by the interactive front-ends.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Probe timeout used by one-shot CLI checks.
    #[serde(default = "default_cli_probe_timeout_secs")]
    pub cli_probe_timeout_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            probe_timeout_secs: default_probe_timeout_secs(),
            cli_probe_timeout_secs: default_cli_probe_timeout_secs(),
        }
    }
}

impl DaemonConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn cli_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.cli_probe_timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_cli_probe_timeout_secs() -> u64 {
    10
}

/// Lifecycle command candidates and timing.
///
/// Each candidate is an argv array; the first element is the executable.
///
/// ## TOML Example
///
/// ```toml
/// [lifecycle]
/// start_commands = [["ollama", "serve"], ["systemctl", "start", "ollama"]]
/// stop_commands = [["systemctl", "stop", "ollama"]]
/// command_timeout_secs = 10
/// timeout_policy = "continue"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Ordered ways to launch the daemon.
    #[serde(default = "default_start_commands")]
    pub start_commands: Vec<Vec<String>>,

    /// Ordered ways to stop the daemon.
    #[serde(default = "default_stop_commands")]
    pub stop_commands: Vec<Vec<String>>,

    /// Upper bound for a single stop candidate to finish.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Pause after a start before the daemon is expected to answer probes.
    #[serde(default = "default_start_settle_secs")]
    pub start_settle_secs: u64,

    /// Pause between the stop and start halves of a restart.
    #[serde(default = "default_restart_delay_secs")]
    pub restart_delay_secs: u64,

    /// What a timed-out candidate does to the rest of the chain:
    /// "abort" ends the operation, "continue" moves on to the next candidate.
    #[serde(default = "default_timeout_policy")]
    pub timeout_policy: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            start_commands: default_start_commands(),
            stop_commands: default_stop_commands(),
            command_timeout_secs: default_command_timeout_secs(),
            start_settle_secs: default_start_settle_secs(),
            restart_delay_secs: default_restart_delay_secs(),
            timeout_policy: default_timeout_policy(),
        }
    }
}

impl LifecycleConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn start_settle(&self) -> Duration {
        Duration::from_secs(self.start_settle_secs)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn default_start_commands() -> Vec<Vec<String>> {
    if cfg!(windows) {
        vec![argv(&["ollama", "serve"])]
    } else {
        vec![
            argv(&["ollama", "serve"]),
            argv(&["systemctl", "start", "ollama"]),
            argv(&["/usr/local/bin/ollama", "serve"]),
        ]
    }
}

fn default_stop_commands() -> Vec<Vec<String>> {
    if cfg!(windows) {
        vec![argv(&["taskkill", "/IM", "ollama.exe", "/F"])]
    } else {
        vec![
            argv(&["pkill", "-f", "ollama serve"]),
            argv(&["systemctl", "stop", "ollama"]),
            argv(&["killall", "ollama"]),
        ]
    }
}

fn default_command_timeout_secs() -> u64 {
    10
}

fn default_start_settle_secs() -> u64 {
    2
}

fn default_restart_delay_secs() -> u64 {
    3
}

fn default_timeout_policy() -> String {
    "abort".to_string()
}

/// Periodic status monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between automatic probes.
    #[serde(default = "default_monitor_interval_secs")]
    pub interval_secs: u64,

    /// Whether automatic probing is on when a front-end starts.
    #[serde(default = "default_auto_refresh")]
    pub auto_refresh: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_monitor_interval_secs(),
            auto_refresh: default_auto_refresh(),
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_monitor_interval_secs() -> u64 {
    5
}

fn default_auto_refresh() -> bool {
    true
}

/// Listener for the browser front-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_web_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_web_listen_port")]
    pub listen_port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_web_listen_addr(),
            listen_port: default_web_listen_port(),
        }
    }
}

fn default_web_listen_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_web_listen_port() -> u16 {
    5000
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    pub async fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            debug!(path = %path.display(), "config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.daemon.base_url.as_str();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "daemon.base_url must start with http:// or https://, got {url:?}"
            )));
        }
        if self.daemon.probe_timeout_secs == 0 || self.daemon.cli_probe_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "daemon probe timeouts must be non-zero".to_string(),
            ));
        }

        let lifecycle = &self.lifecycle;
        for (field, commands) in [
            ("start_commands", &lifecycle.start_commands),
            ("stop_commands", &lifecycle.stop_commands),
        ] {
            if commands.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "lifecycle.{field} must contain at least one command"
                )));
            }
            for (i, command) in commands.iter().enumerate() {
                if command.first().is_none_or(|program| program.trim().is_empty()) {
                    return Err(ConfigError::Validation(format!(
                        "lifecycle.{field}[{i}] must name an executable"
                    )));
                }
            }
        }
        if lifecycle.command_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "lifecycle.command_timeout_secs must be non-zero".to_string(),
            ));
        }
        let valid_policies = ["abort", "continue"];
        if !valid_policies.contains(&lifecycle.timeout_policy.as_str()) {
            return Err(ConfigError::Validation(format!(
                "lifecycle.timeout_policy must be one of {:?}, got {:?}",
                valid_policies, lifecycle.timeout_policy
            )));
        }

        if self.monitor.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "monitor.interval_secs must be non-zero".to_string(),
            ));
        }

        if self.web.listen_port == 0 {
            return Err(ConfigError::Validation(
                "web.listen_port must be non-zero".to_string(),
            ));
        }
        if self.web.listen_addr.is_empty() {
            return Err(ConfigError::Validation(
                "web.listen_addr must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.daemon.base_url, "http://localhost:11434");
        assert_eq!(config.daemon.probe_timeout(), Duration::from_secs(5));
        assert_eq!(config.daemon.cli_probe_timeout(), Duration::from_secs(10));
        assert_eq!(config.lifecycle.start_settle(), Duration::from_secs(2));
        assert_eq!(config.lifecycle.restart_delay(), Duration::from_secs(3));
        assert_eq!(config.lifecycle.timeout_policy, "abort");
        assert_eq!(config.monitor.interval(), Duration::from_secs(5));
        assert!(config.monitor.auto_refresh);
        assert_eq!(config.web.listen_port, 5000);
        assert_eq!(config.logging.level, "info");
        config.validate().unwrap();
    }

    #[test]
    fn test_default_commands_start_with_direct_launch() {
        let config = AppConfig::default();
        assert_eq!(config.lifecycle.start_commands[0], vec!["ollama", "serve"]);
        assert!(!config.lifecycle.stop_commands.is_empty());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.daemon.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            [daemon]
            base_url = "http://10.0.0.5:11434"
            probe_timeout_secs = 2

            [lifecycle]
            start_commands = [["ollama", "serve"]]
            stop_commands = [["pkill", "ollama"], ["killall", "ollama"]]
            command_timeout_secs = 4
            timeout_policy = "continue"

            [monitor]
            interval_secs = 15
            auto_refresh = false

            [web]
            listen_addr = "0.0.0.0"
            listen_port = 8080

            [logging]
            level = "debug"
        "#;
        let config = AppConfig::parse(toml).unwrap();
        assert_eq!(config.daemon.base_url, "http://10.0.0.5:11434");
        assert_eq!(config.daemon.probe_timeout_secs, 2);
        assert_eq!(config.daemon.cli_probe_timeout_secs, 10);
        assert_eq!(config.lifecycle.stop_commands.len(), 2);
        assert_eq!(config.lifecycle.command_timeout(), Duration::from_secs(4));
        assert_eq!(config.lifecycle.timeout_policy, "continue");
        assert_eq!(config.monitor.interval_secs, 15);
        assert!(!config.monitor.auto_refresh);
        assert_eq!(config.web.listen_addr, "0.0.0.0");
        assert_eq!(config.web.listen_port, 8080);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_validation_rejects_non_http_url() {
        let toml = r#"
            [daemon]
            base_url = "localhost:11434"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_probe_timeout() {
        let toml = r#"
            [daemon]
            probe_timeout_secs = 0
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_empty_command_list() {
        let toml = r#"
            [lifecycle]
            stop_commands = []
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_empty_argv() {
        let toml = r#"
            [lifecycle]
            start_commands = [["ollama", "serve"], []]
        "#;
        let err = AppConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("start_commands[1]"));
    }

    #[test]
    fn test_validation_rejects_blank_program() {
        let toml = r#"
            [lifecycle]
            stop_commands = [["  ", "ollama"]]
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_unknown_timeout_policy() {
        let toml = r#"
            [lifecycle]
            timeout_policy = "retry"
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let toml = r#"
            [monitor]
            interval_secs = 0
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_web_port() {
        let toml = r#"
            [web]
            listen_port = 0
        "#;
        assert!(AppConfig::parse(toml).is_err());
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = AppConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let reparsed = AppConfig::parse(&text).unwrap();
        assert_eq!(reparsed.lifecycle.stop_commands, config.lifecycle.stop_commands);
        assert_eq!(reparsed.daemon.base_url, config.daemon.base_url);
    }

    // ── Async file-based loading ──────────────────────────────────────

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("herdctl.toml");
        tokio::fs::write(&path, b"[daemon]\nbase_url = \"http://127.0.0.1:4242\"\n")
            .await
            .unwrap();

        let config = AppConfig::load(&path).await.unwrap();
        assert_eq!(config.daemon.base_url, "http://127.0.0.1:4242");
    }

    #[tokio::test]
    async fn test_load_nonexistent_file() {
        let result = AppConfig::load(Path::new("/nonexistent/file.toml")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_or_default_without_file() {
        let tmp = TempDir::new().unwrap();
        let config = AppConfig::load_or_default(&tmp.path().join("missing.toml"))
            .await
            .unwrap();
        assert_eq!(config.daemon.base_url, "http://localhost:11434");
    }

    #[tokio::test]
    async fn test_load_or_default_surfaces_invalid_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        tokio::fs::write(&path, b"not valid toml [[[").await.unwrap();

        assert!(AppConfig::load_or_default(&path).await.is_err());
    }

    // ── Error display ─────────────────────────────────────────────────

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("bad value".to_string());
        assert_eq!(err.to_string(), "validation error: bad value");
    }
}
