//! Configuration builders and temp config files for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values
//! without repeating boilerplate across crate boundaries, and
//! [`TempConfigFile`] when the code under test reads a path.

use std::path::{Path, PathBuf};

use herdctl_config::AppConfig;
use tempfile::TempDir;

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .base_url(&daemon.base_url())
///     .instant_lifecycle()
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn base_url(mut self, url: &str) -> Self {
        self.config.daemon.base_url = url.to_string();
        self
    }

    pub fn probe_timeout_secs(mut self, secs: u64) -> Self {
        self.config.daemon.probe_timeout_secs = secs;
        self.config.daemon.cli_probe_timeout_secs = secs;
        self
    }

    pub fn start_commands(mut self, commands: &[&[&str]]) -> Self {
        self.config.lifecycle.start_commands = argvs(commands);
        self
    }

    pub fn stop_commands(mut self, commands: &[&[&str]]) -> Self {
        self.config.lifecycle.stop_commands = argvs(commands);
        self
    }

    pub fn timeout_policy(mut self, policy: &str) -> Self {
        self.config.lifecycle.timeout_policy = policy.to_string();
        self
    }

    /// No settle or restart delay, so lifecycle tests run quickly.
    pub fn instant_lifecycle(mut self) -> Self {
        self.config.lifecycle.start_settle_secs = 0;
        self.config.lifecycle.restart_delay_secs = 0;
        self
    }

    pub fn restart_delay_secs(mut self, secs: u64) -> Self {
        self.config.lifecycle.restart_delay_secs = secs;
        self
    }

    pub fn monitor_interval_secs(mut self, secs: u64) -> Self {
        self.config.monitor.interval_secs = secs;
        self
    }

    pub fn auto_refresh(mut self, enabled: bool) -> Self {
        self.config.monitor.auto_refresh = enabled;
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn argvs(commands: &[&[&str]]) -> Vec<Vec<String>> {
    commands
        .iter()
        .map(|argv| argv.iter().map(|s| s.to_string()).collect())
        .collect()
}

/// A TOML config file in a temp directory that is removed on drop.
pub struct TempConfigFile {
    path: PathBuf,
    _dir: TempDir,
}

impl TempConfigFile {
    pub async fn with_toml(toml_content: &str) -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let path = dir.path().join("herdctl.toml");
        tokio::fs::write(&path, toml_content)
            .await
            .expect("failed to write test config");
        Self { path, _dir: dir }
    }

    /// A path inside a fresh temp directory where no file exists.
    pub fn missing() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let path = dir.path().join("absent.toml");
        Self { path, _dir: dir }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the file with new content.
    pub async fn write(&self, toml_content: &str) {
        tokio::fs::write(&self.path, toml_content)
            .await
            .expect("failed to write updated config");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_produces_valid_config() {
        let config = TestConfigBuilder::new()
            .base_url("http://127.0.0.1:9")
            .start_commands(&[&["true"]])
            .stop_commands(&[&["false"], &["true"]])
            .timeout_policy("continue")
            .instant_lifecycle()
            .build();
        config.validate().unwrap();
        assert_eq!(config.lifecycle.stop_commands.len(), 2);
        assert_eq!(config.lifecycle.start_settle_secs, 0);
    }

    #[tokio::test]
    async fn test_temp_config_file_round_trip() {
        let file = TempConfigFile::with_toml("[monitor]\ninterval_secs = 7\n").await;
        let config = AppConfig::load(file.path()).await.unwrap();
        assert_eq!(config.monitor.interval_secs, 7);
    }
}
