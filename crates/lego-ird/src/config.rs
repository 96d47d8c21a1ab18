//! Daemon configuration file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lego_ir_controller::ControllerConfig;
use serde::{Deserialize, Serialize};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "legoird.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub controller: ControllerConfig,
    pub logging: LoggingConfig,
    /// Feed every transmission back into the decoder.
    pub loopback_rx: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            logging: LoggingConfig::default(),
            loopback_rx: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    Defaults,
}

impl DaemonConfig {
    /// Loads `path`, falling back to defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_or_default(path: &Path) -> Result<(Self, ConfigOrigin)> {
        if !tokio::fs::try_exists(path)
            .await
            .with_context(|| format!("Failed to stat config file: {}", path.display()))?
        {
            return Ok((Self::default(), ConfigOrigin::Defaults));
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok((config, ConfigOrigin::File(path.to_path_buf())))
    }

    /// # Errors
    ///
    /// Returns an error if the controller section is invalid.
    pub fn validate(&self) -> Result<()> {
        self.controller
            .validate()
            .context("Invalid controller configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() -> TestResult {
        let dir = tempfile::tempdir()?;
        let (config, origin) = DaemonConfig::load_or_default(&dir.path().join("absent.json")).await?;
        assert_eq!(config, DaemonConfig::default());
        assert_eq!(origin, ConfigOrigin::Defaults);
        assert!(config.loopback_rx);
        Ok(())
    }

    #[tokio::test]
    async fn test_partial_file_is_merged_with_defaults() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("legoird.json");
        tokio::fs::write(
            &path,
            r#"{ "controller": { "default_channel": 3 }, "logging": { "json": true } }"#,
        )
        .await?;

        let (config, origin) = DaemonConfig::load_or_default(&path).await?;
        assert_eq!(origin, ConfigOrigin::File(path));
        assert_eq!(config.controller.default_channel, 3);
        assert_eq!(config.controller.queue_capacity, 128);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("legoird.json");
        tokio::fs::write(&path, "{ not json").await?;

        let err = DaemonConfig::load_or_default(&path)
            .await
            .err()
            .ok_or("malformed config accepted")?;
        assert!(err.to_string().starts_with("Failed to parse config file"));
        Ok(())
    }

    #[test]
    fn test_validate_reports_controller_errors() {
        let mut config = DaemonConfig::default();
        config.controller.queue_capacity = 0;
        assert!(config.validate().is_err());
    }
}
