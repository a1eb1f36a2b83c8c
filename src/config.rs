use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::v2board::ApiConfig;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// V2Board API configuration
    #[serde(flatten)]
    pub api: ApiConfig,

    /// Poll and report cadence
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    /// Load config from TOML file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("cannot parse config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Seconds between node config / user list pulls (default: 60)
    #[serde(default = "default_interval")]
    pub pull_interval: u64,

    /// Seconds between online user / traffic reports (default: 60)
    #[serde(default = "default_interval")]
    pub push_interval: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            pull_interval: default_interval(),
            push_interval: default_interval(),
        }
    }
}

impl SyncConfig {
    /// Get pull interval as Duration
    pub fn pull_interval_duration(&self) -> Duration {
        Duration::from_secs(self.pull_interval.max(1))
    }

    /// Get push interval as Duration
    pub fn push_interval_duration(&self) -> Duration {
        Duration::from_secs(self.push_interval.max(1))
    }
}

fn default_interval() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r#"
            api_host = "https://panel.example.com"
            node_id = 3
            key = "abcdef"
            node_type = "V2ray"
            enable_vless = true
            vless_flow = "xtls-rprx-vision"
            speed_limit = 12.5
            device_limit = 4
            timeout = 10
            rule_list_path = "/etc/panel-sync/rulelist"

            [sync]
            pull_interval = 30
            push_interval = 90
            "#,
        )
        .unwrap();

        assert_eq!(config.api.api_host, "https://panel.example.com");
        assert_eq!(config.api.node_id, 3);
        assert_eq!(config.api.node_type, "V2ray");
        assert!(config.api.enable_vless);
        assert_eq!(config.api.speed_limit, 12.5);
        assert_eq!(config.api.device_limit, 4);
        assert_eq!(config.api.timeout, 10);
        assert_eq!(config.api.rule_list_path, Some(PathBuf::from("/etc/panel-sync/rulelist")));
        assert_eq!(config.sync.pull_interval_duration(), Duration::from_secs(30));
        assert_eq!(config.sync.push_interval_duration(), Duration::from_secs(90));
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = Config::from_toml(
            r#"
            api_host = "http://127.0.0.1"
            node_id = 1
            key = "k"
            node_type = "Trojan"
            "#,
        )
        .unwrap();

        assert!(!config.api.enable_vless);
        assert_eq!(config.api.vless_flow, "");
        assert_eq!(config.api.speed_limit, 0.0);
        assert_eq!(config.api.device_limit, 0);
        assert_eq!(config.api.timeout, 0);
        assert!(config.api.rule_list_path.is_none());
        assert_eq!(config.sync.pull_interval, 60);
        assert_eq!(config.sync.push_interval, 60);
    }

    #[test]
    fn test_missing_key_is_error() {
        let err = Config::from_toml(
            r#"
            api_host = "http://127.0.0.1"
            node_id = 1
            node_type = "Trojan"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("key"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load_from_file("/nonexistent/panel-sync.toml").unwrap_err();
        assert!(err.to_string().contains("cannot read config file"));
    }
}
