//! Configuration loading and validation
//!
//! Handles:
//! - Status server address, timeouts and pacing delays
//! - Webhook endpoint and message templates
//! - Scheduled restart window

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::codec::ServerList;

/// Default scheduled restart window (3 days)
const DEFAULT_RESTART_AFTER_HOURS: u64 = 72;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub agent: AgentSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub timeout_ms: u64,
    pub connection_delay_ms: u64,
    pub ping_delay_ms: u64,
    /// Number of sub-servers sent without a count byte by older peers
    pub server_count: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub endpoint: String,
    pub timeout_ms: u64,
    pub online: String,
    pub offline: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    pub restart_after_hours: u64,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            restart_after_hours: DEFAULT_RESTART_AFTER_HOURS,
        }
    }
}

impl Config {
    /// Config file path: `$OIOTUNG_CONFIG` or `oiotung.toml`
    pub fn default_path() -> PathBuf {
        std::env::var_os("OIOTUNG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("oiotung.toml"))
    }

    /// Load and validate config from disk
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "server.host",
                reason: "must not be empty".into(),
            });
        }
        if self.server.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "server.timeout_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.webhook.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "webhook.timeout_ms",
                reason: "must be greater than zero".into(),
            });
        }
        let endpoint = Url::parse(&self.webhook.endpoint).map_err(|e| ConfigError::Invalid {
            key: "webhook.endpoint",
            reason: e.to_string(),
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                key: "webhook.endpoint",
                reason: format!("unsupported scheme {}", endpoint.scheme()),
            });
        }
        Ok(())
    }

    pub fn server_timeout(&self) -> Duration {
        Duration::from_millis(self.server.timeout_ms)
    }

    pub fn connection_delay(&self) -> Duration {
        Duration::from_millis(self.server.connection_delay_ms)
    }

    pub fn ping_delay(&self) -> Duration {
        Duration::from_millis(self.server.ping_delay_ms)
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_millis(self.webhook.timeout_ms)
    }

    pub fn restart_after(&self) -> Duration {
        Duration::from_secs(self.agent.restart_after_hours.saturating_mul(3600))
    }

    pub fn server_list(&self) -> ServerList {
        match self.server.server_count {
            Some(count) => ServerList::Fixed(count),
            None => ServerList::Counted,
        }
    }
}

#[cfg(test)]
impl Config {
    /// Fast-paced config pointing at local test doubles
    pub(crate) fn for_test(status: std::net::SocketAddr, endpoint: impl Into<String>) -> Self {
        Self {
            server: ServerConfig {
                host: status.ip().to_string(),
                port: status.port(),
                timeout_ms: 2000,
                connection_delay_ms: 10,
                ping_delay_ms: 10,
                server_count: None,
            },
            webhook: WebhookConfig {
                endpoint: endpoint.into(),
                timeout_ms: 2000,
                online: r#"{"content":"%[online]%/%[max]% %[flash]%"}"#.into(),
                offline: r#"{"content":"offline %[flash]%"}"#.into(),
            },
            agent: AgentSection::default(),
        }
    }
}
