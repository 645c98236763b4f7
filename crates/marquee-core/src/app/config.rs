//! ClientConfig - 接続先と動作モードの設定
//!
//! 環境変数または TOML から読み込む。未指定の項目はデフォルトで埋める。

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::notification::DEFAULT_FEED_CAPACITY;

pub const ENV_ENVIRONMENT: &str = "MARQUEE_ENV";
pub const ENV_ORIGIN: &str = "MARQUEE_ORIGIN";
pub const ENV_API_URL: &str = "MARQUEE_API_URL";
pub const ENV_CONCURRENCY: &str = "MARQUEE_CONCURRENCY";
pub const ENV_POLL_INTERVAL_MS: &str = "MARQUEE_POLL_INTERVAL_MS";

const PRODUCTION_API_PATH: &str = "/api";
const DEFAULT_DEV_API_URL: &str = "http://localhost:3001/api";
const DEFAULT_TOAST_CAPACITY: usize = 5;
const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("production requires MARQUEE_ORIGIN or `origin` in the config file")]
    MissingOrigin,

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Production,
    #[default]
    Development,
}

/// Which terminal event wins when two dispatches for the same key overlap.
///
/// - LastTerminalWins: すべての終端イベントを完了順に適用する（デフォルト）
/// - LatestDispatchWins: 新しい dispatch に追い越された古い dispatch の終端は捨てる
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConcurrencyMode {
    #[default]
    LastTerminalWins,
    LatestDispatchWins,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub environment: Environment,

    /// Same-origin host used in production, e.g. `https://console.example.com`.
    pub origin: Option<String>,

    /// Explicit API base URL (non-production only).
    pub api_url: Option<String>,

    pub concurrency_mode: ConcurrencyMode,
    pub notification_capacity: usize,
    pub toast_capacity: usize,
    pub poll_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            origin: None,
            api_url: None,
            concurrency_mode: ConcurrencyMode::LastTerminalWins,
            notification_capacity: DEFAULT_FEED_CAPACITY,
            toast_capacity: DEFAULT_TOAST_CAPACITY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Testable form of `from_env`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = non_empty(lookup(ENV_ENVIRONMENT)) {
            config.environment = match value.to_ascii_lowercase().as_str() {
                "production" | "prod" => Environment::Production,
                "development" | "dev" => Environment::Development,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_ENVIRONMENT,
                        value,
                    });
                }
            };
        }
        config.origin = non_empty(lookup(ENV_ORIGIN));
        config.api_url = non_empty(lookup(ENV_API_URL));

        if let Some(value) = non_empty(lookup(ENV_CONCURRENCY)) {
            config.concurrency_mode = match value.as_str() {
                "last-terminal" | "last-terminal-wins" => ConcurrencyMode::LastTerminalWins,
                "latest-dispatch" | "latest-dispatch-wins" => ConcurrencyMode::LatestDispatchWins,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_CONCURRENCY,
                        value,
                    });
                }
            };
        }

        if let Some(value) = non_empty(lookup(ENV_POLL_INTERVAL_MS)) {
            config.poll_interval_ms =
                value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: ENV_POLL_INTERVAL_MS,
                        value: value.clone(),
                    })?;
        }

        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Base URL resolution order: production same-origin `/api`, else the
    /// explicit override, else the local development default.
    ///
    /// Production has no page origin to resolve a relative `/api` against,
    /// so the origin must be configured.
    pub fn base_url(&self) -> Result<String, ConfigError> {
        if self.environment == Environment::Production {
            let origin = self.origin.as_deref().ok_or(ConfigError::MissingOrigin)?;
            return Ok(format!("{}{}", origin.trim_end_matches('/'), PRODUCTION_API_PATH));
        }
        Ok(match &self.api_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => DEFAULT_DEV_API_URL.to_string(),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
