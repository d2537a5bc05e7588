//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::relay::DEFAULT_REQUEST_TIMEOUT;
use crate::watcher::{default_log_dir, DEFAULT_LOG_PREFIX, DEFAULT_POLL_INTERVAL};

use super::ConfigError;

/// Name shown as the webhook author.
pub const DEFAULT_DISPLAY_NAME: &str = "Fleet Chat Relay";

/// Avatar shown next to relayed messages.
pub const DEFAULT_AVATAR_URL: &str = "https://i.imgur.com/a5sNnRi.gif";

/// What a session does with each new log line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierMode {
    /// Forward every non-empty line to the webhook.
    #[default]
    Relay,
    /// Count `x` / `xN` / `Nx` replies and reset on `-`.
    Count,
}

/// Where the relative timestamp tag takes its time from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    /// Current wall-clock time when the line is relayed.
    #[default]
    WallClock,
    /// The line's own `[ YYYY.MM.DD HH:MM:SS ]` stamp, falling back to wall-clock.
    LogLine,
}

/// Settings for webhook delivery, snapshotted when a session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub webhook_endpoint: String,
    pub include_timestamps: bool,
    pub display_name: String,
    pub avatar_url: String,
    /// Overall deadline for one webhook request.
    pub request_timeout: Duration,
}

impl RelayConfig {
    /// Parse and check the webhook endpoint.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEndpoint` unless the endpoint is an
    /// absolute `http` or `https` URL.
    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidEndpoint {
            endpoint: self.webhook_endpoint.clone(),
            reason,
        };
        if self.webhook_endpoint.trim().is_empty() {
            return Err(invalid("webhook endpoint is not set".to_string()));
        }
        let url = Url::parse(self.webhook_endpoint.trim()).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(invalid(format!("unsupported scheme '{other}'"))),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        AppConfig::default().relay_config()
    }
}

/// The persisted configuration document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Discord webhook URL.
    #[serde(alias = "webhookEndpoint")]
    pub webhook_endpoint: String,
    /// Prefix relayed lines with a relative timestamp tag.
    #[serde(alias = "includeTimestamps")]
    pub include_timestamps: bool,
    /// Webhook author name.
    pub display_name: String,
    /// Webhook author avatar.
    pub avatar_url: String,
    /// Relay or counting behaviour.
    pub mode: ClassifierMode,
    /// Time source for the timestamp tag.
    pub timestamp_source: TimestampSource,
    /// Optional ceiling on a single counting increment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increment_cap: Option<u32>,
    /// Chat log directory override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    /// File name prefix of candidate logs.
    pub log_prefix: String,
    /// Tail poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Webhook request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            webhook_endpoint: String::new(),
            include_timestamps: true,
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            avatar_url: DEFAULT_AVATAR_URL.to_string(),
            mode: ClassifierMode::default(),
            timestamp_source: TimestampSource::default(),
            increment_cap: None,
            log_dir: None,
            log_prefix: DEFAULT_LOG_PREFIX.to_string(),
            poll_interval_ms: u64::try_from(DEFAULT_POLL_INTERVAL.as_millis()).unwrap_or(u64::MAX),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

impl AppConfig {
    /// Snapshot the webhook settings.
    #[must_use]
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            webhook_endpoint: self.webhook_endpoint.clone(),
            include_timestamps: self.include_timestamps,
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
            request_timeout: self.request_timeout(),
        }
    }

    /// Tail poll interval, never below one millisecond.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Webhook request timeout, never below one second.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// The configured log directory, or the platform default.
    #[must_use]
    pub fn resolved_log_dir(&self) -> Option<PathBuf> {
        self.log_dir.clone().or_else(default_log_dir)
    }
}

/// Command-line settings layered over the loaded document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub mode: Option<ClassifierMode>,
    pub log_dir: Option<PathBuf>,
    pub include_timestamps: Option<bool>,
}

impl ConfigOverrides {
    /// Overwrite the fields that are set.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(dir) = &self.log_dir {
            config.log_dir = Some(dir.clone());
        }
        if let Some(include) = self.include_timestamps {
            config.include_timestamps = include;
        }
    }
}
