//! Configuration schema for rally

use crate::error::{RallyError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main rally configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RallyConfig {
    /// Backend service configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Visitor identity configuration
    #[serde(default)]
    pub identity: IdentityConfig,

    /// HTTP client configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Realtime channel configuration
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Feed sizes
    #[serde(default)]
    pub feeds: FeedConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project URL, e.g. `https://xyz.supabase.co` (supports `${VAR}`)
    pub url: String,

    /// Anonymous API key (supports `${VAR}`)
    pub anon_key: Option<String>,

    /// Database schema the tables live in
    #[serde(default = "default_schema")]
    pub schema: String,
}

fn default_schema() -> String {
    "public".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            anon_key: None,
            schema: default_schema(),
        }
    }
}

/// Visitor identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Local storage file (relative to ~/.rally or absolute)
    pub storage_path: String,

    /// Key the visitor id is stored under
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
}

fn default_storage_key() -> String {
    crate::identity::IDENTITY_KEY.to_string()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            storage_path: "storage.json".to_string(),
            storage_key: default_storage_key(),
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum retries for reads (inserts are never retried)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial delay between read retries in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Backoff multiplier for retry delays
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f32,

    /// User agent sent with every request
    pub user_agent: Option<String>,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_backoff_multiplier() -> f32 {
    2.0
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            user_agent: None,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Reject a backoff multiplier that can't scale a delay
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(RallyError::Config(format!(
                "http.backoff_multiplier must be a number >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }
}

/// Realtime channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Heartbeat interval in seconds
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Seconds to wait for the socket handshake
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_heartbeat_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Feed sizes used by the message wall and the experience board
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_message_limit")]
    pub message_limit: usize,

    #[serde(default = "default_experience_limit")]
    pub experience_limit: usize,
}

fn default_message_limit() -> usize {
    50
}

fn default_experience_limit() -> usize {
    20
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            message_limit: default_message_limit(),
            experience_limit: default_experience_limit(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,

    /// Log format: "compact", "pretty", "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl RallyConfig {
    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: RallyConfig) {
        // serde fills in defaults for missing fields
        self.backend = other.backend;
        self.identity = other.identity;
        self.http = other.http;
        self.realtime = other.realtime;
        self.feeds = other.feeds;
        self.logging = other.logging;
    }

    /// Resolve `${VAR_NAME}` references in the backend settings
    pub fn resolve_env_vars(&mut self) {
        self.backend.url = Self::expand_env_var(&self.backend.url);

        if let Some(ref anon_key) = self.backend.anon_key {
            self.backend.anon_key = Some(Self::expand_env_var(anon_key));
        }
    }

    /// Apply `RALLY_URL` / `RALLY_ANON_KEY` overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("RALLY_URL") {
            self.backend.url = url;
        }
        if let Ok(key) = std::env::var("RALLY_ANON_KEY") {
            self.backend.anon_key = Some(key);
        }
    }

    fn expand_env_var(value: &str) -> String {
        if value.starts_with("${") && value.ends_with('}') {
            let var_name = &value[2..value.len() - 1];
            std::env::var(var_name).unwrap_or_else(|_| value.to_string())
        } else {
            value.to_string()
        }
    }

    /// Get the resolved identity storage path
    ///
    /// Relative paths resolve against ~/.rally; `None` when there is no home
    /// directory to resolve against.
    pub fn storage_path(&self) -> Option<PathBuf> {
        let path = PathBuf::from(&self.identity.storage_path);

        if path.is_absolute() {
            Some(path)
        } else {
            dirs::home_dir().map(|home| home.join(".rally").join(path))
        }
    }
}
