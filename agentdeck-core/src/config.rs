//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/agentdeck/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/agentdeck/` (~/.config/agentdeck/)
//! - State/Logs: `$XDG_STATE_HOME/agentdeck/` (~/.local/state/agentdeck/)

use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name prefix of the daily-rotated log
pub const LOG_FILE_PREFIX: &str = "agentdeck.log";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Dashboard server endpoints
    #[serde(default)]
    pub server: ServerConfig,

    /// Live stream reconnection policy
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// In-memory store capacities
    #[serde(default)]
    pub stores: StoreConfig,

    /// Agent liveness heuristics
    #[serde(default)]
    pub liveness: LivenessConfig,

    /// Historical fetch sizes
    #[serde(default)]
    pub history: HistoryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Dashboard server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// REST base URL (e.g., `http://localhost:8000`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// WebSocket URL; derived from `base_url` when unset
    pub ws_url: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Max retry attempts for transient read failures
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ws_url: None,
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl ServerConfig {
    /// Returns the live stream URL.
    ///
    /// `http://host` becomes `ws://host/api/agents/ws`, `https` becomes `wss`.
    pub fn stream_url(&self) -> String {
        if let Some(url) = &self.ws_url {
            return url.clone();
        }
        let base = self.base_url.trim_end_matches('/');
        let swapped = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}/api/agents/ws", swapped)
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> usize {
    3
}

/// Reconnection backoff configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionConfig {
    /// First reconnect delay in milliseconds
    #[serde(default = "default_reconnect_base")]
    pub reconnect_base_ms: u64,

    /// Upper bound on the reconnect delay in milliseconds
    #[serde(default = "default_reconnect_max")]
    pub reconnect_max_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_base_ms: default_reconnect_base(),
            reconnect_max_ms: default_reconnect_max(),
        }
    }
}

impl ConnectionConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }
}

fn default_reconnect_base() -> u64 {
    1000
}

fn default_reconnect_max() -> u64 {
    30000
}

/// Store capacities
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// Activity feed capacity
    #[serde(default = "default_max_activities")]
    pub max_activities: usize,

    /// Tool-event history kept per session
    #[serde(default = "default_max_events_per_session")]
    pub max_events_per_session: usize,

    /// Thought ring buffer capacity
    #[serde(default = "default_max_thoughts")]
    pub max_thoughts: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_activities: default_max_activities(),
            max_events_per_session: default_max_events_per_session(),
            max_thoughts: default_max_thoughts(),
        }
    }
}

fn default_max_activities() -> usize {
    500
}

fn default_max_events_per_session() -> usize {
    100
}

fn default_max_thoughts() -> usize {
    50
}

/// Liveness configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LivenessConfig {
    /// Seconds after a tool use during which an agent counts as working
    #[serde(default = "default_activity_timeout")]
    pub activity_timeout_secs: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            activity_timeout_secs: default_activity_timeout(),
        }
    }
}

impl LivenessConfig {
    pub fn activity_timeout(&self) -> Duration {
        Duration::from_secs(self.activity_timeout_secs)
    }
}

fn default_activity_timeout() -> u64 {
    30
}

/// Historical fetch configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    /// Messages per REST page
    #[serde(default = "default_message_page_size")]
    pub message_page_size: usize,

    /// Persisted thoughts fetched per refresh
    #[serde(default = "default_thought_limit")]
    pub thought_limit: usize,

    /// Agent events fetched to backfill the activity feed
    #[serde(default = "default_event_backfill_limit")]
    pub event_backfill_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            message_page_size: default_message_page_size(),
            thought_limit: default_thought_limit(),
            event_backfill_limit: default_event_backfill_limit(),
        }
    }
}

fn default_message_page_size() -> usize {
    50
}

fn default_thought_limit() -> usize {
    200
}

fn default_event_backfill_limit() -> usize {
    100
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        let base = &self.server.base_url;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(Error::Config(format!(
                "server.base_url must be http(s), got {}",
                base
            )));
        }
        let ws = self.server.stream_url();
        if !(ws.starts_with("ws://") || ws.starts_with("wss://")) {
            return Err(Error::Config(format!(
                "server.ws_url must be ws(s), got {}",
                ws
            )));
        }
        if self.connection.reconnect_base_ms == 0 {
            return Err(Error::Config(
                "connection.reconnect_base_ms must be positive".to_string(),
            ));
        }
        if self.connection.reconnect_base_ms > self.connection.reconnect_max_ms {
            return Err(Error::Config(
                "connection.reconnect_base_ms must not exceed reconnect_max_ms".to_string(),
            ));
        }
        if self.stores.max_activities == 0
            || self.stores.max_events_per_session == 0
            || self.stores.max_thoughts == 0
        {
            return Err(Error::Config(
                "store capacities must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/agentdeck/config.toml` (~/.config/agentdeck/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("agentdeck").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/agentdeck/` (~/.local/state/agentdeck/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("agentdeck")
    }

    /// Returns the log file written on `date` (UTC)
    ///
    /// Logs rotate daily: `$XDG_STATE_HOME/agentdeck/agentdeck.log.YYYY-MM-DD`
    pub fn log_path(date: NaiveDate) -> PathBuf {
        Self::state_dir().join(format!("{}.{}", LOG_FILE_PREFIX, date.format("%Y-%m-%d")))
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.base_url, "http://localhost:8000");
        assert_eq!(config.connection.reconnect_base_ms, 1000);
        assert_eq!(config.connection.reconnect_max_ms, 30000);
        assert_eq!(config.stores.max_activities, 500);
        assert_eq!(config.stores.max_events_per_session, 100);
        assert_eq!(config.stores.max_thoughts, 50);
        assert_eq!(config.liveness.activity_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
base_url = "https://deck.example.com/"
timeout_secs = 10

[connection]
reconnect_base_ms = 250
reconnect_max_ms = 4000

[stores]
max_thoughts = 20

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.server.timeout_secs, 10);
        assert_eq!(config.connection.base_delay(), Duration::from_millis(250));
        assert_eq!(config.connection.max_delay(), Duration::from_secs(4));
        assert_eq!(config.stores.max_thoughts, 20);
        assert_eq!(config.stores.max_activities, 500);
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_stream_url_derivation() {
        let mut server = ServerConfig::default();
        assert_eq!(server.stream_url(), "ws://localhost:8000/api/agents/ws");

        server.base_url = "https://deck.example.com/".to_string();
        assert_eq!(server.stream_url(), "wss://deck.example.com/api/agents/ws");

        server.ws_url = Some("ws://10.0.0.2:9000/stream".to_string());
        assert_eq!(server.stream_url(), "ws://10.0.0.2:9000/stream");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.server.base_url = "ftp://nope".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.connection.reconnect_base_ms = 60_000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.stores.max_thoughts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[liveness]\nactivity_timeout_secs = 12\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.liveness.activity_timeout_secs, 12);

        std::fs::write(&path, "[server\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
