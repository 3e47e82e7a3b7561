//! Client configuration
//!
//! Loaded from `<config_dir>/wsrpc/config.toml`. Every field is optional in
//! the file; missing ones take their defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use wsrpc_protocol::MAX_FRAME_LEN;
use wsrpc_utils::{paths, Result, WsrpcError};

use crate::connection::Endpoint;

/// Default endpoint when none is configured
pub const DEFAULT_ENDPOINT: &str = "ws://localhost/ws";

/// Longest accepted timeout, reconnect delay or poll interval (24h)
pub const MAX_DELAY_MS: u64 = 24 * 60 * 60 * 1000;

/// Client settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// `ws://host/path` or `tcp://host:port`
    pub endpoint: String,
    /// How long a call may wait for its reply
    pub call_timeout_ms: u64,
    /// Delay between a close and the next connect attempt
    pub reconnect_delay_ms: u64,
    /// Connection state poll interval
    pub poll_interval_ms: u64,
    /// Largest frame accepted or sent
    pub max_frame_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            call_timeout_ms: 500,
            reconnect_delay_ms: 1000,
            poll_interval_ms: 100,
            max_frame_len: MAX_FRAME_LEN,
        }
    }
}

impl ClientConfig {
    /// Defaults with the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Parse from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| WsrpcError::config(e.to_string()))
    }

    /// Load from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(WsrpcError::ConfigNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| WsrpcError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| WsrpcError::ConfigInvalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load from the default location
    ///
    /// Returns defaults if the file doesn't exist or can't be parsed.
    pub fn load_or_default() -> Self {
        let path = paths::config_file();

        if !path.exists() {
            tracing::debug!("Config file not found, using defaults");
            return Self::default();
        }

        match Self::load(&path) {
            Ok(config) => {
                tracing::debug!(
                    "Loaded config: endpoint={}, call_timeout={}ms, reconnect_delay={}ms",
                    config.endpoint,
                    config.call_timeout_ms,
                    config.reconnect_delay_ms
                );
                config
            }
            Err(e) => {
                tracing::warn!("Failed to load config file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Check the settings are usable
    pub fn validate(&self) -> Result<()> {
        Endpoint::parse(&self.endpoint)?;
        self.validate_timing()
    }

    /// Check every setting except the endpoint
    ///
    /// Used when a custom connector decides how to reach the server.
    pub fn validate_timing(&self) -> Result<()> {
        if self.call_timeout_ms == 0 {
            return Err(WsrpcError::config("call_timeout_ms must be greater than 0"));
        }

        if self.reconnect_delay_ms == 0 {
            return Err(WsrpcError::config("reconnect_delay_ms must be greater than 0"));
        }

        if self.poll_interval_ms == 0 {
            return Err(WsrpcError::config("poll_interval_ms must be greater than 0"));
        }

        for (name, value) in [
            ("call_timeout_ms", self.call_timeout_ms),
            ("reconnect_delay_ms", self.reconnect_delay_ms),
            ("poll_interval_ms", self.poll_interval_ms),
        ] {
            if value > MAX_DELAY_MS {
                return Err(WsrpcError::config(format!(
                    "{} ({}) exceeds the maximum of {}",
                    name, value, MAX_DELAY_MS
                )));
            }
        }

        if self.call_timeout_ms >= self.reconnect_delay_ms {
            return Err(WsrpcError::config(format!(
                "call_timeout_ms ({}) must be shorter than reconnect_delay_ms ({})",
                self.call_timeout_ms, self.reconnect_delay_ms
            )));
        }

        if self.max_frame_len == 0 {
            return Err(WsrpcError::config("max_frame_len must be greater than 0"));
        }

        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint, "ws://localhost/ws");
        assert_eq!(config.call_timeout(), Duration::from_millis(500));
        assert_eq!(config.reconnect_delay(), Duration::from_secs(1));
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.max_frame_len, 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_new_keeps_other_defaults() {
        let config = ClientConfig::new("tcp://10.0.0.2:9000");
        assert_eq!(config.endpoint, "tcp://10.0.0.2:9000");
        assert_eq!(config.call_timeout_ms, 500);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
            endpoint = "ws://192.168.4.1/ws"
            call_timeout_ms = 250
        "#;
        let config = ClientConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.endpoint, "ws://192.168.4.1/ws");
        assert_eq!(config.call_timeout_ms, 250);
        // Defaults for unspecified
        assert_eq!(config.reconnect_delay_ms, 1000);
    }

    #[test]
    fn test_parse_invalid_toml() {
        let err = ClientConfig::from_toml_str("call_timeout_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, WsrpcError::Config(_)));
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        assert!(ClientConfig::new("").validate().is_err());
        assert!(ClientConfig::new("http://device/ws").validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_durations() {
        let mut config = ClientConfig::default();
        config.call_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.poll_interval_ms = 0;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::default();
        config.reconnect_delay_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_timeout_shorter_than_reconnect() {
        let mut config = ClientConfig::default();
        config.call_timeout_ms = 1000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must be shorter"));

        config.call_timeout_ms = 999;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_huge_durations() {
        let mut config = ClientConfig::default();
        config.call_timeout_ms = 100_000_000_000;
        config.reconnect_delay_ms = 200_000_000_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("call_timeout_ms"));

        let mut config = ClientConfig::default();
        config.poll_interval_ms = u64::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_maximum_delay() {
        let mut config = ClientConfig::default();
        config.call_timeout_ms = MAX_DELAY_MS - 1;
        config.reconnect_delay_ms = MAX_DELAY_MS;
        assert!(config.validate().is_ok());

        config.reconnect_delay_ms = MAX_DELAY_MS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_timing_ignores_endpoint() {
        let config = ClientConfig::new("not a url");
        assert!(config.validate().is_err());
        assert!(config.validate_timing().is_ok());

        let mut config = ClientConfig::new("not a url");
        config.poll_interval_ms = 0;
        assert!(config.validate_timing().is_err());
    }

    // ==================== Loading Tests ====================

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "endpoint = \"tcp://127.0.0.1:4000\"\n").unwrap();

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.endpoint, "tcp://127.0.0.1:4000");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = ClientConfig::load(&path).unwrap_err();
        assert!(matches!(err, WsrpcError::ConfigNotFound(p) if p == path));
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is not toml = = =").unwrap();

        let err = ClientConfig::load(&path).unwrap_err();
        assert!(matches!(err, WsrpcError::ConfigInvalid { .. }));
    }
}
