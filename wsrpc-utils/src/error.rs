//! Error types for wsrpc
//!
//! Provides a unified error type used across all wsrpc crates.

use std::path::PathBuf;

/// Main error type for wsrpc operations
#[derive(Debug, thiserror::Error)]
pub enum WsrpcError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Connection Errors ===

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    #[error("Not connected, cannot send '{method}'")]
    NotConnected { method: String },

    // === Call Errors ===

    #[error("Call {id} timed out after {millis}ms")]
    Timeout { id: u64, millis: u64 },

    #[error("Remote error: {0}")]
    Remote(serde_json::Value),

    // === Protocol Errors ===

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WsrpcError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a not-connected error for a call to `method`
    pub fn not_connected(method: impl Into<String>) -> Self {
        Self::NotConnected {
            method: method.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error is retryable
    ///
    /// Everything that stems from connectivity is; a server-reported error
    /// or a malformed request is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Connection(_)
                | Self::ConnectionClosed
                | Self::NotConnected { .. }
        )
    }

    /// Check if this error is a call timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The server-supplied error payload, if this is a remote error
    pub fn remote_payload(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Remote(payload) => Some(payload),
            _ => None,
        }
    }
}

/// Result type alias using WsrpcError
pub type Result<T> = std::result::Result<T, WsrpcError>;
