//! Shared protocol types: call identifiers and JSON-RPC error objects

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier correlating a request with its eventual response
pub type CallId = u64;

/// Standard JSON-RPC 2.0 error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid JSON was received by the server
    ParseError,
    /// The JSON sent is not a valid Request object
    InvalidRequest,
    /// The method does not exist / is not available
    MethodNotFound,
    /// Invalid method parameter(s)
    InvalidParams,
    /// Internal JSON-RPC error
    InternalError,
    /// Implementation-defined server error (-32000 to -32099)
    ServerError(i64),
}

impl ErrorCode {
    /// Map a numeric code onto a known JSON-RPC error code
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -32700 => Some(Self::ParseError),
            -32600 => Some(Self::InvalidRequest),
            -32601 => Some(Self::MethodNotFound),
            -32602 => Some(Self::InvalidParams),
            -32603 => Some(Self::InternalError),
            -32099..=-32000 => Some(Self::ServerError(code)),
            _ => None,
        }
    }

    /// Numeric value of this code
    pub fn code(self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
            Self::ServerError(code) => code,
        }
    }

    /// Canonical message for this code
    pub fn message(self) -> &'static str {
        match self {
            Self::ParseError => "Parse error",
            Self::InvalidRequest => "Invalid Request",
            Self::MethodNotFound => "Method not found",
            Self::InvalidParams => "Invalid params",
            Self::InternalError => "Internal error",
            Self::ServerError(_) => "Server error",
        }
    }
}

/// Error payload of a reply, kept verbatim
///
/// Servers are not forced into the `{code, message, data}` shape; a bare
/// string or any other JSON value is preserved as-is and the accessors
/// simply return `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RpcError(Value);

impl RpcError {
    pub fn new(payload: Value) -> Self {
        Self(payload)
    }

    /// The payload exactly as the server sent it
    pub fn payload(&self) -> &Value {
        &self.0
    }

    pub fn into_payload(self) -> Value {
        self.0
    }

    /// Numeric `code` member, if present
    pub fn code(&self) -> Option<i64> {
        self.0.get("code").and_then(Value::as_i64)
    }

    /// `message` member, or the payload itself when it is a bare string
    pub fn message(&self) -> Option<&str> {
        match &self.0 {
            Value::String(s) => Some(s),
            other => other.get("message").and_then(Value::as_str),
        }
    }

    /// `data` member, if present
    pub fn data(&self) -> Option<&Value> {
        self.0.get("data")
    }

    /// Standard error code classification
    pub fn kind(&self) -> Option<ErrorCode> {
        self.code().and_then(ErrorCode::from_code)
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code(), self.message()) {
            (Some(code), Some(message)) => write!(f, "{} ({})", message, code),
            (None, Some(message)) => write!(f, "{}", message),
            _ => write!(f, "{}", self.0),
        }
    }
}

impl std::error::Error for RpcError {}
