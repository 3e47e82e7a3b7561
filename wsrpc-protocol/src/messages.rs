//! Request and response envelopes
//!
//! Outbound traffic is always a [`Request`]. Inbound traffic is classified
//! into an [`Inbound`] value: either a [`Reply`] that carries a usable call
//! identifier, or [`AsyncData`] pushed by the server on its own.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::ProtocolError;
use crate::types::{CallId, RpcError};

/// Protocol version string carried by every request
pub const JSONRPC_VERSION: &str = "2.0";

/// Outbound JSON-RPC request envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    pub id: CallId,
}

impl Request {
    /// Build a request, rejecting an empty method name
    pub fn new(id: CallId, method: impl Into<String>, params: Option<Value>) -> Result<Self, ProtocolError> {
        let method = method.into();
        if method.trim().is_empty() {
            return Err(ProtocolError::EmptyMethod);
        }

        Ok(Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method,
            params,
            id,
        })
    }
}

/// Inbound JSON object that carries a call identifier
///
/// Whether it actually answers an outstanding call is for the caller to
/// decide; an unmatched reply is handed back out with
/// [`Reply::into_message`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    id: CallId,
    body: Map<String, Value>,
}

impl Reply {
    pub fn id(&self) -> CallId {
        self.id
    }

    /// Resolve the reply into its result or error
    ///
    /// A non-null `error` member wins over `result`. A missing `result` is
    /// reported as `null`.
    pub fn into_outcome(mut self) -> Result<Value, RpcError> {
        match self.body.remove("error") {
            Some(error) if !error.is_null() => Err(RpcError::new(error)),
            _ => Ok(self.body.remove("result").unwrap_or(Value::Null)),
        }
    }

    /// The parsed object, unchanged
    pub fn into_message(self) -> Value {
        Value::Object(self.body)
    }
}

/// Payload not correlated to any outstanding call
#[derive(Debug, Clone, PartialEq)]
pub enum AsyncData {
    /// Valid JSON without a usable `id`, or whose `id` matched nothing
    Json(Value),
    /// Payload that is not JSON at all
    Raw(String),
}

impl AsyncData {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Raw(_) => None,
        }
    }
}

/// Classified inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Reply(Reply),
    Unsolicited(AsyncData),
}

impl Inbound {
    /// Classify a text payload
    ///
    /// Never fails: anything that is not a JSON object with a usable `id`
    /// (see [`call_id`]) ends up as [`AsyncData`].
    pub fn classify(text: &str) -> Self {
        let value: Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(_) => return Self::Unsolicited(AsyncData::Raw(text.to_string())),
        };

        match value {
            Value::Object(body) => match body.get("id").and_then(call_id) {
                Some(id) => Self::Reply(Reply { id, body }),
                None => Self::Unsolicited(AsyncData::Json(Value::Object(body))),
            },
            other => Self::Unsolicited(AsyncData::Json(other)),
        }
    }
}

/// Read a call identifier out of an `id` member
///
/// Accepts a non-negative integer, a float with no fractional part, or a
/// string holding a non-negative decimal integer, so `5`, `5.0` and `"5"`
/// all name call 5.
pub fn call_id(id: &Value) -> Option<CallId> {
    match id {
        Value::Number(n) => n.as_u64().or_else(|| {
            let f = n.as_f64()?;
            (f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then_some(f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
