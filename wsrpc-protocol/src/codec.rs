//! Text frame encoding
//!
//! Every frame is one JSON document. Framing itself belongs to the
//! transport (a WebSocket text message, or one line on a stream).

use crate::messages::{Inbound, Request};

/// Default upper bound for a single frame (1 MiB)
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Protocol error
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Method name must not be empty")]
    EmptyMethod,

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

/// Serialize a request into a single text frame
pub fn encode_request(request: &Request, max_len: usize) -> Result<String, ProtocolError> {
    let text = serde_json::to_string(request)?;

    if text.len() > max_len {
        return Err(ProtocolError::FrameTooLarge {
            size: text.len(),
            max: max_len,
        });
    }

    Ok(text)
}

/// Classify an inbound text frame
pub fn decode_inbound(text: &str) -> Inbound {
    Inbound::classify(text)
}
