//! wsrpc-protocol: JSON-RPC 2.0 envelopes for the wsrpc client
//!
//! This crate defines the request envelope sent to the device, the
//! classification of everything the device sends back, and the error
//! objects a reply may carry. It performs no I/O.

pub mod codec;
pub mod messages;
pub mod types;

// Re-export main types at crate root
pub use codec::{decode_inbound, encode_request, ProtocolError, MAX_FRAME_LEN};
pub use messages::{call_id, AsyncData, Inbound, Reply, Request, JSONRPC_VERSION};
pub use types::{CallId, ErrorCode, RpcError};
