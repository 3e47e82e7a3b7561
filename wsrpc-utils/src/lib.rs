//! wsrpc-utils: Common utilities shared across wsrpc crates
//!
//! This crate provides:
//! - Unified error types ([`WsrpcError`], [`Result`])
//! - Logging infrastructure ([`init_logging`], [`LogConfig`])
//! - XDG-compliant path utilities ([`paths`] module)

pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Result, WsrpcError};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogOutput};
