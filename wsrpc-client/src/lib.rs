//! Reconnecting JSON-RPC client
//!
//! Multiplexes many concurrent calls over one persistent connection,
//! correlates replies by identifier, times out calls that get no answer,
//! reconnects forever after any close, and hands unsolicited messages to an
//! [`EventHandler`].
//!
//! ```no_run
//! use wsrpc_client::{ClientConfig, RpcClient};
//!
//! # async fn example() -> wsrpc_client::Result<()> {
//! let client = RpcClient::connect(ClientConfig::new("ws://192.168.4.1/ws"))?;
//! client.wait_until_open().await?;
//! let info = client.call("system.getInfo", None).await?;
//! println!("{}", info);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod registry;

pub use client::{PendingCall, RpcClient};
pub use config::ClientConfig;
pub use connection::{
    connector_for, memory_transport, CallbackHandler, ConnectionState, Connector, EventHandler,
    MemoryAcceptor, MemoryConnector, MemoryPeer,
};
pub use wsrpc_protocol::{AsyncData, CallId, ErrorCode, RpcError};
pub use wsrpc_utils::{Result, WsrpcError};
