//! Connection management
//!
//! Transports, the per-connection I/O task, connection state tracking and
//! the hooks through which collaborators observe the connection.

mod handler;
pub(crate) mod link;
pub mod memory;
mod state;
pub mod transport;

pub use handler::{CallbackHandler, EventHandler};
pub use memory::{memory_transport, MemoryAcceptor, MemoryConnector, MemoryPeer};
pub use state::{ConnectionState, StateMonitor, Transition};
pub use transport::{
    connector_for, Connector, Endpoint, FrameSink, FrameStream, LineConnector, Link,
    WebSocketConnector,
};
