//! In-process transport
//!
//! Every [`MemoryConnector::connect`] creates a fresh channel pair and hands
//! the far end to the [`MemoryAcceptor`] as a [`MemoryPeer`]. Dropping the
//! peer closes that connection; dropping the acceptor makes every further
//! connect attempt fail.

use futures::channel::mpsc;
use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};

use wsrpc_utils::{Result, WsrpcError};

use super::transport::{Connector, Link};

/// Create a connected connector/acceptor pair
pub fn memory_transport() -> (MemoryConnector, MemoryAcceptor) {
    let (tx, rx) = mpsc::unbounded();
    (MemoryConnector { peers: tx }, MemoryAcceptor { peers: rx })
}

/// Client side of the in-process transport
#[derive(Clone)]
pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<MemoryPeer>,
}

impl Connector for MemoryConnector {
    fn connect(&self) -> BoxFuture<'static, Result<Link>> {
        let (client_tx, server_rx) = mpsc::unbounded::<String>();
        let (server_tx, client_rx) = mpsc::unbounded::<String>();

        let accepted = self.peers.unbounded_send(MemoryPeer {
            incoming: server_rx,
            outgoing: server_tx,
        });

        Box::pin(async move {
            accepted.map_err(|_| WsrpcError::connection("memory acceptor dropped"))?;

            let sink = client_tx.sink_map_err(|_| WsrpcError::ConnectionClosed);
            let stream = client_rx.map(Ok);
            Ok(Link::new(Box::pin(sink), Box::pin(stream)))
        })
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Server side: yields one peer per client connection
pub struct MemoryAcceptor {
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryAcceptor {
    /// Wait for the next connection
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers.next().await
    }
}

/// Server end of one in-process connection
pub struct MemoryPeer {
    incoming: mpsc::UnboundedReceiver<String>,
    outgoing: mpsc::UnboundedSender<String>,
}

impl MemoryPeer {
    /// Next frame sent by the client, `None` once the client side is gone
    pub async fn recv(&mut self) -> Option<String> {
        self.incoming.next().await
    }

    /// Send a frame to the client
    pub fn send(&self, text: impl Into<String>) -> Result<()> {
        self.outgoing
            .unbounded_send(text.into())
            .map_err(|_| WsrpcError::ConnectionClosed)
    }

    /// Close the connection from the server side
    pub fn close(self) {}
}
