//! Per-connection I/O task

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use wsrpc_utils::WsrpcError;

use super::transport::Connector;

/// What a link task reports back to the driver
#[derive(Debug)]
pub enum LinkEvent {
    /// Underlying connection established
    Opened,
    /// Inbound text frame
    Frame(String),
    /// Connect or I/O failure; always followed by `Closed`
    Failed(WsrpcError),
    /// Underlying connection is gone
    Closed,
}

/// Link event tagged with the generation of the link that produced it
pub type TaggedEvent = (u64, LinkEvent);

/// Handle to the one live link task
///
/// Dropping it aborts the task, which drops the underlying connection.
pub struct ActiveLink {
    generation: u64,
    outgoing: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

impl ActiveLink {
    /// Spawn a task that connects and then pumps frames both ways
    pub fn spawn(
        connector: Arc<dyn Connector>,
        generation: u64,
        events: mpsc::UnboundedSender<TaggedEvent>,
    ) -> Self {
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(link_task(connector, generation, outgoing_rx, events));

        Self {
            generation,
            outgoing,
            task,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Queue a frame for sending; false once the task has stopped
    pub fn send(&self, text: String) -> bool {
        self.outgoing.send(text).is_ok()
    }
}

impl Drop for ActiveLink {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn link_task(
    connector: Arc<dyn Connector>,
    generation: u64,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TaggedEvent>,
) {
    let report = |event: LinkEvent| {
        // Driver gone means the client is shutting down
        let _ = events.send((generation, event));
    };

    let link = match connector.connect().await {
        Ok(link) => link,
        Err(e) => {
            tracing::error!(endpoint = %connector.describe(), generation, "Connect failed: {}", e);
            report(LinkEvent::Failed(e));
            report(LinkEvent::Closed);
            return;
        }
    };

    tracing::info!(endpoint = %connector.describe(), generation, "Connection open");
    report(LinkEvent::Opened);

    let mut sink = link.sink;
    let mut stream = link.stream;

    loop {
        tokio::select! {
            Some(text) = outgoing.recv() => {
                tracing::debug!(generation, len = text.len(), "Sending frame");
                if let Err(e) = sink.send(text).await {
                    tracing::error!(generation, "Failed to send frame: {}", e);
                    report(LinkEvent::Failed(e));
                    break;
                }
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(text)) => {
                        tracing::debug!(generation, len = text.len(), "Received frame");
                        report(LinkEvent::Frame(text));
                    }
                    Some(Err(e)) => {
                        tracing::error!(generation, "Failed to receive frame: {}", e);
                        report(LinkEvent::Failed(e));
                        break;
                    }
                    None => {
                        tracing::info!(generation, "Server closed connection");
                        break;
                    }
                }
            }
        }
    }

    report(LinkEvent::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::memory::memory_transport;

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<TaggedEvent>) -> TaggedEvent {
        rx.recv().await.expect("link task dropped its event sender")
    }

    #[tokio::test]
    async fn test_link_reports_open_frames_and_close() {
        let (connector, mut acceptor) = memory_transport();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let link = ActiveLink::spawn(Arc::new(connector), 3, tx);
        assert_eq!(link.generation(), 3);

        let mut peer = acceptor.accept().await.unwrap();
        assert!(matches!(next_event(&mut rx).await, (3, LinkEvent::Opened)));

        assert!(link.send("out".into()));
        assert_eq!(peer.recv().await.as_deref(), Some("out"));

        peer.send("in").unwrap();
        match next_event(&mut rx).await {
            (3, LinkEvent::Frame(text)) => assert_eq!(text, "in"),
            other => panic!("unexpected event: {:?}", other),
        }

        peer.close();
        assert!(matches!(next_event(&mut rx).await, (3, LinkEvent::Closed)));
    }

    #[tokio::test]
    async fn test_connect_failure_reports_failed_then_closed() {
        let (connector, acceptor) = memory_transport();
        drop(acceptor);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _link = ActiveLink::spawn(Arc::new(connector), 1, tx);

        assert!(matches!(next_event(&mut rx).await, (1, LinkEvent::Failed(_))));
        assert!(matches!(next_event(&mut rx).await, (1, LinkEvent::Closed)));
    }

    #[tokio::test]
    async fn test_drop_aborts_task_and_closes_connection() {
        let (connector, mut acceptor) = memory_transport();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let link = ActiveLink::spawn(Arc::new(connector), 1, tx);
        let mut peer = acceptor.accept().await.unwrap();
        assert!(matches!(next_event(&mut rx).await, (1, LinkEvent::Opened)));

        drop(link);

        // The aborted task dropped the client half of the connection
        assert!(peer.recv().await.is_none());
    }
}
