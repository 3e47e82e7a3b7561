//! Underlying transports
//!
//! A [`Connector`] opens one underlying connection and returns it as a
//! [`Link`]: a sink and a stream of text frames. The driver never touches
//! sockets directly, which is what lets the in-memory transport stand in
//! for a device.

use std::pin::Pin;
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::codec::{Framed, LinesCodec};
use url::Url;

use wsrpc_utils::{Result, WsrpcError};

/// Outbound half of a link
pub type FrameSink = Pin<Box<dyn Sink<String, Error = WsrpcError> + Send>>;

/// Inbound half of a link
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// One open underlying connection
pub struct Link {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl Link {
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

/// Opens underlying connections to a fixed endpoint
pub trait Connector: Send + Sync + 'static {
    /// Open a fresh connection
    fn connect(&self) -> BoxFuture<'static, Result<Link>>;

    /// Human-readable endpoint, for logs
    fn describe(&self) -> String;
}

/// Parsed endpoint address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `ws://host[:port]/path`, one JSON document per text message
    WebSocket(String),
    /// `tcp://host:port`, one JSON document per line
    Tcp { host: String, port: u16 },
}

impl Endpoint {
    pub fn parse(addr: &str) -> Result<Self> {
        let url = Url::parse(addr)
            .map_err(|e| WsrpcError::config(format!("Invalid endpoint URL '{}': {}", addr, e)))?;

        match url.scheme() {
            "ws" => {
                if url.host_str().is_none() {
                    return Err(WsrpcError::config(format!("Missing host in endpoint '{}'", addr)));
                }
                Ok(Self::WebSocket(url.to_string()))
            }
            "tcp" => {
                let host = url
                    .host_str()
                    .ok_or_else(|| WsrpcError::config("Missing host in TCP URL"))?;
                let port = url
                    .port()
                    .ok_or_else(|| WsrpcError::config("Missing port in TCP URL"))?;
                Ok(Self::Tcp {
                    host: host.to_string(),
                    port,
                })
            }
            other => Err(WsrpcError::config(format!(
                "Unsupported endpoint scheme '{}' (expected ws:// or tcp://)",
                other
            ))),
        }
    }
}

/// Build the connector matching an endpoint address
pub fn connector_for(addr: &str, max_frame_len: usize) -> Result<Arc<dyn Connector>> {
    Ok(match Endpoint::parse(addr)? {
        Endpoint::WebSocket(url) => Arc::new(WebSocketConnector::new(url)),
        Endpoint::Tcp { host, port } => {
            Arc::new(LineConnector::new(format!("{}:{}", host, port), max_frame_len))
        }
    })
}

/// WebSocket transport
///
/// Text messages are frames. Binary messages are decoded lossily as UTF-8
/// and delivered like any other frame; control messages are dropped.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: String,
}

impl WebSocketConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Connector for WebSocketConnector {
    fn connect(&self) -> BoxFuture<'static, Result<Link>> {
        let url = self.url.clone();
        Box::pin(async move {
            let (ws, _response) = connect_async(url.as_str())
                .await
                .map_err(|e| WsrpcError::connection(format!("WebSocket connect to {} failed: {}", url, e)))?;

            let (sink, stream) = ws.split::<Message>();

            let sink = sink
                .sink_map_err(|e| WsrpcError::connection(format!("WebSocket send failed: {}", e)))
                .with(|text: String| future::ready(Ok::<_, WsrpcError>(Message::text(text))));

            let stream = stream.filter_map(|frame| {
                future::ready(match frame {
                    Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                    Ok(Message::Binary(data)) => Some(Ok(String::from_utf8_lossy(&data).into_owned())),
                    Ok(_) => None,
                    Err(e) => Some(Err(WsrpcError::connection(format!(
                        "WebSocket receive failed: {}",
                        e
                    )))),
                })
            });

            Ok(Link::new(Box::pin(sink), Box::pin(stream)))
        })
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Newline-delimited JSON over TCP
#[derive(Debug, Clone)]
pub struct LineConnector {
    addr: String,
    max_frame_len: usize,
}

impl LineConnector {
    pub fn new(addr: impl Into<String>, max_frame_len: usize) -> Self {
        Self {
            addr: addr.into(),
            max_frame_len,
        }
    }
}

impl Connector for LineConnector {
    fn connect(&self) -> BoxFuture<'static, Result<Link>> {
        let addr = self.addr.clone();
        let max_frame_len = self.max_frame_len;
        Box::pin(async move {
            let stream = TcpStream::connect(&addr)
                .await
                .map_err(|e| WsrpcError::connection(format!("Failed to connect to {}: {}", addr, e)))?;

            let framed = Framed::new(stream, LinesCodec::new_with_max_length(max_frame_len));
            let (sink, stream) = framed.split::<String>();

            let sink = sink.sink_map_err(|e| WsrpcError::connection(format!("Line send failed: {}", e)));
            let stream = stream
                .map(|line| line.map_err(|e| WsrpcError::connection(format!("Line receive failed: {}", e))));

            Ok(Link::new(Box::pin(sink), Box::pin(stream)))
        })
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    // ==================== Endpoint Tests ====================

    #[test]
    fn test_parse_websocket_endpoint() {
        let endpoint = Endpoint::parse("ws://192.168.4.1/ws").unwrap();
        assert_eq!(endpoint, Endpoint::WebSocket("ws://192.168.4.1/ws".into()));
    }

    #[test]
    fn test_parse_tcp_endpoint() {
        let endpoint = Endpoint::parse("tcp://10.0.0.2:9000").unwrap();
        assert_eq!(
            endpoint,
            Endpoint::Tcp {
                host: "10.0.0.2".into(),
                port: 9000
            }
        );
    }

    #[test]
    fn test_parse_tcp_requires_port() {
        assert!(matches!(Endpoint::parse("tcp://10.0.0.2"), Err(WsrpcError::Config(_))));
    }

    #[test]
    fn test_parse_rejects_unknown_scheme() {
        let err = Endpoint::parse("http://device/ws").unwrap_err();
        assert!(err.to_string().contains("Unsupported endpoint scheme"));
        assert!(Endpoint::parse("wss://device/ws").is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(Endpoint::parse("not a url"), Err(WsrpcError::Config(_))));
    }

    #[test]
    fn test_connector_for_describes_endpoint() {
        let ws = connector_for("ws://device.local/ws", 1024).unwrap();
        assert_eq!(ws.describe(), "ws://device.local/ws");

        let tcp = connector_for("tcp://127.0.0.1:4000", 1024).unwrap();
        assert_eq!(tcp.describe(), "tcp://127.0.0.1:4000");
    }

    // ==================== Line Transport Tests ====================

    #[tokio::test]
    async fn test_line_connector_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();
            let line = lines.next_line().await.unwrap().unwrap();
            write.write_all(format!("echo:{}\n", line).as_bytes()).await.unwrap();
        });

        let connector = LineConnector::new(addr.to_string(), 1024);
        let mut link = connector.connect().await.unwrap();

        link.sink.send("hello".to_string()).await.unwrap();
        let reply = link.stream.next().await.unwrap().unwrap();
        assert_eq!(reply, "echo:hello");

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_line_connector_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = LineConnector::new(addr.to_string(), 1024);
        let err = connector.connect().await.err().unwrap();
        assert!(matches!(err, WsrpcError::Connection(_)));
    }

    #[tokio::test]
    async fn test_websocket_connector_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = WebSocketConnector::new(format!("ws://{}/ws", addr));
        let err = connector.connect().await.err().unwrap();
        assert!(err.to_string().contains("WebSocket connect"));
    }
}
