//! RPC client handle and its driver task
//!
//! [`RpcClient`] is a cheap, cloneable handle. All real work happens on one
//! driver task per client, which exclusively owns the request registry, the
//! live link, the event handler and the state monitor. Handles talk to it
//! through a command channel, so nothing here needs a lock.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};

use wsrpc_protocol::{encode_request, CallId, Request};
use wsrpc_utils::{Result, WsrpcError};

use crate::config::ClientConfig;
use crate::connection::link::{ActiveLink, LinkEvent, TaggedEvent};
use crate::connection::{connector_for, ConnectionState, Connector, EventHandler, StateMonitor, Transition};
use crate::dispatcher::{dispatch, Dispatch};
use crate::registry::{Completion, PendingEntry, Registry};

/// Requests from handles to the driver
enum Command {
    Call {
        request: Request,
        completion: Completion,
    },
    SetHandler(Option<Box<dyn EventHandler>>),
    PendingCalls(oneshot::Sender<Vec<CallId>>),
    Shutdown,
}

struct Shared {
    next_id: AtomicU64,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
}

/// Handle to a reconnecting JSON-RPC client
///
/// Clones share the connection and the identifier counter. The driver stops
/// when [`RpcClient::shutdown`] is called or the last handle is dropped.
#[derive(Clone)]
pub struct RpcClient {
    shared: Arc<Shared>,
}

impl RpcClient {
    /// Start a client for the configured endpoint
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let connector = connector_for(&config.endpoint, config.max_frame_len)?;
        Self::with_connector(config, connector)
    }

    /// Start a client over a caller-supplied transport
    ///
    /// The endpoint in `config` is ignored; every other setting is
    /// validated. Must be called from within a Tokio runtime.
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate_timing()?;

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Connecting);

        let driver = Driver::new(config, connector, command_rx, state_tx);
        tokio::spawn(driver.run());

        Ok(Self {
            shared: Arc::new(Shared {
                next_id: AtomicU64::new(1),
                commands,
                state,
            }),
        })
    }

    /// Issue a call
    ///
    /// Returns immediately. The returned future settles exactly once: with
    /// the reply's `result`, or with an error if the client is not connected,
    /// the server answers with an `error`, or no reply arrives in time.
    pub fn call(&self, method: impl Into<String>, params: Option<Value>) -> PendingCall {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let method = method.into();
        let (completion, rx) = oneshot::channel();

        match Request::new(id, method.clone(), params) {
            Ok(request) => {
                if let Err(mpsc::error::SendError(Command::Call { completion, .. })) =
                    self.shared.commands.send(Command::Call { request, completion })
                {
                    let _ = completion.send(Err(WsrpcError::ConnectionClosed));
                }
            }
            Err(e) => {
                let _ = completion.send(Err(WsrpcError::protocol(e.to_string())));
            }
        }

        PendingCall { id, method, rx }
    }

    /// Issue a call with typed parameters and result
    ///
    /// Parameters serializing to `null` (such as `()`) are omitted.
    pub async fn call_typed<R, P>(&self, method: &str, params: P) -> Result<R>
    where
        R: DeserializeOwned,
        P: Serialize,
    {
        let params = serde_json::to_value(params)
            .map_err(|e| WsrpcError::protocol(format!("Failed to serialize params: {}", e)))?;
        let params = if params.is_null() { None } else { Some(params) };

        let result = self.call(method, params).await?;
        serde_json::from_value(result).map_err(|e| {
            WsrpcError::InvalidMessage(format!("Unexpected result for '{}': {}", method, e))
        })
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.clone()
    }

    /// Wait until the connection is open
    pub async fn wait_until_open(&self) -> Result<()> {
        let mut state = self.shared.state.clone();
        state
            .wait_for(|s| s.is_open())
            .await
            .map(|_| ())
            .map_err(|_| WsrpcError::ConnectionClosed)
    }

    /// Install the handler for unsolicited messages and lifecycle events
    pub fn set_handler(&self, handler: impl EventHandler + 'static) {
        let _ = self
            .shared
            .commands
            .send(Command::SetHandler(Some(Box::new(handler))));
    }

    /// Remove the installed handler
    pub fn clear_handler(&self) {
        let _ = self.shared.commands.send(Command::SetHandler(None));
    }

    /// Identifiers of calls still waiting for a reply
    pub async fn pending_calls(&self) -> Vec<CallId> {
        let (tx, rx) = oneshot::channel();
        if self.shared.commands.send(Command::PendingCalls(tx)).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Stop the driver and close the connection
    ///
    /// Calls still pending resolve with [`WsrpcError::ConnectionClosed`].
    pub fn shutdown(&self) {
        let _ = self.shared.commands.send(Command::Shutdown);
    }
}

/// Deferred result of [`RpcClient::call`]
#[must_use = "a call's outcome is only observable by awaiting it"]
pub struct PendingCall {
    id: CallId,
    method: String,
    rx: oneshot::Receiver<Result<Value>>,
}

impl PendingCall {
    pub fn id(&self) -> CallId {
        self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

impl Future for PendingCall {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(outcome) => outcome,
            // Driver dropped the entry without completing it
            Err(_) => Err(WsrpcError::ConnectionClosed),
        })
    }
}

/// One wake-up of the driver loop
enum Event {
    Command(Command),
    HandlesGone,
    Link(u64, LinkEvent),
    Expired(CallId, PendingEntry),
    Poll,
    Reconnect,
}

struct Driver {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    commands: mpsc::UnboundedReceiver<Command>,
    link_tx: mpsc::UnboundedSender<TaggedEvent>,
    link_rx: mpsc::UnboundedReceiver<TaggedEvent>,
    link: Option<ActiveLink>,
    generation: u64,
    state: watch::Sender<ConnectionState>,
    monitor: StateMonitor,
    registry: Registry,
    handler: Option<Box<dyn EventHandler>>,
    reconnect_at: Option<Instant>,
}

impl Driver {
    fn new(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        commands: mpsc::UnboundedReceiver<Command>,
        state: watch::Sender<ConnectionState>,
    ) -> Self {
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        Self {
            config,
            connector,
            commands,
            link_tx,
            link_rx,
            link: None,
            generation: 0,
            state,
            monitor: StateMonitor::new(),
            registry: Registry::new(),
            handler: None,
            reconnect_at: None,
        }
    }

    async fn run(mut self) {
        tracing::info!(endpoint = %self.connector.describe(), "RPC client starting");

        let mut poll = tokio::time::interval(self.config.poll_interval());
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.open_link();

        loop {
            let event = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => Event::Command(command),
                    None => Event::HandlesGone,
                },

                Some((generation, event)) = self.link_rx.recv() => Event::Link(generation, event),

                Some((id, entry)) = self.registry.next_expired() => Event::Expired(id, entry),

                _ = poll.tick() => Event::Poll,

                _ = sleep_until(self.reconnect_at) => Event::Reconnect,
            };

            match event {
                Event::Command(Command::Shutdown) => {
                    tracing::info!("RPC client shutting down");
                    break;
                }
                Event::HandlesGone => {
                    tracing::debug!("All client handles dropped, stopping");
                    break;
                }
                Event::Command(command) => self.handle_command(command),
                Event::Link(generation, event) => self.handle_link_event(generation, event),
                Event::Expired(id, entry) => self.handle_timeout(id, entry),
                Event::Poll => self.poll_state(),
                Event::Reconnect => {
                    self.reconnect_at = None;
                    self.open_link();
                }
            }
        }

        // Dropping the registry drops every completion; those calls
        // resolve with ConnectionClosed
        self.link = None;
        self.set_state(ConnectionState::Closed);
        tracing::debug!(pending = self.registry.len(), "RPC client stopped");
    }

    /// Replace the link with a fresh connection attempt
    fn open_link(&mut self) {
        // Abort the old task before starting a new one
        self.link = None;
        self.generation += 1;
        self.set_state(ConnectionState::Connecting);

        tracing::debug!(generation = self.generation, "Opening connection");
        self.link = Some(ActiveLink::spawn(
            Arc::clone(&self.connector),
            self.generation,
            self.link_tx.clone(),
        ));
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Call {
                request,
                completion,
            } => self.start_call(request, completion),
            Command::SetHandler(handler) => {
                tracing::debug!(installed = handler.is_some(), "Event handler updated");
                self.handler = handler;
            }
            Command::PendingCalls(reply) => {
                let _ = reply.send(self.registry.ids());
            }
            Command::Shutdown => {}
        }
    }

    fn start_call(&mut self, request: Request, completion: Completion) {
        let id = request.id;

        if self.link.is_none() || !self.state.borrow().is_open() {
            tracing::warn!(id, method = %request.method, "Not connected, rejecting call");
            let _ = completion.send(Err(WsrpcError::not_connected(request.method)));
            self.notify_disconnected();
            return;
        }

        let text = match encode_request(&request, self.config.max_frame_len) {
            Ok(text) => text,
            Err(e) => {
                let _ = completion.send(Err(WsrpcError::protocol(e.to_string())));
                return;
            }
        };

        tracing::debug!(id, method = %request.method, "Sending call");
        let sent = self.link.as_ref().is_some_and(|link| link.send(text));
        if !sent {
            // The entry's timer settles the call
            tracing::warn!(id, "Link task gone, call will time out");
        }

        if let Err(completion) =
            self.registry
                .register(id, request.method, completion, self.config.call_timeout_ms)
        {
            let _ = completion.send(Err(WsrpcError::internal(format!(
                "Call identifier {} already pending",
                id
            ))));
        }
    }

    fn handle_link_event(&mut self, generation: u64, event: LinkEvent) {
        if generation != self.generation {
            tracing::debug!(generation, current = self.generation, "Ignoring stale link event");
            return;
        }

        match event {
            LinkEvent::Opened => self.set_state(ConnectionState::Open),
            LinkEvent::Frame(text) => self.handle_frame(&text),
            // Already logged by the link task
            LinkEvent::Failed(e) => {
                tracing::debug!(generation, "Link failed: {}", e);
            }
            LinkEvent::Closed => {
                self.link = None;
                self.set_state(ConnectionState::Closed);
                self.schedule_reconnect();
            }
        }
    }

    fn handle_frame(&mut self, text: &str) {
        match dispatch(&mut self.registry, text) {
            Dispatch::Completed(id) => {
                tracing::debug!(id, "Call completed");
            }
            Dispatch::Unsolicited(data) => match self.handler.as_mut() {
                Some(handler) => handler.on_async_data(data),
                None => {
                    tracing::warn!(?data, "Dropping unsolicited message, no handler installed");
                }
            },
        }

        // Any inbound data proves the connection is alive
        self.notify_connected();
    }

    fn handle_timeout(&mut self, id: CallId, entry: PendingEntry) {
        let millis = entry.timeout_ms();
        tracing::warn!(id, method = %entry.method(), millis, "Call timed out");

        entry.complete(Err(WsrpcError::Timeout { id, millis }));
        self.notify_disconnected();
    }

    fn poll_state(&mut self) {
        let current = *self.state.borrow();
        match self.monitor.observe(current) {
            Some(Transition::Connected) => self.notify_connected(),
            Some(Transition::Disconnected) => self.notify_disconnected(),
            None => {}
        }
    }

    fn schedule_reconnect(&mut self) {
        if self.reconnect_at.is_some() {
            return;
        }

        let delay = self.config.reconnect_delay();
        tracing::info!(delay_ms = self.config.reconnect_delay_ms, "Connection closed, reconnecting");
        self.reconnect_at = Some(Instant::now() + delay);
    }

    fn set_state(&mut self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(?previous, ?state, "Connection state changed");
        }
    }

    fn notify_connected(&mut self) {
        match self.handler.as_mut() {
            Some(handler) => handler.on_connected(),
            None => tracing::trace!("Connected"),
        }
    }

    fn notify_disconnected(&mut self) {
        match self.handler.as_mut() {
            Some(handler) => handler.on_disconnected(),
            None => tracing::info!("Disconnected"),
        }
    }
}

/// Sleep until the deadline, or forever when there is none
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::memory_transport;
    use serde_json::json;

    fn test_client() -> (RpcClient, crate::connection::MemoryAcceptor) {
        let (connector, acceptor) = memory_transport();
        let client = RpcClient::with_connector(ClientConfig::default(), Arc::new(connector)).unwrap();
        (client, acceptor)
    }

    #[tokio::test]
    async fn test_pending_call_accessors() {
        let (client, _acceptor) = test_client();

        let call = client.call("system.getInfo", None);
        assert_eq!(call.id(), 1);
        assert_eq!(call.method(), "system.getInfo");
    }

    #[tokio::test]
    async fn test_empty_method_rejected_immediately() {
        let (client, _acceptor) = test_client();

        let err = client.call("  ", Some(json!({}))).await.unwrap_err();
        assert!(matches!(err, WsrpcError::Protocol(_)));
        assert!(client.pending_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_ids_increase_across_clones() {
        let (client, _acceptor) = test_client();
        let clone = client.clone();

        assert_eq!(client.call("a", None).id(), 1);
        assert_eq!(clone.call("b", None).id(), 2);
        assert_eq!(client.call("c", None).id(), 3);
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_config() {
        let err = RpcClient::connect(ClientConfig::new("http://device/ws")).err().unwrap();
        assert!(matches!(err, WsrpcError::Config(_)));
    }

    #[tokio::test]
    async fn test_with_connector_rejects_zero_poll_interval() {
        let (connector, _acceptor) = memory_transport();
        let config = ClientConfig {
            poll_interval_ms: 0,
            ..ClientConfig::default()
        };

        let err = RpcClient::with_connector(config, Arc::new(connector)).err().unwrap();
        assert!(matches!(err, WsrpcError::Config(_)));
    }

    #[tokio::test]
    async fn test_with_connector_rejects_unbounded_timeout() {
        let (connector, _acceptor) = memory_transport();
        let config = ClientConfig {
            call_timeout_ms: 100_000_000_000,
            reconnect_delay_ms: 200_000_000_000,
            ..ClientConfig::default()
        };

        assert!(RpcClient::with_connector(config, Arc::new(connector)).is_err());
    }

    #[tokio::test]
    async fn test_with_connector_ignores_endpoint() {
        let (connector, _acceptor) = memory_transport();
        let config = ClientConfig::new("not a url");

        assert!(RpcClient::with_connector(config, Arc::new(connector)).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_closes_and_retries() {
        let (connector, acceptor) = memory_transport();
        drop(acceptor);
        let client = RpcClient::with_connector(ClientConfig::default(), Arc::new(connector)).unwrap();

        let mut state = client.subscribe_state();
        state.wait_for(|s| *s == ConnectionState::Closed).await.unwrap();

        // Next attempt after the reconnect delay
        state.wait_for(|s| *s == ConnectionState::Connecting).await.unwrap();
        assert!(client.pending_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_sleep_until_none_never_fires() {
        let fired = tokio::time::timeout(
            std::time::Duration::from_millis(10),
            sleep_until(None),
        )
        .await;
        assert!(fired.is_err());
    }
}
