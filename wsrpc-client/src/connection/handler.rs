//! Event handler trait and utilities

use wsrpc_protocol::AsyncData;

/// Trait for receiving unsolicited messages and lifecycle notifications
///
/// Handlers run on the client's driver task; they should hand work off
/// rather than block.
pub trait EventHandler: Send {
    /// Handle a message not correlated to any pending call
    fn on_async_data(&mut self, data: AsyncData);

    /// Called when the connection is (or is proven to be) up
    fn on_connected(&mut self) {}

    /// Called when the connection is lost or a call timed out
    fn on_disconnected(&mut self) {}
}

/// Simple callback-based handler for unsolicited messages
pub struct CallbackHandler<F>
where
    F: FnMut(AsyncData) + Send,
{
    callback: F,
}

impl<F> CallbackHandler<F>
where
    F: FnMut(AsyncData) + Send,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> EventHandler for CallbackHandler<F>
where
    F: FnMut(AsyncData) + Send,
{
    fn on_async_data(&mut self, data: AsyncData) {
        (self.callback)(data);
    }
}
