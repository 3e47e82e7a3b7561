//! Inbound message routing
//!
//! Decides whether an inbound frame answers a pending call or is an
//! unsolicited message. Works purely on a [`Registry`] and a text payload,
//! so it runs the same behind any transport.

use wsrpc_protocol::{decode_inbound, AsyncData, CallId, Inbound};
use wsrpc_utils::WsrpcError;

use crate::registry::Registry;

/// Where an inbound frame went
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Completed the pending call with this identifier
    Completed(CallId),
    /// Not correlated to any pending call
    Unsolicited(AsyncData),
}

/// Route one inbound frame
///
/// A reply whose `id` matches a pending entry removes that entry (its timer
/// is cancelled before the completion runs) and resolves or rejects it. A
/// reply with an unknown `id` comes back as the parsed object.
pub fn dispatch(registry: &mut Registry, text: &str) -> Dispatch {
    let reply = match decode_inbound(text) {
        Inbound::Reply(reply) => reply,
        Inbound::Unsolicited(data) => return Dispatch::Unsolicited(data),
    };

    let id = reply.id();
    let Some(entry) = registry.take(id) else {
        return Dispatch::Unsolicited(AsyncData::Json(reply.into_message()));
    };

    let outcome = reply
        .into_outcome()
        .map_err(|e| WsrpcError::Remote(e.into_payload()));

    if outcome.is_err() {
        tracing::debug!(id, method = %entry.method(), "Call rejected by server");
    }

    if !entry.complete(outcome) {
        tracing::debug!(id, "Caller stopped waiting before the reply arrived");
    }

    Dispatch::Completed(id)
}
