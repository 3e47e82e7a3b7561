//! Request registry
//!
//! Maps each outstanding call identifier to its completion handle and its
//! timeout timer. An entry leaves the registry exactly once: either through
//! [`Registry::take`] when a matching reply arrives (timer cancelled first)
//! or through [`Registry::next_expired`] when its timer fires (entry removed
//! first). Whoever removes the entry is the only one able to complete it.

use std::collections::HashMap;
use std::future::poll_fn;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio_util::time::{delay_queue, DelayQueue};

use wsrpc_protocol::CallId;
use wsrpc_utils::Result;

/// Completion side of a pending call
pub type Completion = oneshot::Sender<Result<Value>>;

/// Record tracking one outstanding call
#[derive(Debug)]
pub struct PendingEntry {
    method: String,
    timeout_ms: u64,
    completion: Completion,
    timer: delay_queue::Key,
}

impl PendingEntry {
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Configured timeout, in milliseconds
    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Complete the call; false if the caller stopped waiting
    pub fn complete(self, outcome: Result<Value>) -> bool {
        self.completion.send(outcome).is_ok()
    }
}

/// Identifier to pending-call mapping with per-entry timers
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<CallId, PendingEntry>,
    timers: DelayQueue<CallId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call and arm its timer
    ///
    /// An identifier that is already pending is refused and the completion
    /// handed back untouched.
    pub fn register(
        &mut self,
        id: CallId,
        method: impl Into<String>,
        completion: Completion,
        timeout_ms: u64,
    ) -> std::result::Result<(), Completion> {
        if self.entries.contains_key(&id) {
            return Err(completion);
        }

        let timer = self.timers.insert(id, Duration::from_millis(timeout_ms));
        self.entries.insert(
            id,
            PendingEntry {
                method: method.into(),
                timeout_ms,
                completion,
                timer,
            },
        );
        Ok(())
    }

    /// Remove an entry for completion by its reply, cancelling its timer
    pub fn take(&mut self, id: CallId) -> Option<PendingEntry> {
        let entry = self.entries.remove(&id)?;
        self.timers.try_remove(&entry.timer);
        Some(entry)
    }

    /// Wait for the next timer to fire and remove its entry
    ///
    /// Resolves to `None` straight away when nothing is pending.
    pub async fn next_expired(&mut self) -> Option<(CallId, PendingEntry)> {
        loop {
            let expired = poll_fn(|cx| self.timers.poll_expired(cx)).await?;
            let id = expired.into_inner();
            if let Some(entry) = self.entries.remove(&id) {
                return Some((id, entry));
            }
        }
    }

    pub fn contains(&self, id: CallId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Outstanding identifiers in ascending order
    pub fn ids(&self) -> Vec<CallId> {
        let mut ids: Vec<_> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
