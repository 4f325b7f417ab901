//! Pending-call tracking
//!
//! The correlator owns the only table shared between the reader task and the
//! callers. Each pending call is a one-shot completion slot; whoever removes
//! the entry from the table is the only one who may fill it, which is what
//! makes resolution at-most-once.

use super::*;
use crate::{Error, Result};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, trace};

/// Outcome delivered to a waiting caller
pub type CallOutcome = Result<JsonRpcResponse>;

/// An in-flight request
#[derive(Debug)]
struct PendingCall {
    /// Channel sender for the pending response
    sender: oneshot::Sender<CallOutcome>,
    /// Method name, kept for diagnostics
    method: String,
    /// When the request was registered
    created_at: Instant,
}

#[derive(Debug, Default)]
struct PendingTable {
    calls: HashMap<RequestId, PendingCall>,
    closed: bool,
}

/// Matches responses to the requests that are waiting for them
#[derive(Debug)]
pub struct Correlator {
    next_id: AtomicI64,
    table: Mutex<PendingTable>,
}

/// Awaitable completion slot returned by [`Correlator::register`]
#[derive(Debug)]
pub struct ResponseSlot {
    id: RequestId,
    receiver: oneshot::Receiver<CallOutcome>,
}

impl ResponseSlot {
    /// Identifier of the call this slot belongs to
    pub fn id(&self) -> &RequestId {
        &self.id
    }
}

impl Future for ResponseSlot {
    type Output = CallOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // A dropped sender means the entry was discarded without being filled.
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|outcome| outcome.unwrap_or(Err(Error::Cancelled)))
    }
}

impl Correlator {
    /// Create an empty correlator whose identifiers start at 1
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            table: Mutex::new(PendingTable::default()),
        }
    }

    /// Next identifier from the monotonically increasing counter
    pub fn next_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Track a new pending call.
    ///
    /// Fails with [`Error::DuplicateIdentifier`] if `id` is already pending and
    /// with [`Error::ShuttingDown`] once [`Correlator::shutdown`] has run.
    pub async fn register(&self, id: RequestId, method: &str) -> Result<ResponseSlot> {
        let mut table = self.table.lock().await;
        if table.closed {
            return Err(Error::ShuttingDown);
        }
        if table.calls.contains_key(&id) {
            return Err(Error::DuplicateIdentifier(id));
        }

        let (sender, receiver) = oneshot::channel();
        table.calls.insert(
            id.clone(),
            PendingCall {
                sender,
                method: method.to_string(),
                created_at: Instant::now(),
            },
        );
        trace!(%id, method, "registered pending call");

        Ok(ResponseSlot { id, receiver })
    }

    /// Fill the slot for `id` and stop tracking it.
    ///
    /// Fails with [`Error::UnknownIdentifier`] when nothing is pending under
    /// `id`, including when it was already resolved.
    pub async fn resolve(&self, id: &RequestId, outcome: CallOutcome) -> Result<()> {
        let call = self.table.lock().await.calls.remove(id);
        let Some(call) = call else {
            return Err(Error::UnknownIdentifier(id.clone()));
        };

        trace!(
            %id,
            method = %call.method,
            elapsed_ms = call.created_at.elapsed().as_millis() as u64,
            "resolved pending call"
        );
        if call.sender.send(outcome).is_err() {
            debug!(%id, "caller stopped waiting before the response arrived");
        }
        Ok(())
    }

    /// Fail the slot for `id` with [`Error::Cancelled`].
    pub async fn cancel(&self, id: &RequestId) -> Result<()> {
        let call = self.table.lock().await.calls.remove(id);
        match call {
            Some(call) => {
                debug!(%id, method = %call.method, "cancelled pending call");
                let _ = call.sender.send(Err(Error::Cancelled));
                Ok(())
            }
            None => Err(Error::UnknownIdentifier(id.clone())),
        }
    }

    /// Stop tracking `id` without filling its slot.
    ///
    /// Returns whether the call was still pending.
    pub async fn forget(&self, id: &RequestId) -> bool {
        self.table.lock().await.calls.remove(id).is_some()
    }

    /// Fail every pending call and refuse further registrations.
    ///
    /// `make_error` is called once per pending call. Calling this again is
    /// harmless.
    pub async fn shutdown<F>(&self, make_error: F) -> usize
    where
        F: Fn() -> Error,
    {
        let drained: Vec<_> = {
            let mut table = self.table.lock().await;
            table.closed = true;
            table.calls.drain().collect()
        };

        let count = drained.len();
        for (id, call) in drained {
            trace!(%id, method = %call.method, "failing pending call on shutdown");
            let _ = call.sender.send(Err(make_error()));
        }
        if count > 0 {
            debug!(count, "failed pending calls on shutdown");
        }
        count
    }

    /// Fail calls registered more than `timeout` ago with [`Error::Timeout`].
    pub async fn expire(&self, timeout: Duration) -> Vec<RequestId> {
        let now = Instant::now();
        let expired: Vec<_> = {
            let mut table = self.table.lock().await;
            let ids: Vec<RequestId> = table
                .calls
                .iter()
                .filter(|(_, call)| now.duration_since(call.created_at) > timeout)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| table.calls.remove(&id).map(|call| (id, call)))
                .collect()
        };

        expired
            .into_iter()
            .map(|(id, call)| {
                debug!(%id, method = %call.method, "pending call expired");
                let _ = call.sender.send(Err(Error::Timeout));
                id
            })
            .collect()
    }

    /// Number of calls awaiting a response
    pub async fn pending_count(&self) -> usize {
        self.table.lock().await.calls.len()
    }

    /// Identifiers awaiting a response, oldest first
    pub async fn pending_ids(&self) -> Vec<RequestId> {
        let table = self.table.lock().await;
        let mut calls: Vec<_> = table.calls.iter().collect();
        calls.sort_by_key(|(_, call)| call.created_at);
        calls.into_iter().map(|(id, _)| id.clone()).collect()
    }

    /// Whether `id` is awaiting a response
    pub async fn is_pending(&self, id: &RequestId) -> bool {
        self.table.lock().await.calls.contains_key(id)
    }

    /// Whether [`Correlator::shutdown`] has run
    pub async fn is_closed(&self) -> bool {
        self.table.lock().await.closed
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}
