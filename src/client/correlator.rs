//! Call correlation
//!
//! Pending-call table keyed by request id. The call-issuing path inserts
//! entries; the frame-reading task resolves them. A response with no
//! pending entry (already timed out, or a duplicate) is discarded.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::oneshot;
use tracing::debug;

use crate::protocol::{JsonRpcResponse, RequestId};

/// Table of calls awaiting their response frame
#[derive(Default)]
pub struct PendingCalls {
    table: Mutex<HashMap<RequestId, oneshot::Sender<JsonRpcResponse>>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pending call and hand back the receiver the caller
    /// suspends on
    pub fn register(&self, id: RequestId) -> oneshot::Receiver<JsonRpcResponse> {
        let (tx, rx) = oneshot::channel();
        self.lock().insert(id, tx);
        rx
    }

    /// Resolve the pending call matching this response
    ///
    /// Returns false if no entry matched; the response is dropped.
    pub fn resolve(&self, response: JsonRpcResponse) -> bool {
        let Some(tx) = self.lock().remove(&response.id) else {
            debug!(id = ?response.id, "discarding unmatched response");
            return false;
        };
        // The receiver may have been dropped between timeout and removal;
        // either way the entry is gone.
        tx.send(response).is_ok()
    }

    /// Drop a pending entry without resolving it (timeout abandonment)
    pub fn forget(&self, id: &RequestId) {
        self.lock().remove(id);
    }

    /// Fail every pending call by dropping its sender; receivers observe
    /// the closure and map it to a session error
    pub fn fail_all(&self) {
        let drained: Vec<_> = self.lock().drain().collect();
        if !drained.is_empty() {
            debug!(count = drained.len(), "failing pending calls on stream close");
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<RequestId, oneshot::Sender<JsonRpcResponse>>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
