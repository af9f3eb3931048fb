//! Request identity and admission tracking.
//!
//! # Responsibilities
//! - Generate unique request IDs for tracing
//! - Bound the number of concurrently running requests (admission gate)
//! - Track in-flight requests and record their completion exactly once

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

use crate::observability::metrics;

/// Global atomic counter for request IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an accepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    /// Generate a new unique request ID.
    pub fn new() -> Self {
        Self(REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveEntry {
    peer_addr: Option<SocketAddr>,
    started: Instant,
}

/// Requests that have been admitted but not finished.
///
/// A semaphore sized to the configured maximum is the admission gate; the map
/// is the membership set. Both change under the same protocol: an entry is
/// inserted after its permit is acquired and removed before its permit is
/// released, so the set never outgrows the limit.
#[derive(Debug)]
pub struct ActiveRequests {
    requests: Mutex<HashMap<RequestId, ActiveEntry>>,
    slots: Arc<Semaphore>,
    max_active: usize,
}

impl ActiveRequests {
    pub fn new(max_active: usize) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(HashMap::new()),
            slots: Arc::new(Semaphore::new(max_active)),
            max_active,
        })
    }

    /// Wait for a free slot and register a new request in it.
    ///
    /// Fails only if the gate has been closed.
    pub async fn admit(
        self: &Arc<Self>,
        peer_addr: Option<SocketAddr>,
    ) -> Result<AdmissionGuard, AcquireError> {
        Ok(self.reserve().await?.admit(peer_addr))
    }

    /// Wait for a free slot without registering anything in it yet.
    pub async fn reserve(self: &Arc<Self>) -> Result<Reservation, AcquireError> {
        if self.slots.available_permits() == 0 {
            tracing::info!(
                max_active_requests = self.max_active,
                "Active request limit reached - waiting for a request to finish"
            );
        }
        let permit = Arc::clone(&self.slots).acquire_owned().await?;
        Ok(Reservation {
            active: Arc::clone(self),
            permit,
        })
    }

    fn register(&self, id: RequestId, peer_addr: Option<SocketAddr>) {
        let active = {
            let mut requests = self.lock();
            requests.insert(
                id,
                ActiveEntry {
                    peer_addr,
                    started: Instant::now(),
                },
            );
            requests.len()
        };
        metrics::set_active_requests(active);
    }

    /// Record that a request ended and free its slot for the next one.
    fn finished(&self, id: RequestId, success: bool) -> Option<Duration> {
        let (entry, active) = {
            let mut requests = self.lock();
            let entry = requests.remove(&id);
            (entry, requests.len())
        };
        metrics::set_active_requests(active);

        let elapsed = entry.map(|e| e.started.elapsed());
        tracing::info!(
            request_id = %id,
            peer_addr = ?entry.and_then(|e| e.peer_addr),
            success,
            active_requests = active,
            elapsed_ms = elapsed.map(|d| d.as_millis() as u64),
            "Request finished"
        );
        elapsed
    }

    /// Current number of admitted, unfinished requests.
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    /// IDs of in-flight requests, oldest first.
    pub fn snapshot(&self) -> Vec<RequestId> {
        let mut ids: Vec<_> = self.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Free admission slots. A slot held by a [`Reservation`] is not free:
    /// an idle listener waiting in `accept` already holds one, so this reads
    /// `max - 1` between connections.
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Stop admitting; pending and future `admit` calls fail.
    pub fn close(&self) {
        self.slots.close();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RequestId, ActiveEntry>> {
        self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A free slot, held but not yet assigned to a request.
#[derive(Debug)]
pub struct Reservation {
    active: Arc<ActiveRequests>,
    permit: OwnedSemaphorePermit,
}

impl Reservation {
    /// Assign the slot to a newly accepted request.
    pub fn admit(self, peer_addr: Option<SocketAddr>) -> AdmissionGuard {
        let id = RequestId::new();
        self.active.register(id, peer_addr);
        AdmissionGuard {
            id,
            active: self.active,
            permit: Some(self.permit),
        }
    }
}

/// One admitted request's slot.
///
/// Reports completion exactly once: explicitly through [`finish`](Self::finish),
/// or as a failure when dropped unreported (for example if the handler panics).
#[derive(Debug)]
pub struct AdmissionGuard {
    id: RequestId,
    active: Arc<ActiveRequests>,
    permit: Option<OwnedSemaphorePermit>,
}

impl AdmissionGuard {
    /// Get this request's ID.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Report the outcome and release the slot.
    pub fn finish(mut self, success: bool) -> Option<Duration> {
        self.report(success)
    }

    fn report(&mut self, success: bool) -> Option<Duration> {
        let permit = self.permit.take()?;
        let elapsed = self.active.finished(self.id, success);
        drop(permit);
        elapsed
    }
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        self.report(false);
    }
}
