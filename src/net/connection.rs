//! Per-connection admission bookkeeping.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Hold the per-source slot granted by [`ConnectionGuard::try_admit`]
//!   and hand it back exactly once when the connection ends

use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::guard::{ConnectionGuard, SourceKey};

/// Global atomic counter for connection IDs.
/// Relaxed ordering is enough: only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// An admitted connection's slot with the [`ConnectionGuard`].
/// Releases the slot when dropped.
pub struct AdmissionLease {
    guard: Arc<ConnectionGuard>,
    source: SourceKey,
    id: ConnectionId,
}

impl AdmissionLease {
    /// Ask `guard` to admit a new connection from `ip`.
    /// Returns `None` if the connection must be refused.
    pub fn acquire(guard: &Arc<ConnectionGuard>, ip: IpAddr) -> Option<Self> {
        let source = SourceKey::from(ip);
        guard.try_admit(source, true).then(|| Self {
            guard: Arc::clone(guard),
            source,
            id: ConnectionId::new(),
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn source(&self) -> SourceKey {
        self.source
    }
}

impl Drop for AdmissionLease {
    fn drop(&mut self) {
        self.guard.release(self.source);
        tracing::trace!(connection_id = %self.id, source = %self.source, "Connection released");
    }
}
