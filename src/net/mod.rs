//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, global connection limit)
//!     → ConnectionGuard::try_admit (per-source admission)
//!     → connection.rs (AdmissionLease, released on drop)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Per-source slots are returned by Drop, so every exit path releases exactly once

pub mod connection;
pub mod listener;

pub use connection::{AdmissionLease, ConnectionId};
pub use listener::{ConnectionPermit, Listener, ListenerError};
