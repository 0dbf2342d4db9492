//! Inline abuse mitigation for network-facing servers.
//!
//! The core is [`guard`]: a [`ConnectionGuard`] consulted when a TCP
//! connection is accepted and a [`RequestGuard`] consulted per request.
//! Everything else wires those guards into a runnable server.

pub mod admin;
pub mod config;
pub mod guard;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::GuardConfig;
pub use guard::{ConnectionGuard, RequestGuard, SourceKey, Transport};
pub use http::GuardServer;
pub use lifecycle::Shutdown;
