//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Admitted TCP connection
//!     → server.rs (single bounded read)
//!     → request.rs (User-Agent extraction)
//!     → RequestGuard::try_admit
//!     → response.rs (fixed page) or close
//! ```
//!
//! Only the User-Agent header is looked at; nothing else is parsed.

pub mod request;
pub mod response;
pub mod server;

pub use request::extract_user_agent;
pub use server::GuardServer;
