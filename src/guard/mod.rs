//! Admission decision engine.
//!
//! # Data Flow
//! ```text
//! Accepted TCP connection
//!     → connection.rs (blacklist, SYN/packet windows, per-source cap)
//!     → [caller reads request, extracts User-Agent]
//!     → request.rs (request window, flood, botnet heuristics)
//!     → [caller responds]
//!     → connection.rs release on teardown
//!
//! Background:
//!     sweep.rs → each guard's sweep() on its own interval
//! ```
//!
//! # Design Decisions
//! - The two guards share no storage; each owns its tables
//! - Per-key locking (DashMap shards), never one global lock
//! - Decisions are bool; the reason goes to logs and metrics only
//! - Full tables deny new sources (fail closed)
//! - No I/O: decisions depend only on map state and the clock

pub mod clock;
pub mod connection;
pub mod request;
pub mod source;
pub mod sweep;
pub mod user_agent;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use connection::{BlacklistedSource, ConnectionGuard, ConnectionStats};
pub use request::{RequestGuard, RequestStats, Transport};
pub use source::SourceKey;
pub use sweep::{spawn_sweeper, Sweep};
pub use user_agent::UserAgentCount;
