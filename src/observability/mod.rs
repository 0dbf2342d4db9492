//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Guards and server produce:
//!     → logging.rs (structured log events, security target)
//!     → metrics.rs (decision counters, table gauges)
//!
//! Consumers:
//!     → stdout and optional daily log files
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Blocked traffic is logged on a dedicated target so it can be filtered or routed separately
//! - Metrics are cheap (atomic increments) and no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
