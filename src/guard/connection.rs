//! Connection-level flood protection.
//!
//! Consulted once per accepted TCP connection. Tracks, per source:
//! - concurrently open connections (soft cap, released by the caller),
//! - connection starts per rate window (SYN flood),
//! - admission events per rate window (packet flood).
//!
//! Tripping either rate window blacklists the source for
//! `blacklist_duration_secs`; while blacklisted every call is denied without
//! touching the counters.

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ConnectionGuardConfig;
use crate::guard::clock::{Clock, SystemClock};
use crate::guard::source::SourceKey;
use crate::guard::sweep::Sweep;
use crate::guard::window::WindowCounter;
use crate::observability::logging::SECURITY_TARGET;
use crate::observability::metrics;

const GUARD: &str = "connection";

#[derive(Debug)]
struct ConnectionRecord {
    active_connections: u32,
    last_activity: Instant,
    packets: WindowCounter,
    syns: WindowCounter,
}

impl ConnectionRecord {
    fn new(now: Instant) -> Self {
        Self {
            active_connections: 0,
            last_activity: now,
            packets: WindowCounter::new(now),
            syns: WindowCounter::new(now),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Admit,
    Blacklisted,
    SynFlood,
    PacketFlood,
    ConnectionCap,
    Capacity,
}

impl Verdict {
    fn is_admit(self) -> bool {
        self == Verdict::Admit
    }

    fn reason(self) -> &'static str {
        match self {
            Verdict::Admit => "ok",
            Verdict::Blacklisted => "blacklisted",
            Verdict::SynFlood => "syn_flood",
            Verdict::PacketFlood => "packet_flood",
            Verdict::ConnectionCap => "connection_cap",
            Verdict::Capacity => "capacity",
        }
    }
}

/// Aggregate view of the guard's tables.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStats {
    pub tracked_sources: usize,
    pub blacklisted_sources: usize,
    pub active_connections: u64,
}

/// A currently blacklisted source.
#[derive(Debug, Clone, Serialize)]
pub struct BlacklistedSource {
    pub source: SourceKey,
    pub age_secs: u64,
    pub remaining_secs: u64,
}

/// Per-source connection tracker and blacklist.
pub struct ConnectionGuard {
    records: DashMap<SourceKey, ConnectionRecord>,
    /// Mirrors `records.len()` without locking every shard.
    tracked: AtomicUsize,
    blacklist: DashMap<SourceKey, Instant>,
    config: ArcSwap<ConnectionGuardConfig>,
    clock: Arc<dyn Clock>,
}

impl ConnectionGuard {
    pub fn new(config: ConnectionGuardConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ConnectionGuardConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            tracked: AtomicUsize::new(0),
            blacklist: DashMap::new(),
            config: ArcSwap::from_pointee(config),
            clock,
        }
    }

    /// Decide whether to admit a connection from `source`.
    ///
    /// `is_connection_start` marks a fresh connection attempt and feeds the
    /// SYN-rate window. Every admitted call must be paired with one
    /// [`release`](Self::release).
    pub fn try_admit(&self, source: impl Into<SourceKey>, is_connection_start: bool) -> bool {
        let source = source.into();
        let verdict = self.evaluate(source, is_connection_start);
        metrics::record_decision(GUARD, verdict.is_admit(), verdict.reason());

        match verdict {
            Verdict::Admit => tracing::trace!(%source, "Connection admitted"),
            Verdict::SynFlood | Verdict::PacketFlood => tracing::warn!(
                target: SECURITY_TARGET,
                %source,
                reason = verdict.reason(),
                "Source blacklisted"
            ),
            _ => tracing::debug!(%source, reason = verdict.reason(), "Connection denied"),
        }

        verdict.is_admit()
    }

    /// Give back a connection slot. No-op for unknown sources; never
    /// drops below zero.
    pub fn release(&self, source: impl Into<SourceKey>) {
        let source = source.into();
        if let Some(mut record) = self.records.get_mut(&source) {
            record.active_connections = record.active_connections.saturating_sub(1);
        }
    }

    fn evaluate(&self, source: SourceKey, is_connection_start: bool) -> Verdict {
        let config = self.config.load();
        let now = self.clock.now();

        if self.check_blacklist(&source, now, config.blacklist_duration()) {
            return Verdict::Blacklisted;
        }

        let window = config.rate_window();
        let mut record = match self.records.entry(source) {
            Entry::Occupied(entry) => entry.into_ref(),
            Entry::Vacant(entry) => {
                if self.tracked.load(Ordering::Relaxed) >= config.max_tracked_sources {
                    return Verdict::Capacity;
                }
                self.tracked.fetch_add(1, Ordering::Relaxed);
                entry.insert(ConnectionRecord::new(now))
            }
        };
        record.last_activity = now;

        if is_connection_start && record.syns.hit(now, window) > config.syn_flood_threshold {
            drop(record);
            self.blacklist_source(source, now, config.blacklist_duration());
            return Verdict::SynFlood;
        }

        if record.packets.hit(now, window) > config.packet_rate_threshold {
            drop(record);
            self.blacklist_source(source, now, config.blacklist_duration());
            return Verdict::PacketFlood;
        }

        if record.active_connections >= config.max_connections_per_source {
            return Verdict::ConnectionCap;
        }

        record.active_connections += 1;
        Verdict::Admit
    }

    /// Blacklist lookup that drops an expired entry on the way.
    fn check_blacklist(&self, source: &SourceKey, now: Instant, duration: Duration) -> bool {
        let expired = self
            .blacklist
            .remove_if(source, |_, at| now.saturating_duration_since(*at) >= duration);
        if expired.is_some() {
            tracing::info!(target: SECURITY_TARGET, %source, "Blacklist entry expired");
            return false;
        }
        self.blacklist.contains_key(source)
    }

    fn blacklist_source(&self, source: SourceKey, now: Instant, duration: Duration) {
        self.blacklist
            .entry(source)
            .and_modify(|at| {
                if now.saturating_duration_since(*at) >= duration {
                    *at = now;
                }
            })
            .or_insert(now);
    }

    /// Open connections currently counted for `source`.
    pub fn active_connections(&self, source: impl Into<SourceKey>) -> Option<u32> {
        self.records
            .get(&source.into())
            .map(|r| r.active_connections)
    }

    /// Whether `source` is inside an unexpired blacklist period.
    pub fn is_blacklisted(&self, source: impl Into<SourceKey>) -> bool {
        let duration = self.config.load().blacklist_duration();
        let now = self.clock.now();
        self.blacklist
            .get(&source.into())
            .is_some_and(|at| now.saturating_duration_since(*at) < duration)
    }

    pub fn snapshot(&self) -> ConnectionStats {
        let active_connections = self
            .records
            .iter()
            .map(|r| u64::from(r.active_connections))
            .sum();
        ConnectionStats {
            tracked_sources: self.records.len(),
            blacklisted_sources: self.blacklist.len(),
            active_connections,
        }
    }

    /// Unexpired blacklist entries, longest remaining first.
    pub fn blacklisted_sources(&self) -> Vec<BlacklistedSource> {
        let duration = self.config.load().blacklist_duration();
        let now = self.clock.now();
        let mut entries: Vec<BlacklistedSource> = self
            .blacklist
            .iter()
            .filter_map(|entry| {
                let age = now.saturating_duration_since(*entry.value());
                (age < duration).then(|| BlacklistedSource {
                    source: *entry.key(),
                    age_secs: age.as_secs(),
                    remaining_secs: (duration - age).as_secs(),
                })
            })
            .collect();
        entries.sort_by(|a, b| b.remaining_secs.cmp(&a.remaining_secs));
        entries
    }

    pub fn config(&self) -> Arc<ConnectionGuardConfig> {
        self.config.load_full()
    }

    /// Swap in new thresholds. Existing records and blacklist entries are kept.
    pub fn update_config(&self, config: ConnectionGuardConfig) {
        self.config.store(Arc::new(config));
        tracing::info!(guard = GUARD, "Thresholds updated");
    }
}

impl Sweep for ConnectionGuard {
    const NAME: &'static str = GUARD;

    fn sweep_interval(&self) -> Duration {
        self.config.load().sweep_interval()
    }

    fn sweep(&self) -> usize {
        let config = self.config.load();
        let now = self.clock.now();

        let idle_timeout = config.idle_timeout();
        let mut idle = 0;
        self.records.retain(|_, record| {
            let keep = now.saturating_duration_since(record.last_activity) <= idle_timeout;
            if !keep {
                idle += 1;
            }
            keep
        });
        self.tracked.fetch_sub(idle, Ordering::Relaxed);

        let blacklist_duration = config.blacklist_duration();
        let mut expired = 0;
        self.blacklist.retain(|_, at| {
            let keep = now.saturating_duration_since(*at) < blacklist_duration;
            if !keep {
                expired += 1;
            }
            keep
        });

        metrics::record_evictions(GUARD, "records", idle);
        metrics::record_evictions(GUARD, "blacklist", expired);
        metrics::record_tracked_sources(GUARD, self.records.len());
        metrics::record_blacklist_size(self.blacklist.len());

        idle + expired
    }
}
