//! Request-level flood and botnet detection.
//!
//! Consulted once per request after the connection has been admitted. Per
//! source it keeps a request window (reset after `request_window_secs`), the
//! set of distinct user agents seen, and separate TCP/UDP flood windows.
//! Across sources it keeps the global user-agent popularity table.
//!
//! A request is denied when the source floods its window, or when the botnet
//! heuristic fires on any of:
//! - too many distinct user agents from one source,
//! - sustained volume above `botnet_request_threshold` in one window,
//! - a user agent shared by more than `suspicious_user_agent_threshold` requests.

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RequestGuardConfig;
use crate::guard::clock::{Clock, SystemClock};
use crate::guard::source::SourceKey;
use crate::guard::sweep::Sweep;
use crate::guard::user_agent::{UserAgentCount, UserAgentTable};
use crate::guard::window::WindowCounter;
use crate::observability::logging::SECURITY_TARGET;
use crate::observability::metrics;

const GUARD: &str = "request";

/// Transport a non-HTTP observation arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Tcp,
    Udp,
}

#[derive(Debug)]
struct RequestRecord {
    request_count: u32,
    http_flood_count: u32,
    window_start: Instant,
    last_request: Instant,
    user_agents: HashSet<String>,
}

impl RequestRecord {
    fn new(now: Instant) -> Self {
        Self {
            request_count: 0,
            http_flood_count: 0,
            window_start: now,
            last_request: now,
            user_agents: HashSet::new(),
        }
    }

    /// Roll the window if it has run its length, then count the request.
    fn count_request(&mut self, now: Instant, window: Duration) {
        if now.saturating_duration_since(self.window_start) >= window {
            self.request_count = 0;
            self.http_flood_count = 0;
            self.window_start = now;
        }
        self.request_count = self.request_count.saturating_add(1);
        self.last_request = now;
    }
}

#[derive(Debug)]
struct TransportFloods {
    tcp: WindowCounter,
    udp: WindowCounter,
}

impl TransportFloods {
    fn new(now: Instant) -> Self {
        Self {
            tcp: WindowCounter::new(now),
            udp: WindowCounter::new(now),
        }
    }

    fn counter_mut(&mut self, transport: Transport) -> &mut WindowCounter {
        match transport {
            Transport::Tcp => &mut self.tcp,
            Transport::Udp => &mut self.udp,
        }
    }

    fn is_stale(&self, now: Instant, window: Duration) -> bool {
        self.tcp.is_expired(now, window) && self.udp.is_expired(now, window)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Admit,
    HttpFlood,
    TcpFlood,
    UdpFlood,
    BotnetUserAgents,
    BotnetVolume,
    BotnetSignature,
    Capacity,
}

impl Verdict {
    fn is_admit(self) -> bool {
        self == Verdict::Admit
    }

    fn reason(self) -> &'static str {
        match self {
            Verdict::Admit => "ok",
            Verdict::HttpFlood => "http_flood",
            Verdict::TcpFlood => "tcp_flood",
            Verdict::UdpFlood => "udp_flood",
            Verdict::BotnetUserAgents => "botnet_user_agents",
            Verdict::BotnetVolume => "botnet_volume",
            Verdict::BotnetSignature => "botnet_signature",
            Verdict::Capacity => "capacity",
        }
    }
}

/// Aggregate view of the guard's tables.
#[derive(Debug, Clone, Serialize)]
pub struct RequestStats {
    pub tracked_sources: usize,
    pub tracked_user_agents: usize,
    pub transport_counters: usize,
}

/// Per-source request tracker with botnet heuristics.
pub struct RequestGuard {
    records: DashMap<SourceKey, RequestRecord>,
    /// Mirrors `records.len()` without locking every shard.
    tracked: AtomicUsize,
    transport: DashMap<SourceKey, TransportFloods>,
    user_agents: UserAgentTable,
    config: ArcSwap<RequestGuardConfig>,
    clock: Arc<dyn Clock>,
}

impl RequestGuard {
    pub fn new(config: RequestGuardConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RequestGuardConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            tracked: AtomicUsize::new(0),
            transport: DashMap::new(),
            user_agents: UserAgentTable::new(),
            config: ArcSwap::from_pointee(config),
            clock,
        }
    }

    /// Decide whether to serve an HTTP request from `source`.
    ///
    /// An empty `user_agent` means the header was absent; it is not an error
    /// and contributes no user-agent signal.
    pub fn try_admit(&self, source: impl Into<SourceKey>, user_agent: &str) -> bool {
        let source = source.into();
        let verdict = self.evaluate_http(source, user_agent);
        self.report(source, verdict)
    }

    /// Decide whether to accept a raw TCP or UDP observation from `source`.
    ///
    /// Counts toward the same request window as HTTP traffic, with its own
    /// per-protocol flood threshold.
    pub fn try_admit_transport(&self, source: impl Into<SourceKey>, transport: Transport) -> bool {
        let source = source.into();
        let verdict = self.evaluate_transport(source, transport);
        self.report(source, verdict)
    }

    fn report(&self, source: SourceKey, verdict: Verdict) -> bool {
        metrics::record_decision(GUARD, verdict.is_admit(), verdict.reason());
        match verdict {
            Verdict::Admit => tracing::trace!(%source, "Request admitted"),
            Verdict::Capacity => tracing::debug!(%source, reason = verdict.reason(), "Request denied"),
            _ => tracing::warn!(
                target: SECURITY_TARGET,
                %source,
                reason = verdict.reason(),
                "Suspicious request activity"
            ),
        }
        verdict.is_admit()
    }

    fn evaluate_http(&self, source: SourceKey, user_agent: &str) -> Verdict {
        let config = self.config.load();
        let now = self.clock.now();

        let Some(mut record) = self.record_for(source, now, &config) else {
            return Verdict::Capacity;
        };
        record.count_request(now, config.request_window());

        record.http_flood_count = record.http_flood_count.saturating_add(1);
        if record.http_flood_count > config.http_flood_threshold {
            return Verdict::HttpFlood;
        }

        let mut signature_count = None;
        if !user_agent.is_empty() {
            // Past the fan-out limit the rule has already fired; stop growing the set.
            if record.user_agents.len() <= config.max_user_agents_per_source {
                record.user_agents.insert(user_agent.to_owned());
            }
            // A source already denied for fan-out does not feed the global table.
            if record.user_agents.len() > config.max_user_agents_per_source {
                return Verdict::BotnetUserAgents;
            }
            signature_count = self
                .user_agents
                .record(user_agent, now, config.max_tracked_user_agents);
        }

        botnet_verdict(&record, signature_count, &config)
    }

    fn evaluate_transport(&self, source: SourceKey, transport: Transport) -> Verdict {
        let config = self.config.load();
        let now = self.clock.now();

        let Some(mut record) = self.record_for(source, now, &config) else {
            return Verdict::Capacity;
        };
        record.count_request(now, config.request_window());

        let (threshold, flooded) = match transport {
            Transport::Tcp => (config.tcp_flood_threshold, Verdict::TcpFlood),
            Transport::Udp => (config.udp_flood_threshold, Verdict::UdpFlood),
        };
        let count = self
            .transport
            .entry(source)
            .or_insert_with(|| TransportFloods::new(now))
            .counter_mut(transport)
            .hit(now, config.transport_window());
        if count > threshold {
            return flooded;
        }

        botnet_verdict(&record, None, &config)
    }

    /// Get-or-create the record for `source`; `None` when the table is full.
    fn record_for(
        &self,
        source: SourceKey,
        now: Instant,
        config: &RequestGuardConfig,
    ) -> Option<RefMut<'_, SourceKey, RequestRecord>> {
        match self.records.entry(source) {
            Entry::Occupied(entry) => Some(entry.into_ref()),
            Entry::Vacant(entry) => {
                if self.tracked.load(Ordering::Relaxed) >= config.max_tracked_sources {
                    return None;
                }
                self.tracked.fetch_add(1, Ordering::Relaxed);
                Some(entry.insert(RequestRecord::new(now)))
            }
        }
    }

    /// Requests counted for `source` in its current window.
    pub fn request_count(&self, source: impl Into<SourceKey>) -> Option<u32> {
        self.records.get(&source.into()).map(|r| r.request_count)
    }

    /// Distinct user agents recorded for `source`.
    pub fn distinct_user_agents(&self, source: impl Into<SourceKey>) -> Option<usize> {
        self.records
            .get(&source.into())
            .map(|r| r.user_agents.len())
    }

    /// Global request count for `user_agent`.
    pub fn user_agent_count(&self, user_agent: &str) -> Option<u64> {
        self.user_agents.count(user_agent)
    }

    pub fn top_user_agents(&self, limit: usize) -> Vec<UserAgentCount> {
        self.user_agents.top(limit)
    }

    pub fn snapshot(&self) -> RequestStats {
        RequestStats {
            tracked_sources: self.records.len(),
            tracked_user_agents: self.user_agents.len(),
            transport_counters: self.transport.len(),
        }
    }

    pub fn config(&self) -> Arc<RequestGuardConfig> {
        self.config.load_full()
    }

    /// Swap in new thresholds. Existing records are kept.
    pub fn update_config(&self, config: RequestGuardConfig) {
        self.config.store(Arc::new(config));
        tracing::info!(guard = GUARD, "Thresholds updated");
    }
}

fn botnet_verdict(
    record: &RequestRecord,
    signature_count: Option<u64>,
    config: &RequestGuardConfig,
) -> Verdict {
    if record.user_agents.len() > config.max_user_agents_per_source {
        Verdict::BotnetUserAgents
    } else if record.request_count > config.botnet_request_threshold {
        Verdict::BotnetVolume
    } else if signature_count.is_some_and(|count| count > config.suspicious_user_agent_threshold) {
        Verdict::BotnetSignature
    } else {
        Verdict::Admit
    }
}

impl Sweep for RequestGuard {
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
            let keep = now.saturating_duration_since(record.last_request) <= idle_timeout;
            if !keep {
                idle += 1;
            }
            keep
        });
        self.tracked.fetch_sub(idle, Ordering::Relaxed);

        let transport_window = config.transport_window();
        let mut stale_floods = 0;
        self.transport.retain(|_, floods| {
            let keep = !floods.is_stale(now, transport_window);
            if !keep {
                stale_floods += 1;
            }
            keep
        });

        let unseen_agents = self.user_agents.evict_unseen(now, config.user_agent_ttl());

        metrics::record_evictions(GUARD, "records", idle);
        metrics::record_evictions(GUARD, "transport", stale_floods);
        metrics::record_evictions(GUARD, "user_agents", unseen_agents);
        metrics::record_tracked_sources(GUARD, self.records.len());
        metrics::record_tracked_user_agents(self.user_agents.len());

        idle + stale_floods + unseen_agents
    }
}
