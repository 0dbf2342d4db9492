//! Global user-agent popularity table.
//!
//! Counts requests per exact user-agent string across all sources. The
//! table is bounded: once `max_entries` strings are tracked, unseen strings
//! are not added and carry no signal. Entries not seen for the configured
//! TTL are dropped by the request sweep.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct UserAgentEntry {
    count: u64,
    last_seen: Instant,
}

/// A user agent and its global request count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAgentCount {
    pub user_agent: String,
    pub count: u64,
}

#[derive(Debug, Default)]
pub(crate) struct UserAgentTable {
    entries: DashMap<String, UserAgentEntry>,
    /// Mirrors `entries.len()` without locking every shard.
    tracked: AtomicUsize,
}

impl UserAgentTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Count one request bearing `user_agent`.
    ///
    /// Returns the updated count, or `None` if the string is new and the
    /// table is full.
    pub(crate) fn record(&self, user_agent: &str, now: Instant, max_entries: usize) -> Option<u64> {
        if let Some(mut entry) = self.entries.get_mut(user_agent) {
            entry.count = entry.count.saturating_add(1);
            entry.last_seen = now;
            return Some(entry.count);
        }

        if self.tracked.load(Ordering::Relaxed) >= max_entries {
            return None;
        }

        let mut entry = match self.entries.entry(user_agent.to_owned()) {
            Entry::Occupied(entry) => entry.into_ref(),
            Entry::Vacant(entry) => {
                self.tracked.fetch_add(1, Ordering::Relaxed);
                entry.insert(UserAgentEntry { count: 0, last_seen: now })
            }
        };
        entry.count = entry.count.saturating_add(1);
        entry.last_seen = now;
        Some(entry.count)
    }

    pub(crate) fn count(&self, user_agent: &str) -> Option<u64> {
        self.entries.get(user_agent).map(|e| e.count)
    }

    /// Drop entries not seen within `ttl`. Returns how many were removed.
    pub(crate) fn evict_unseen(&self, now: Instant, ttl: Duration) -> usize {
        let mut evicted = 0;
        self.entries.retain(|_, entry| {
            let keep = now.saturating_duration_since(entry.last_seen) < ttl;
            if !keep {
                evicted += 1;
            }
            keep
        });
        self.tracked.fetch_sub(evicted, Ordering::Relaxed);
        evicted
    }

    pub(crate) fn len(&self) -> usize {
        self.tracked.load(Ordering::Relaxed)
    }

    /// The `limit` most frequent user agents, highest count first.
    pub(crate) fn top(&self, limit: usize) -> Vec<UserAgentCount> {
        let mut all: Vec<UserAgentCount> = self
            .entries
            .iter()
            .map(|e| UserAgentCount {
                user_agent: e.key().clone(),
                count: e.count,
            })
            .collect();
        all.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.user_agent.cmp(&b.user_agent)));
        all.truncate(limit);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_across_calls() {
        let table = UserAgentTable::new();
        let now = Instant::now();
        assert_eq!(table.record("curl/8.0", now, 10), Some(1));
        assert_eq!(table.record("curl/8.0", now, 10), Some(2));
        assert_eq!(table.count("curl/8.0"), Some(2));
        assert_eq!(table.count("wget"), None);
    }

    #[test]
    fn full_table_ignores_new_strings_but_counts_known_ones() {
        let table = UserAgentTable::new();
        let now = Instant::now();
        table.record("a", now, 2);
        table.record("b", now, 2);

        assert_eq!(table.record("c", now, 2), None);
        assert_eq!(table.record("a", now, 2), Some(2));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn evicts_entries_past_ttl() {
        let table = UserAgentTable::new();
        let t0 = Instant::now();
        table.record("old", t0, 10);
        table.record("fresh", t0 + Duration::from_secs(50), 10);

        assert_eq!(table.evict_unseen(t0 + Duration::from_secs(60), Duration::from_secs(60)), 1);
        assert_eq!(table.count("old"), None);
        assert_eq!(table.count("fresh"), Some(1));
        assert_eq!(table.len(), 1);

        // Room freed by eviction is usable again.
        assert_eq!(table.record("new", t0 + Duration::from_secs(60), 2), Some(1));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn top_orders_by_count() {
        let table = UserAgentTable::new();
        let now = Instant::now();
        for _ in 0..3 {
            table.record("busy", now, 10);
        }
        table.record("quiet", now, 10);

        let top = table.top(1);
        assert_eq!(top, vec![UserAgentCount { user_agent: "busy".into(), count: 3 }]);
    }
}
