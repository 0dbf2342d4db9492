//! Guard behaviour under simulated time and concurrent callers.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use flood_guard::config::{ConnectionGuardConfig, RequestGuardConfig};
use flood_guard::guard::{spawn_sweeper, ManualClock, Sweep};
use flood_guard::{ConnectionGuard, RequestGuard, Shutdown, Transport};

fn ip(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(198, 51, 100, last))
}

fn connection_guard(config: ConnectionGuardConfig) -> (Arc<ConnectionGuard>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    (Arc::new(ConnectionGuard::with_clock(config, clock.clone())), clock)
}

fn request_guard(config: RequestGuardConfig) -> (Arc<RequestGuard>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    (Arc::new(RequestGuard::with_clock(config, clock.clone())), clock)
}

#[test]
fn connection_burst_blacklists_after_threshold() {
    let (guard, _clock) = connection_guard(ConnectionGuardConfig::default());
    let source = ip(1);

    for call in 1..=100 {
        assert!(guard.try_admit(source, true), "call {call} should be admitted");
        guard.release(source);
    }

    assert!(!guard.try_admit(source, true));
    assert!(guard.is_blacklisted(source));

    for _ in 102..=501 {
        assert!(!guard.try_admit(source, true));
    }
    assert_eq!(guard.active_connections(source), Some(0));
    assert_eq!(guard.snapshot().blacklisted_sources, 1);
}

#[test]
fn blacklist_lasts_exactly_its_duration() {
    let (guard, clock) = connection_guard(ConnectionGuardConfig {
        syn_flood_threshold: 1,
        ..ConnectionGuardConfig::default()
    });
    let source = ip(2);

    assert!(guard.try_admit(source, true));
    guard.release(source);
    assert!(!guard.try_admit(source, true));

    clock.advance(Duration::from_secs(30 * 60 - 1));
    assert!(!guard.try_admit(source, false));
    assert_eq!(guard.blacklisted_sources()[0].remaining_secs, 1);

    clock.advance(Duration::from_secs(1));
    assert!(guard.try_admit(source, false));
    assert!(!guard.is_blacklisted(source));
}

#[test]
fn packet_flood_outlives_its_window() {
    let (guard, clock) = connection_guard(ConnectionGuardConfig {
        packet_rate_threshold: 10,
        ..ConnectionGuardConfig::default()
    });
    let source = ip(3);

    for _ in 0..10 {
        assert!(guard.try_admit(source, false));
        guard.release(source);
    }
    assert!(!guard.try_admit(source, false));

    // The rate window has rolled, the blacklist has not.
    clock.advance(Duration::from_secs(5));
    assert!(!guard.try_admit(source, false));
}

#[test]
fn other_sources_are_unaffected_by_a_blacklist() {
    let (guard, _clock) = connection_guard(ConnectionGuardConfig {
        syn_flood_threshold: 1,
        ..ConnectionGuardConfig::default()
    });

    assert!(guard.try_admit(ip(4), true));
    assert!(!guard.try_admit(ip(4), true));
    assert!(guard.try_admit(ip(5), true));
}

#[test]
fn double_release_stays_at_zero() {
    let (guard, _clock) = connection_guard(ConnectionGuardConfig::default());
    let source = ip(6);

    assert!(guard.try_admit(source, true));
    guard.release(source);
    guard.release(source);
    assert_eq!(guard.active_connections(source), Some(0));

    assert!(guard.try_admit(source, true));
    assert_eq!(guard.active_connections(source), Some(1));
}

#[test]
fn distinct_user_agent_burst_trips_fan_out_before_flood() {
    let (guard, clock) = request_guard(RequestGuardConfig::default());
    let source = ip(7);

    for n in 1..=10 {
        assert!(guard.try_admit(source, &format!("agent-{n}")), "request {n}");
    }
    for n in 11..=200 {
        assert!(!guard.try_admit(source, &format!("agent-{n}")), "request {n}");
    }
    assert!(!guard.try_admit(source, "agent-201"));
    assert_eq!(guard.request_count(source), Some(201));

    // Fan-out is remembered across windows while the record lives.
    clock.advance(Duration::from_secs(61));
    assert!(!guard.try_admit(source, "agent-1"));
    assert_eq!(guard.request_count(source), Some(1));
    assert_eq!(guard.distinct_user_agents(source), Some(11));
}

#[test]
fn flooded_source_recovers_when_window_rolls() {
    let (guard, clock) = request_guard(RequestGuardConfig {
        suspicious_user_agent_threshold: u64::MAX,
        ..RequestGuardConfig::default()
    });
    let source = ip(16);
    let agent = "Mozilla/5.0 (X11; Linux x86_64)";

    for n in 1..=200 {
        assert!(guard.try_admit(source, agent), "request {n}");
    }
    for _ in 0..50 {
        assert!(!guard.try_admit(source, agent));
    }

    clock.advance(Duration::from_secs(59));
    assert!(!guard.try_admit(source, agent));

    clock.advance(Duration::from_secs(1));
    assert!(guard.try_admit(source, agent));
    assert_eq!(guard.request_count(source), Some(1));

    // Other sources were never affected.
    assert!(guard.try_admit(ip(17), agent));
}

#[test]
fn steady_source_is_admitted_across_windows() {
    let (guard, clock) = request_guard(RequestGuardConfig::default());
    let source = ip(8);

    for window in 0..3 {
        for n in 0..200 {
            let agent = format!("browser-{}", n % 10);
            assert!(guard.try_admit(source, &agent), "window {window} request {n}");
        }
        clock.advance(Duration::from_secs(60));
    }
    assert_eq!(guard.distinct_user_agents(source), Some(10));
}

#[test]
fn transport_flood_is_per_protocol() {
    let (guard, _clock) = request_guard(RequestGuardConfig {
        tcp_flood_threshold: 3,
        udp_flood_threshold: 3,
        ..RequestGuardConfig::default()
    });
    let source = ip(9);

    for _ in 0..3 {
        assert!(guard.try_admit_transport(source, Transport::Tcp));
    }
    assert!(!guard.try_admit_transport(source, Transport::Tcp));
    assert!(guard.try_admit_transport(source, Transport::Udp));
}

#[test]
fn concurrent_admit_and_release_balance_out() {
    let (guard, clock) = connection_guard(ConnectionGuardConfig {
        max_connections_per_source: 1_000,
        syn_flood_threshold: u32::MAX,
        packet_rate_threshold: u32::MAX,
        ..ConnectionGuardConfig::default()
    });
    let source = ip(10);

    // Make the record stale so sweeps race against the refreshing admits.
    assert!(guard.try_admit(source, true));
    guard.release(source);
    clock.advance(Duration::from_secs(301));

    let evicted = std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..500 {
                    if guard.try_admit(source, true) {
                        guard.release(source);
                    }
                }
            });
        }
        let sweeper = scope.spawn(|| (0..200).map(|_| guard.sweep()).sum::<usize>());
        sweeper.join().unwrap()
    });

    // At most the stale record goes; a refreshed one is never evicted.
    assert!(evicted <= 1, "evicted {evicted}");
    assert_eq!(guard.active_connections(source), Some(0));
    assert_eq!(guard.snapshot().tracked_sources, 1);

    clock.advance(Duration::from_secs(301));
    assert_eq!(guard.sweep(), 1);
    assert_eq!(guard.snapshot().tracked_sources, 0);
}

#[test]
fn concurrent_requests_lose_no_updates() {
    let (guard, _clock) = request_guard(RequestGuardConfig {
        http_flood_threshold: u32::MAX,
        botnet_request_threshold: u32::MAX,
        suspicious_user_agent_threshold: u64::MAX,
        ..RequestGuardConfig::default()
    });
    let source = ip(11);

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..1_000 {
                    assert!(guard.try_admit(source, "shared-agent"));
                }
            });
        }
    });

    assert_eq!(guard.request_count(source), Some(8_000));
    assert_eq!(guard.user_agent_count("shared-agent"), Some(8_000));
    assert_eq!(guard.snapshot().tracked_sources, 1);
}

#[test]
fn capacity_denies_new_sources_only() {
    let (guard, _clock) = connection_guard(ConnectionGuardConfig {
        max_tracked_sources: 2,
        ..ConnectionGuardConfig::default()
    });

    assert!(guard.try_admit(ip(12), true));
    assert!(guard.try_admit(ip(13), true));
    assert!(!guard.try_admit(ip(14), true));
    assert!(guard.try_admit(ip(12), true));
}

#[tokio::test]
async fn sweeper_task_evicts_and_stops_on_shutdown() {
    let (guard, clock) = request_guard(RequestGuardConfig {
        sweep_interval_secs: 1,
        ..RequestGuardConfig::default()
    });
    assert!(guard.try_admit(ip(15), "agent"));
    clock.advance(Duration::from_secs(3601));

    let shutdown = Shutdown::new();
    let handle = spawn_sweeper(guard.clone(), shutdown.subscribe());

    let mut evicted = false;
    for _ in 0..30 {
        if guard.snapshot().tracked_sources == 0 {
            evicted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(evicted);
    assert_eq!(guard.user_agent_count("agent"), None);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("sweeper should stop")
        .unwrap();
}
