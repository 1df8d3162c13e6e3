use crate::config::ServerConfig;
use crate::handlers::{HandlerRegistry, UnconnectedEngine};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Process-wide Prometheus recorder. A recorder can only be installed once,
/// so every router built in this process shares it.
static PROMETHEUS: OnceCell<PrometheusHandle> = OnceCell::new();

fn prometheus_handle() -> Option<PrometheusHandle> {
    PROMETHEUS
        .get_or_try_init(|| PrometheusBuilder::new().install_recorder())
        .map_err(|err| tracing::warn!(error = %err, "metrics recorder unavailable"))
        .ok()
        .cloned()
}

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Fixed-window request counters per client key
    pub rate_limiter: Arc<RateLimiter>,

    /// Operation dispatch table
    pub handlers: Arc<HandlerRegistry>,

    /// Renders `/metrics` when metrics are enabled
    pub metrics: Option<PrometheusHandle>,
}

impl ServerState {
    /// State with every operation bound to the unconnected document engine.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_handlers(config, HandlerRegistry::from(UnconnectedEngine))
    }

    pub fn with_handlers(config: ServerConfig, handlers: HandlerRegistry) -> Self {
        let rate_limiter = RateLimiter::new(
            config.rate_limit_per_minute,
            config.rate_limit_window(),
            config.rate_limit_max_clients,
        );
        let metrics = if config.metrics_enabled {
            prometheus_handle()
        } else {
            None
        };

        Self {
            config: Arc::new(config),
            rate_limiter: Arc::new(rate_limiter),
            handlers: Arc::new(handlers),
            metrics,
        }
    }
}

/// One client's counter within the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub expires_at: Instant,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    /// Store is full of live clients; the request passes without a counter.
    Untracked,
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        !matches!(self, RateDecision::Limited { .. })
    }
}

/// Fixed-window limiter over a sharded map.
///
/// The `DashMap` entry guard holds the shard lock for the whole
/// read-modify-write, so two requests from one client can never both see
/// the same count.
#[derive(Debug)]
pub struct RateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    limit: u32,
    window: Duration,
    max_clients: usize,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration, max_clients: usize) -> Self {
        Self {
            entries: DashMap::new(),
            limit,
            window,
            max_clients,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Number of clients currently tracked
    pub fn tracked_clients(&self) -> usize {
        self.entries.len()
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    /// Count one request from `key` at `now`.
    ///
    /// The store never keeps more than `max_clients` first-time entries:
    /// a new client that lands past the cap after its insert gives the slot
    /// back and is admitted untracked.
    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        // Never call len() while holding an entry guard: it takes every shard lock.
        if !self.entries.contains_key(key) && self.entries.len() >= self.max_clients {
            self.sweep_at(now);
            if self.entries.len() >= self.max_clients {
                return self.untracked();
            }
        }

        let fresh = RateLimitEntry {
            count: 1,
            expires_at: now + self.window,
        };
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => return self.advance(occupied.get_mut(), now),
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
            }
        }

        if self.entries.len() > self.max_clients
            && self.entries.remove_if(key, |_, entry| *entry == fresh).is_some()
        {
            return self.untracked();
        }

        RateDecision::Allowed {
            remaining: self.limit.saturating_sub(1),
        }
    }

    fn advance(&self, state: &mut RateLimitEntry, now: Instant) -> RateDecision {
        if now >= state.expires_at {
            *state = RateLimitEntry {
                count: 1,
                expires_at: now + self.window,
            };
            return RateDecision::Allowed {
                remaining: self.limit.saturating_sub(1),
            };
        }

        if state.count < self.limit {
            state.count += 1;
            return RateDecision::Allowed {
                remaining: self.limit - state.count,
            };
        }

        RateDecision::Limited {
            retry_after: state.expires_at.saturating_duration_since(now),
        }
    }

    fn untracked(&self) -> RateDecision {
        tracing::warn!(
            max_clients = self.max_clients,
            "rate limit store full, admitting client untracked"
        );
        RateDecision::Untracked
    }

    /// Drop every entry whose window has closed. Returns how many were removed.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    /// Sweep expired entries once per window until the runtime shuts down.
    pub fn spawn_sweeper(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.window);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = self.sweep_at(Instant::now());
                if removed > 0 {
                    tracing::debug!(removed, remaining = self.tracked_clients(), "rate limit sweep");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32) -> RateLimiter {
        RateLimiter::new(limit, Duration::from_secs(60), 1000)
    }

    #[test]
    fn test_ceiling_then_reject() {
        let rl = limiter(3);
        let now = Instant::now();
        for expected in [2, 1, 0] {
            assert_eq!(
                rl.check_at("1.2.3.4", now),
                RateDecision::Allowed {
                    remaining: expected
                }
            );
        }
        match rl.check_at("1.2.3.4", now + Duration::from_secs(10)) {
            RateDecision::Limited { retry_after } => {
                assert_eq!(retry_after, Duration::from_secs(50))
            }
            other => panic!("expected limit, got {other:?}"),
        }
        // Rejections do not advance the counter.
        assert_eq!(rl.entries.get("1.2.3.4").unwrap().count, 3);
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let rl = limiter(1);
        let now = Instant::now();
        assert!(rl.check_at("a", now).is_allowed());
        assert!(!rl.check_at("a", now + Duration::from_secs(59)).is_allowed());
        assert_eq!(
            rl.check_at("a", now + Duration::from_secs(60)),
            RateDecision::Allowed { remaining: 0 }
        );
    }

    #[test]
    fn test_clients_are_independent() {
        let rl = limiter(1);
        let now = Instant::now();
        assert!(rl.check_at("a", now).is_allowed());
        assert!(rl.check_at("b", now).is_allowed());
        assert!(!rl.check_at("a", now).is_allowed());
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let rl = limiter(5);
        let now = Instant::now();
        rl.check_at("old", now);
        rl.check_at("new", now + Duration::from_secs(30));
        assert_eq!(rl.sweep_at(now + Duration::from_secs(61)), 1);
        assert_eq!(rl.tracked_clients(), 1);
        assert!(rl.entries.contains_key("new"));
    }

    #[test]
    fn test_full_store_sweeps_then_admits_untracked() {
        let rl = RateLimiter::new(5, Duration::from_secs(60), 2);
        let now = Instant::now();
        rl.check_at("a", now);
        rl.check_at("b", now);
        assert_eq!(rl.check_at("c", now), RateDecision::Untracked);
        assert_eq!(rl.tracked_clients(), 2);

        // Known clients keep counting while the store is full.
        assert_eq!(rl.check_at("a", now), RateDecision::Allowed { remaining: 3 });

        // Once the window closes the sweep frees room.
        let later = now + Duration::from_secs(61);
        assert_eq!(rl.check_at("c", later), RateDecision::Allowed { remaining: 4 });
        assert_eq!(rl.tracked_clients(), 1);
    }

    #[test]
    fn test_concurrent_checks_never_exceed_ceiling() {
        let rl = Arc::new(limiter(50));
        let now = Instant::now();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let rl = rl.clone();
                std::thread::spawn(move || {
                    (0..20)
                        .filter(|_| rl.check_at("shared", now).is_allowed())
                        .count()
                })
            })
            .collect();
        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 50);
    }

    #[test]
    fn test_concurrent_new_clients_respect_store_cap() {
        let rl = Arc::new(RateLimiter::new(5, Duration::from_secs(60), 16));
        let now = Instant::now();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let rl = rl.clone();
                std::thread::spawn(move || {
                    (0..50)
                        .filter(|i| {
                            rl.check_at(&format!("10.{t}.0.{i}"), now) == RateDecision::Untracked
                        })
                        .count()
                })
            })
            .collect();
        let untracked: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert!(rl.tracked_clients() <= 16);
        assert_eq!(untracked + rl.tracked_clients(), 400);
    }

    #[tokio::test]
    async fn test_sweeper_clears_expired_entries() {
        let rl = Arc::new(RateLimiter::new(5, Duration::from_millis(20), 100));
        rl.check("x");
        let task = rl.clone().spawn_sweeper();
        tokio::time::sleep(Duration::from_millis(100)).await;
        task.abort();
        assert_eq!(rl.tracked_clients(), 0);
    }
}
