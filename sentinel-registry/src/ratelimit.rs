//! Per-registry-host rate-limit bookkeeping and admission control.
//!
//! Auto-discovers each host on first observation into a single lockable map of per-host
//! state, and distinguishes the two header shapes the registry world actually uses: Docker
//! Hub's `RateLimit-*;w=SECONDS` and GitHub's `X-RateLimit-*` with an absolute epoch reset.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use sentinel_core::RegistryState;
use tokio::sync::RwLock;

/// `registry-1.docker.io` and `index.docker.io` are data-plane/auth aliases of `docker.io`.
pub fn canonical_host(host: &str) -> String {
    match host {
        "registry-1.docker.io" | "index.docker.io" => "docker.io".to_string(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Ok,
    Low,
    Exhausted,
}

#[derive(Debug, Default)]
struct Tracker {
    states: BTreeMap<String, RegistryState>,
}

/// Shared across every concurrent checker; `Clone` is cheap (an `Arc` handle to one map).
#[derive(Clone)]
pub struct RateLimitTracker {
    inner: Arc<RwLock<Tracker>>,
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        RateLimitTracker {
            inner: Arc::new(RwLock::new(Tracker::default())),
        }
    }
}

impl RateLimitTracker {
    pub fn new() -> Self {
        RateLimitTracker::default()
    }

    /// Registers a host with a container count, updating the count if already known.
    pub async fn discover(&self, host: &str, count: u64) {
        let host = canonical_host(host);
        let mut tracker = self.inner.write().await;
        tracker
            .states
            .entry(host)
            .and_modify(|s| s.container_count = count)
            .or_insert_with(|| {
                let mut s = RegistryState::unknown(Utc::now());
                s.container_count = count;
                s
            });
    }

    /// Parses rate-limit headers from a registry response and records them for `host`.
    pub async fn record(&self, host: &str, headers: &HeaderMap) {
        let host = canonical_host(host);
        let now = Utc::now();

        let parsed = parse_docker_hub_headers(headers).or_else(|| parse_github_headers(headers));

        let mut tracker = self.inner.write().await;
        let state = tracker
            .states
            .entry(host)
            .or_insert_with(|| RegistryState::unknown(now));

        match parsed {
            Some((limit, remaining, reset_at)) => {
                state.limit = limit;
                state.remaining = remaining;
                state.reset_at = reset_at;
                state.has_limits = true;
            }
            None => {
                state.has_limits = false;
            }
        }
        state.last_updated = now;
    }

    /// Whether a caller reserving `reserve` requests against `host` may proceed right now.
    pub async fn can_proceed(&self, host: &str, reserve: i64) -> (bool, Duration) {
        let host = canonical_host(host);
        let now = Utc::now();
        let tracker = self.inner.read().await;

        let Some(state) = tracker.states.get(&host) else {
            return (true, Duration::ZERO);
        };
        if !state.has_limits {
            return (true, Duration::ZERO);
        }
        if state.reset_at <= now {
            return (true, Duration::ZERO);
        }
        if state.remaining > reserve {
            return (true, Duration::ZERO);
        }

        let wait = (state.reset_at - now)
            .to_std()
            .unwrap_or(Duration::ZERO);
        (false, wait)
    }

    /// Rolls every tracked registry's state into one health signal; stale (past-reset)
    /// registries are excluded.
    pub async fn overall_health(&self) -> Health {
        let now = Utc::now();
        let tracker = self.inner.read().await;

        let mut low = false;
        for state in tracker.states.values() {
            if !state.has_limits || state.reset_at <= now {
                continue;
            }
            if state.remaining <= 0 {
                return Health::Exhausted;
            }
            if state.limit > 0 && state.remaining * 5 < state.limit {
                low = true;
            }
        }
        if low { Health::Low } else { Health::Ok }
    }

    pub async fn state_of(&self, host: &str) -> Option<RegistryState> {
        let host = canonical_host(host);
        self.inner.read().await.states.get(&host).cloned()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}

/// Docker Hub shapes both `RateLimit-Limit` and `RateLimit-Remaining` as `N;w=SECONDS`; the
/// reset time is derived from `now + SECONDS` taken off the remaining header's window.
fn parse_docker_hub_headers(headers: &HeaderMap) -> Option<(i64, i64, DateTime<Utc>)> {
    let limit_raw = header_str(headers, "ratelimit-limit")?;
    let remaining_raw = header_str(headers, "ratelimit-remaining")?;

    let (limit, _) = parse_quota_window(limit_raw)?;
    let (remaining, window) = parse_quota_window(remaining_raw)?;
    let window = window.unwrap_or(60);

    Some((limit, remaining, Utc::now() + chrono::Duration::seconds(window)))
}

/// GitHub shapes `X-RateLimit-*` as plain integers, with `X-RateLimit-Reset` an absolute Unix
/// epoch timestamp.
fn parse_github_headers(headers: &HeaderMap) -> Option<(i64, i64, DateTime<Utc>)> {
    let limit: i64 = header_str(headers, "x-ratelimit-limit")?.parse().ok()?;
    let remaining: i64 = header_str(headers, "x-ratelimit-remaining")?.parse().ok()?;
    let reset_epoch: i64 = header_str(headers, "x-ratelimit-reset")?.parse().ok()?;
    let reset_at = DateTime::from_timestamp(reset_epoch, 0)?;
    Some((limit, remaining, reset_at))
}

fn parse_quota_window(input: &str) -> Option<(i64, Option<i64>)> {
    if let Some((quota, window)) = input.split_once(";w=") {
        Some((quota.parse().ok()?, Some(window.parse().ok()?)))
    } else {
        Some((input.parse().ok()?, None))
    }
}
