//! Per-device sliding-window rate limiting with escalating block.
//!
//! Rate state is loaded from and persisted to the durable key-value store
//! on every check. The load/prune/decide/persist sequence runs in one
//! synchronous section between awaits, so checks never interleave a
//! read-then-await-then-write race under the cooperative execution model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::RateLimitConfig;
use crate::storage::{KeyValueStore, keys};

/// Persisted rate state for one device.
///
/// `request_timestamps` only ever holds entries within the trailing
/// window; older entries are pruned on every read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateWindow {
    #[serde(default)]
    pub request_timestamps: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub block_until: Option<DateTime<Utc>>,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Requests left in the current window.
    pub remaining: usize,
    /// When the current window or block lapses.
    pub reset_at: DateTime<Utc>,
    /// Human-readable denial reason.
    pub reason: Option<String>,
}

impl RateDecision {
    fn allow(remaining: usize, reset_at: DateTime<Utc>) -> Self {
        Self {
            allowed: true,
            remaining,
            reset_at,
            reason: None,
        }
    }

    fn deny(reset_at: DateTime<Utc>, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            reset_at,
            reason: Some(reason.into()),
        }
    }
}

/// Sliding-window rate limiter keyed by device fingerprint.
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// Checks whether the device may issue a request now.
    ///
    /// Storage failures follow the configured policy: fail-open admits the
    /// request (availability), fail-closed denies it (enforcement). Either
    /// way the failure is logged, never propagated.
    pub async fn check(&self, fingerprint: &str) -> RateDecision {
        let key = keys::rate_limit(fingerprint);
        let now = Utc::now();

        let mut window = match self.load(&key).await {
            Ok(window) => window,
            Err(err) => {
                tracing::warn!(target: "rate_limit", "failed to load rate state for {fingerprint}: {err}");
                return self.storage_failure_decision(now);
            }
        };

        let window_start = now - self.config.window();
        window.request_timestamps.retain(|t| *t > window_start);

        if window.blocked {
            match window.block_until {
                Some(until) if now < until => {
                    return RateDecision::deny(until, "temporarily blocked");
                }
                _ => {
                    window.blocked = false;
                    window.block_until = None;
                }
            }
        }

        if window.request_timestamps.len() >= self.config.max_requests {
            let until = now + self.config.block_duration();
            window.blocked = true;
            window.block_until = Some(until);
            self.persist(&key, &window, fingerprint).await;
            return RateDecision::deny(
                until,
                format!(
                    "rate limit exceeded - blocked for {} minutes",
                    self.config.block_secs / 60
                ),
            );
        }

        window.request_timestamps.push(now);
        if let Err(err) = self.try_persist(&key, &window).await {
            tracing::warn!(target: "rate_limit", "failed to persist rate state for {fingerprint}: {err}");
            return self.storage_failure_decision(now);
        }

        let count = window.request_timestamps.len();
        let reset_at = window
            .request_timestamps
            .first()
            .map(|t| *t + self.config.window())
            .unwrap_or(now);
        RateDecision::allow(self.config.max_requests.saturating_sub(count), reset_at)
    }

    fn storage_failure_decision(&self, now: DateTime<Utc>) -> RateDecision {
        if self.config.fail_open {
            RateDecision::allow(self.config.max_requests, now)
        } else {
            RateDecision::deny(now, "rate limit storage unavailable")
        }
    }

    async fn load(&self, key: &str) -> anyhow::Result<RateWindow> {
        match self.store.get(key).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(RateWindow::default()),
        }
    }

    async fn try_persist(&self, key: &str, window: &RateWindow) -> anyhow::Result<()> {
        let raw = serde_json::to_string(window)?;
        self.store.set(key, &raw).await
    }

    /// Persist where the decision has already been made; failures only log.
    async fn persist(&self, key: &str, window: &RateWindow, fingerprint: &str) {
        if let Err(err) = self.try_persist(key, window).await {
            tracing::warn!(target: "rate_limit", "failed to persist rate state for {fingerprint}: {err}");
        }
    }
}
