//! Sliding-window rate limiting for approval-affecting operations.
//!
//! The business intent is "no more than N human-reviewed operations per
//! hour" as a fraud control, not throughput shaping, so this counts
//! operations in a sliding window rather than refilling a bucket. A
//! window cannot be bypassed at its boundary: each operation's own
//! timestamp ages out exactly one window after it happened.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::config::{QuotaScope, RateLimitConfig};

/// Outcome of a consume attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
    /// When the oldest counted operation ages out.
    pub reset_at: DateTime<Utc>,
}

/// Read-only quota snapshot for the operator dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaStatus {
    pub used: u32,
    pub remaining: u32,
    pub max: u32,
    pub reset_at: DateTime<Utc>,
}

/// Per-tenant sliding-window counters.
///
/// One mutex guards all windows; consume is a single prune + check +
/// push step, so concurrent callers cannot undercount.
pub struct RateLimiter {
    /// Counters keyed by (tenant, action); the action half is empty under
    /// the combined scope. Tuple keys keep tenant ids opaque.
    windows: Mutex<HashMap<(String, String), VecDeque<DateTime<Utc>>>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            config,
        }
    }

    fn window(&self) -> Duration {
        Duration::seconds(self.config.window_secs as i64)
    }

    fn max_for(&self, tenant_id: &str) -> u32 {
        self.config
            .tenant_overrides
            .get(tenant_id)
            .copied()
            .unwrap_or(self.config.max_operations)
    }

    fn key(&self, tenant_id: &str, op_kind: &str) -> (String, String) {
        let action = match self.config.scope {
            QuotaScope::Combined => String::new(),
            QuotaScope::PerAction => op_kind.to_string(),
        };
        (tenant_id.to_string(), action)
    }

    /// Atomically check and count one operation.
    pub fn consume(&self, tenant_id: &str, op_kind: &str) -> Decision {
        self.consume_at(Utc::now(), tenant_id, op_kind)
    }

    pub(crate) fn consume_at(
        &self,
        now: DateTime<Utc>,
        tenant_id: &str,
        op_kind: &str,
    ) -> Decision {
        let max = self.max_for(tenant_id);
        let window = self.window();
        let key = self.key(tenant_id, op_kind);

        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        let timestamps = windows.entry(key).or_default();

        // Expired operations age out as part of the same atomic step
        while let Some(&oldest) = timestamps.front() {
            if now - oldest >= window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if (timestamps.len() as u32) < max {
            timestamps.push_back(now);
            let used = timestamps.len() as u32;
            let reset_at = *timestamps.front().unwrap_or(&now) + window;
            Decision {
                allowed: true,
                remaining: max - used,
                reset_at,
            }
        } else {
            let reset_at = *timestamps.front().unwrap_or(&now) + window;
            Decision {
                allowed: false,
                remaining: 0,
                reset_at,
            }
        }
    }

    /// Non-mutating snapshot of a tenant's quota.
    ///
    /// With per-action scope this aggregates across the tenant's action
    /// counters: `used` is the total, `remaining` the tightest counter.
    pub fn status(&self, tenant_id: &str) -> QuotaStatus {
        self.status_at(Utc::now(), tenant_id)
    }

    pub(crate) fn status_at(&self, now: DateTime<Utc>, tenant_id: &str) -> QuotaStatus {
        let max = self.max_for(tenant_id);
        let window = self.window();

        let windows = self.windows.lock().expect("rate limiter mutex poisoned");

        let mut used_total = 0u32;
        let mut worst_used = 0u32;
        let mut earliest_reset: Option<DateTime<Utc>> = None;

        for ((tenant, _action), timestamps) in windows.iter() {
            if tenant != tenant_id {
                continue;
            }

            let live: Vec<&DateTime<Utc>> =
                timestamps.iter().filter(|&&t| now - t < window).collect();
            let used = live.len() as u32;
            used_total += used;
            worst_used = worst_used.max(used);
            if let Some(oldest) = live.first() {
                let reset = **oldest + window;
                earliest_reset = Some(match earliest_reset {
                    Some(current) => current.min(reset),
                    None => reset,
                });
            }
        }

        QuotaStatus {
            used: used_total,
            remaining: max.saturating_sub(worst_used),
            max,
            reset_at: earliest_reset.unwrap_or(now),
        }
    }
}
