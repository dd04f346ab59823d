use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::qr_codes::{MAX_RATE_LIMIT_WINDOW_SECONDS, RateLimitConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub route: String,
    pub window_seconds: i64,
    pub max_requests: i64,
}

impl RateLimitPolicy {
    /// Windows are clamped to `1..=30 days`; stored per-QR configs are not trusted.
    pub fn new(route: &str, window_seconds: i64, max_requests: i64) -> Self {
        Self {
            route: route.to_string(),
            window_seconds: window_seconds.clamp(1, MAX_RATE_LIMIT_WINDOW_SECONDS),
            max_requests: max_requests.max(1),
        }
    }

    pub fn qr_create() -> Self {
        Self::new("qr_codes.create", 60, 30)
    }

    pub fn qr_bulk() -> Self {
        Self::new("qr_codes.bulk", 60, 5)
    }

    pub fn api_v1() -> Self {
        Self::new("api.v1", 60, 100)
    }

    pub fn api_key_create() -> Self {
        Self::new("api_keys.create", 3600, 10)
    }

    /// Scan throttling for one QR code, honouring its own config when present.
    pub fn qr_scan(config: Option<&RateLimitConfig>) -> Self {
        match config {
            Some(config) => Self::new(
                "qr_codes.scan",
                config.window_size.unwrap_or(3600),
                config.max_requests.unwrap_or(100),
            ),
            None => Self::new("qr_codes.scan", 60, 60),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::seconds(self.window_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<i64>,
}

impl RateLimitDecision {
    pub fn allow_unchecked(policy: &RateLimitPolicy) -> Self {
        Self {
            allowed: true,
            remaining: policy.max_requests,
            retry_after: None,
        }
    }
}

/// Decides a request against the rolling window.
///
/// `hits` holds every recorded request for the key and route inside
/// `(now - window, now]`, including the current one, in any order.
pub fn evaluate_window(
    hits: &[DateTime<Utc>],
    now: DateTime<Utc>,
    policy: &RateLimitPolicy,
) -> RateLimitDecision {
    let window_start = now - policy.window();
    let mut in_window: Vec<DateTime<Utc>> =
        hits.iter().copied().filter(|at| *at > window_start).collect();
    in_window.sort_unstable();

    let count = in_window.len() as i64;
    if count <= policy.max_requests {
        return RateLimitDecision {
            allowed: true,
            remaining: policy.max_requests - count,
            retry_after: None,
        };
    }

    // One more request fits once the hit at index `count - max` leaves the window.
    let blocking = in_window[(count - policy.max_requests) as usize];
    let reopen_at = blocking + policy.window();
    let millis = (reopen_at - now).num_milliseconds().max(0);
    let retry_after = ((millis + 999) / 1000).clamp(1, policy.window_seconds);

    RateLimitDecision {
        allowed: false,
        remaining: 0,
        retry_after: Some(retry_after),
    }
}
