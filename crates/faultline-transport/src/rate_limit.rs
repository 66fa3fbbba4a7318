//! Bookkeeping of the rate limits announced by the ingestion endpoint

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use faultline_types::EventKind;

/// Applied when a 429 response carries no usable `Retry-After`
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Rate limit categories covering an event kind
pub fn categories(kind: EventKind) -> &'static [&'static str] {
    match kind {
        EventKind::Error => &["error", "default"],
        EventKind::Transaction => &["transaction"],
        EventKind::CheckIn => &["monitor"],
        EventKind::Metrics => &["metric_bucket", "statsd"],
    }
}

/// Per-category "disabled until" instants
#[derive(Debug, Default)]
pub struct RateLimiter {
    state: Mutex<RateLimits>,
}

#[derive(Debug, Default)]
struct RateLimits {
    all: Option<Instant>,
    categories: HashMap<String, Instant>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_limited(&self, kind: EventKind) -> bool {
        self.is_limited_at(kind, Instant::now())
    }

    pub fn is_limited_at(&self, kind: EventKind, now: Instant) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.all.is_some_and(|until| until > now) {
            return true;
        }
        categories(kind).iter().any(|category| {
            state
                .categories
                .get(*category)
                .is_some_and(|until| *until > now)
        })
    }

    /// Record the limits announced by a response
    pub fn update(&self, status: u16, rate_limits: Option<&str>, retry_after: Option<&str>) {
        self.update_at(status, rate_limits, retry_after, Instant::now(), Utc::now());
    }

    pub fn update_at(
        &self,
        status: u16,
        rate_limits: Option<&str>,
        retry_after: Option<&str>,
        now: Instant,
        wall_clock: DateTime<Utc>,
    ) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(header) = rate_limits {
            for (delay, categories) in parse_rate_limits(header) {
                let until = now + delay;
                if categories.is_empty() {
                    state.all = Some(state.all.map_or(until, |current| current.max(until)));
                    continue;
                }
                for category in categories {
                    let entry = state.categories.entry(category).or_insert(until);
                    *entry = (*entry).max(until);
                }
            }
        } else if status == 429 {
            let delay = retry_after
                .and_then(|value| parse_retry_after(value, wall_clock))
                .unwrap_or(DEFAULT_RETRY_AFTER);
            let until = now + delay;
            state.all = Some(state.all.map_or(until, |current| current.max(until)));
        }
    }
}

/// `Retry-After` as delta seconds or an HTTP date
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<f64>() {
        return (seconds.is_finite() && seconds >= 0.0).then(|| Duration::from_secs_f64(seconds));
    }
    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = date.with_timezone(&Utc) - now;
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

/// Parse `X-Sentry-Rate-Limits`: `retry_after:categories:scope[:reason], ...`.
///
/// An empty category list limits every category.
pub fn parse_rate_limits(header: &str) -> Vec<(Duration, Vec<String>)> {
    header
        .split(',')
        .filter_map(|limit| {
            let mut parts = limit.trim().split(':');
            let seconds = parts.next()?.trim().parse::<f64>().ok()?;
            if !seconds.is_finite() || seconds < 0.0 {
                return None;
            }
            let categories = parts
                .next()
                .unwrap_or_default()
                .split(';')
                .map(str::trim)
                .filter(|category| !category.is_empty())
                .map(str::to_string)
                .collect();
            Some((Duration::from_secs_f64(seconds), categories))
        })
        .collect()
}
