//! Per-route rate-limit bucket

use super::headers::RateLimitHeaders;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Accounting for one bucket. Mutated only while the bucket lock is held.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BucketState {
    pub limit: Option<u32>,
    /// Unknown until the first response
    pub remaining: Option<u32>,
    pub reset_at: Option<Instant>,
}

impl BucketState {
    /// How long a caller must wait before sending, if at all
    pub fn delay(&self, now: Instant) -> Option<Duration> {
        match (self.remaining, self.reset_at) {
            (Some(0), Some(reset_at)) if reset_at > now => Some(reset_at - now),
            _ => None,
        }
    }

    /// Start a new window once the reset time has passed
    pub fn refresh(&mut self, now: Instant) {
        if self.reset_at.is_some_and(|reset_at| reset_at <= now) {
            self.remaining = self.limit;
            self.reset_at = None;
        }
    }

    /// Count one call against the window
    pub fn consume(&mut self) {
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }
    }

    /// Apply the values reported by a response
    pub fn update(&mut self, headers: &RateLimitHeaders, now: Instant) {
        if let Some(limit) = headers.limit {
            self.limit = Some(limit);
        }
        if let Some(remaining) = headers.remaining {
            self.remaining = Some(remaining);
        }
        if let Some(reset_after) = headers.reset_after {
            self.reset_at = Some(now + reset_after);
        }
    }

    /// Block the bucket for `wait` after a 429
    pub fn lock_for(&mut self, wait: Duration, now: Instant) {
        self.remaining = Some(0);
        self.reset_at = Some(now + wait);
    }
}

/// A bucket shared by every caller on the routes mapped to it
#[derive(Debug)]
pub struct Bucket {
    key: String,
    pub(crate) state: Arc<Mutex<BucketState>>,
}

impl Bucket {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: Arc::new(Mutex::new(BucketState::default())),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current accounting, `None` while a caller holds the bucket
    pub fn snapshot(&self) -> Option<BucketState> {
        self.state.try_lock().ok().map(|state| state.clone())
    }
}
