//! Rate limiter shared by every REST caller
//!
//! Each route maps to a [`Bucket`] guarded by a fair async mutex. A caller
//! holds the bucket for the whole request, so callers on one bucket are served
//! in arrival order and the accounting from one response is applied before the
//! next caller decides whether to wait. A global lockout (429 with the global
//! flag) and a proactive requests-per-second cap apply to all buckets.

use super::bucket::{Bucket, BucketState};
use super::headers::RateLimitHeaders;
use crate::route::Route;
use dashmap::DashMap;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter as Governor};
use parking_lot::Mutex;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, warn};

/// Exclusive access to a bucket for the duration of one request
pub struct RatelimitPermit {
    bucket: Arc<Bucket>,
    state: OwnedMutexGuard<BucketState>,
}

impl RatelimitPermit {
    pub fn bucket_key(&self) -> &str {
        self.bucket.key()
    }

    pub fn remaining(&self) -> Option<u32> {
        self.state.remaining
    }
}

impl std::fmt::Debug for RatelimitPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RatelimitPermit")
            .field("bucket", &self.bucket.key())
            .field("state", &*self.state)
            .finish()
    }
}

pub struct RateLimiter {
    buckets: DashMap<String, Arc<Bucket>>,
    /// Template key -> service bucket hash
    hashes: DashMap<String, String>,
    global_until: Mutex<Option<Instant>>,
    proactive: Option<DefaultDirectRateLimiter>,
}

impl RateLimiter {
    /// Create a limiter; `global_per_second` of 0 disables the proactive cap
    pub fn new(global_per_second: u32) -> Self {
        let proactive = NonZeroU32::new(global_per_second)
            .map(|rps| Governor::direct(Quota::per_second(rps)));
        Self {
            buckets: DashMap::new(),
            hashes: DashMap::new(),
            global_until: Mutex::new(None),
            proactive,
        }
    }

    /// Suspend until the route may be called; the permit must be held until
    /// the response has been applied with [`RateLimiter::update`].
    pub async fn acquire(&self, route: &Route) -> RatelimitPermit {
        let bucket = self.bucket_for(route);
        let state = Arc::clone(&bucket.state).lock_owned().await;
        let mut permit = RatelimitPermit { bucket, state };
        self.wait(&mut permit).await;
        permit
    }

    /// Wait out the bucket window and any global lockout, then count the call
    pub async fn wait(&self, permit: &mut RatelimitPermit) {
        if let Some(delay) = permit.state.delay(Instant::now()) {
            debug!(
                bucket = %permit.bucket.key(),
                delay_ms = delay.as_millis() as u64,
                "Bucket exhausted, waiting for reset"
            );
            sleep(delay).await;
        }
        permit.state.refresh(Instant::now());

        self.wait_global().await;
        if let Some(proactive) = &self.proactive {
            proactive.until_ready().await;
        }
        permit.state.consume();
    }

    /// Apply the rate-limit headers of a response
    pub fn update(&self, route: &Route, permit: &mut RatelimitPermit, headers: &RateLimitHeaders) {
        permit.state.update(headers, Instant::now());

        let Some(hash) = headers.bucket.as_deref() else {
            return;
        };
        let template = route.template_key();
        let known = self.hashes.get(&template).is_some_and(|h| h.value() == hash);
        if !known {
            self.hashes.insert(template, hash.to_string());
            let hashed = format!("{hash}:{}", route.major_key());
            self.buckets
                .entry(hashed)
                .or_insert_with(|| Arc::clone(&permit.bucket));
            debug!(route = %route, bucket = %hash, "Learned rate-limit bucket");
        }
    }

    /// Record a 429; the next [`RateLimiter::wait`] on this permit (and, when
    /// global, every caller) sleeps for `retry_after`.
    pub fn rate_limited(&self, permit: &mut RatelimitPermit, retry_after: Duration, global: bool) {
        if global {
            warn!(retry_after_ms = retry_after.as_millis() as u64, "Global rate limit hit");
            self.lock_global(retry_after);
        } else {
            warn!(
                bucket = %permit.bucket.key(),
                retry_after_ms = retry_after.as_millis() as u64,
                "Route rate limit hit"
            );
            permit.state.lock_for(retry_after, Instant::now());
        }
    }

    /// Block every bucket for `wait`
    pub fn lock_global(&self, wait: Duration) {
        let until = Instant::now() + wait;
        let mut global = self.global_until.lock();
        if global.map_or(true, |current| current < until) {
            *global = Some(until);
        }
    }

    /// Accounting of the bucket the route maps to, if idle
    pub fn snapshot(&self, route: &Route) -> Option<BucketState> {
        let key = self.resolve_key(route);
        let bucket = self.buckets.get(&key).map(|b| Arc::clone(b.value()))?;
        bucket.snapshot()
    }

    async fn wait_global(&self) {
        loop {
            let until = *self.global_until.lock();
            match until {
                Some(until) if until > Instant::now() => sleep_until(until).await,
                _ => return,
            }
        }
    }

    fn resolve_key(&self, route: &Route) -> String {
        match self.hashes.get(&route.template_key()) {
            Some(hash) => format!("{}:{}", hash.value(), route.major_key()),
            None => route.bucket_key(),
        }
    }

    fn bucket_for(&self, route: &Route) -> Arc<Bucket> {
        let key = self.resolve_key(route);
        let bucket = self
            .buckets
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Bucket::new(key)));
        Arc::clone(bucket.value())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(50)
    }
}
