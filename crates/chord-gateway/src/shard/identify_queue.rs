//! Identify queue
//!
//! Identify is limited per bucket: shards whose id falls in the same bucket
//! (`id % max_concurrency`) identify one at a time, at least `stagger` apart.
//! Waiters are admitted in arrival order.

use chord_core::ShardInfo;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

pub struct IdentifyQueue {
    stagger: Duration,
    max_concurrency: u32,
    /// Last identify per bucket
    buckets: Vec<Mutex<Option<Instant>>>,
}

impl IdentifyQueue {
    #[must_use]
    pub fn new(stagger: Duration, max_concurrency: u32) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            stagger,
            max_concurrency,
            buckets: (0..max_concurrency).map(|_| Mutex::new(None)).collect(),
        }
    }

    #[must_use]
    pub fn max_concurrency(&self) -> u32 {
        self.max_concurrency
    }

    /// Wait until `shard` may send Identify
    pub async fn wait_turn(&self, shard: ShardInfo) {
        let index = shard.identify_bucket(self.max_concurrency) as usize % self.buckets.len();
        let mut last = self.buckets[index].lock().await;

        if let Some(previous) = *last {
            let ready_at = previous + self.stagger;
            if ready_at > Instant::now() {
                debug!(shard_id = shard.id(), bucket = index, "Waiting for identify slot");
                sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
