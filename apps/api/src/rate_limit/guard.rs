use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::keyed_lock::KeyedLocks;
use crate::rate_limit::store::RateLimitStore;
use crate::rate_limit::{RateLimitPolicy, RateLimitRecord, RateLimitStatus, RateLimitStoreError};

/// Check-and-increment over a [`RateLimitStore`]. Each identifier's
/// read-modify-write runs under its own lock, so concurrent checks for one
/// identifier in this process never interleave.
pub struct RateGuard {
    store: Arc<dyn RateLimitStore>,
    locks: KeyedLocks,
}

impl RateGuard {
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    pub async fn check(
        &self,
        identifier: &str,
        policy: &RateLimitPolicy,
    ) -> Result<RateLimitStatus, RateLimitStoreError> {
        self.check_at(identifier, policy, Utc::now().timestamp_millis())
            .await
    }

    pub async fn check_at(
        &self,
        identifier: &str,
        policy: &RateLimitPolicy,
        now_ms: i64,
    ) -> Result<RateLimitStatus, RateLimitStoreError> {
        let _guard = self.locks.acquire(identifier).await;

        let mut record = match self.store.get(identifier).await? {
            Some(existing) if existing.reset_time > now_ms => existing,
            _ => RateLimitRecord {
                identifier: identifier.to_string(),
                count: 0,
                reset_time: now_ms + policy.window_ms as i64,
            },
        };

        if record.count >= policy.max_requests {
            debug!("Rate limit exceeded for {identifier}");
            return Ok(RateLimitStatus {
                allowed: false,
                remaining: 0,
                reset_time: record.reset_time,
            });
        }

        record.count += 1;
        let ttl_ms = (record.reset_time - now_ms).max(1) as u64;
        self.store.set(&record, ttl_ms).await?;

        Ok(RateLimitStatus {
            allowed: true,
            remaining: policy.max_requests - record.count,
            reset_time: record.reset_time,
        })
    }

    /// Deletes every record whose window closed at or before `now_ms`.
    /// Each key is re-read under its lock so a concurrent check that just
    /// opened a fresh window is never deleted.
    pub async fn sweep(&self, now_ms: i64) -> Result<usize, RateLimitStoreError> {
        let mut removed = 0;
        for identifier in self.store.keys().await? {
            let _guard = self.locks.acquire(&identifier).await;
            match self.store.get(&identifier).await? {
                Some(record) if record.reset_time <= now_ms => {
                    self.store.delete(&identifier).await?;
                    removed += 1;
                }
                _ => {}
            }
        }
        self.locks.prune().await;
        Ok(removed)
    }

    /// Runs [`RateGuard::sweep`] every `every` until the runtime shuts down.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let guard = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match guard.sweep(Utc::now().timestamp_millis()).await {
                    Ok(0) => {}
                    Ok(n) => info!("Rate limit sweep removed {n} expired records"),
                    Err(e) => warn!("Rate limit sweep failed: {e}"),
                }
            }
        })
    }
}
