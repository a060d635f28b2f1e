use std::collections::HashMap;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::RwLock;

use crate::rate_limit::{RateLimitRecord, RateLimitStoreError};

/// Plain key-value persistence for rate limit records. Callers serialize
/// access per key; implementations need not be atomic across calls.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    async fn get(&self, identifier: &str) -> Result<Option<RateLimitRecord>, RateLimitStoreError>;

    /// Writes `record`. `ttl_ms` is a hint for stores that expire keys themselves.
    async fn set(&self, record: &RateLimitRecord, ttl_ms: u64) -> Result<(), RateLimitStoreError>;

    async fn delete(&self, identifier: &str) -> Result<(), RateLimitStoreError>;

    async fn keys(&self) -> Result<Vec<String>, RateLimitStoreError>;
}

#[derive(Default)]
pub struct InMemoryRateLimitStore {
    records: RwLock<HashMap<String, RateLimitRecord>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn get(&self, identifier: &str) -> Result<Option<RateLimitRecord>, RateLimitStoreError> {
        Ok(self.records.read().await.get(identifier).cloned())
    }

    async fn set(&self, record: &RateLimitRecord, _ttl_ms: u64) -> Result<(), RateLimitStoreError> {
        self.records
            .write()
            .await
            .insert(record.identifier.clone(), record.clone());
        Ok(())
    }

    async fn delete(&self, identifier: &str) -> Result<(), RateLimitStoreError> {
        self.records.write().await.remove(identifier);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, RateLimitStoreError> {
        Ok(self.records.read().await.keys().cloned().collect())
    }
}

const REDIS_KEY_PREFIX: &str = "revision:rl:";

/// Records stored as JSON strings with a `PX` expiry matching the window.
pub struct RedisRateLimitStore {
    client: redis::Client,
}

impl RedisRateLimitStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    fn key(identifier: &str) -> String {
        format!("{REDIS_KEY_PREFIX}{identifier}")
    }
}

#[async_trait]
impl RateLimitStore for RedisRateLimitStore {
    async fn get(&self, identifier: &str) -> Result<Option<RateLimitRecord>, RateLimitStoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(Self::key(identifier)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, record: &RateLimitRecord, ttl_ms: u64) -> Result<(), RateLimitStoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let json = serde_json::to_string(record)?;
        redis::cmd("SET")
            .arg(Self::key(&record.identifier))
            .arg(json)
            .arg("PX")
            .arg(ttl_ms.max(1))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, identifier: &str) -> Result<(), RateLimitStoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(Self::key(identifier)).await?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, RateLimitStoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let keys: Vec<String> = conn.keys(format!("{REDIS_KEY_PREFIX}*")).await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(REDIS_KEY_PREFIX).map(str::to_string))
            .collect())
    }
}
