//! Fixed-window request quotas keyed by `"{user_id}:{endpoint}"`.

pub mod guard;
pub mod store;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;

pub use guard::RateGuard;
pub use store::{InMemoryRateLimitStore, RateLimitStore, RedisRateLimitStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRecord {
    pub identifier: String,
    pub count: u32,
    /// Epoch milliseconds at which the window closes.
    pub reset_time: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_time: i64,
}

#[derive(Debug, Error)]
pub enum RateLimitStoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("corrupt rate limit record: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Endpoint names used in rate limit identifiers.
pub mod endpoints {
    pub const REVISIONS: &str = "revisions";
    pub const ATS_SCORE: &str = "ats_score";
    pub const PROPOSE: &str = "propose";
}

pub fn identifier(user_id: &str, endpoint: &str) -> String {
    format!("{user_id}:{endpoint}")
}

/// Counts one request for `user_id` on `endpoint`, rejecting it once the
/// window's quota is spent.
pub async fn enforce(
    guard: &RateGuard,
    user_id: Uuid,
    endpoint: &str,
    policy: &RateLimitPolicy,
) -> Result<RateLimitStatus, AppError> {
    let status = guard
        .check(&identifier(&user_id.to_string(), endpoint), policy)
        .await?;
    if !status.allowed {
        info!("Rejected {endpoint} request for user {user_id}: quota spent");
        return Err(AppError::RateLimited(status));
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_identifier_format() {
        assert_eq!(identifier("u-1", endpoints::PROPOSE), "u-1:propose");
    }

    #[tokio::test]
    async fn test_enforce_rejects_once_spent() {
        let guard = RateGuard::new(Arc::new(InMemoryRateLimitStore::new()));
        let policy = RateLimitPolicy {
            max_requests: 1,
            window_ms: 60_000,
        };
        let user = Uuid::new_v4();

        let status = enforce(&guard, user, endpoints::REVISIONS, &policy).await.unwrap();
        assert_eq!(status.remaining, 0);

        let err = enforce(&guard, user, endpoints::REVISIONS, &policy).await.unwrap_err();
        assert!(matches!(err, AppError::RateLimited(s) if !s.allowed));

        // Other endpoints keep their own quota.
        assert!(enforce(&guard, user, endpoints::ATS_SCORE, &policy).await.is_ok());
    }
}
