use std::str::FromStr;

use anyhow::{anyhow, ensure, Context, Result};

use crate::rate_limit::RateLimitPolicy;
use crate::revision::applicator::AppendPolicy;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL history store. In-memory history when unset.
    pub database_url: Option<String>,
    /// Redis rate-limit store. In-memory rate limits when unset.
    pub redis_url: Option<String>,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub rate_limit_max_requests: u32,
    pub rate_limit_window_ms: u64,
    pub propose_rate_limit_max_requests: u32,
    pub rate_limit_sweep_secs: u64,
    pub scoring_timeout_ms: u64,
    pub oracle_timeout_ms: u64,
    pub append_policy: AppendPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            redis_url: optional_env("REDIS_URL"),
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            rate_limit_max_requests: parse_env("RATE_LIMIT_MAX_REQUESTS", 30)?,
            rate_limit_window_ms: parse_nonzero_env("RATE_LIMIT_WINDOW_MS", 60_000)?,
            propose_rate_limit_max_requests: parse_env("PROPOSE_RATE_LIMIT_MAX_REQUESTS", 10)?,
            rate_limit_sweep_secs: parse_nonzero_env("RATE_LIMIT_SWEEP_SECS", 60)?,
            scoring_timeout_ms: parse_env("SCORING_TIMEOUT_MS", 3_000)?,
            oracle_timeout_ms: parse_env("ORACLE_TIMEOUT_MS", 30_000)?,
            append_policy: match optional_env("APPEND_POLICY") {
                Some(raw) => raw
                    .parse()
                    .map_err(|e: String| anyhow!("APPEND_POLICY: {e}"))?,
                None => AppendPolicy::default(),
            },
        })
    }
}

impl Config {
    pub fn rate_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            max_requests: self.rate_limit_max_requests,
            window_ms: self.rate_limit_window_ms,
        }
    }

    /// Oracle calls are expensive, so proposals get their own smaller quota.
    pub fn propose_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            max_requests: self.propose_rate_limit_max_requests,
            window_ms: self.rate_limit_window_ms,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

/// Intervals and windows; zero would make the sweeper timer panic.
fn parse_nonzero_env(key: &str, default: u64) -> Result<u64> {
    let value = parse_env(key, default)?;
    ensure!(value > 0, "{key} must be greater than zero");
    Ok(value)
}
