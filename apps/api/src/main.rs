mod ats;
mod config;
mod db;
mod errors;
mod history;
mod keyed_lock;
mod language;
mod llm_client;
mod models;
mod oracle;
mod rate_limit;
mod render;
mod revision;
mod routes;
mod state;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::ats::engine::AtsEngine;
use crate::config::Config;
use crate::db::create_pool;
use crate::history::service::HistoryService;
use crate::history::store::{HistoryStore, InMemoryHistoryStore, PgHistoryStore};
use crate::llm_client::LlmClient;
use crate::oracle::{LlmChangeOracle, ProposalService};
use crate::rate_limit::{InMemoryRateLimitStore, RateGuard, RateLimitStore, RedisRateLimitStore};
use crate::render::S3MarkdownRenderer;
use crate::revision::applicator::DiffApplicator;
use crate::revision::pipeline::RevisionPipeline;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting revision API v{}", env!("CARGO_PKG_VERSION"));

    // History store: PostgreSQL when configured, otherwise process memory
    let history_store: Arc<dyn HistoryStore> = match &config.database_url {
        Some(url) => {
            let store = PgHistoryStore::new(create_pool(url).await?);
            store.ensure_schema().await?;
            Arc::new(store)
        }
        None => {
            info!("DATABASE_URL not set; history is kept in memory");
            Arc::new(InMemoryHistoryStore::new())
        }
    };
    let history = Arc::new(HistoryService::new(history_store));

    // Rate limit store: Redis when configured, otherwise process memory
    let rate_store: Arc<dyn RateLimitStore> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            info!("Redis rate limit store initialized");
            Arc::new(RedisRateLimitStore::new(client))
        }
        None => {
            info!("REDIS_URL not set; rate limits are kept in memory");
            Arc::new(InMemoryRateLimitStore::new())
        }
    };
    let rate_guard = Arc::new(RateGuard::new(rate_store));
    rate_guard.spawn_sweeper(Duration::from_secs(config.rate_limit_sweep_secs));

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let renderer = Arc::new(S3MarkdownRenderer::new(s3, config.s3_bucket.clone()));
    info!("S3 client initialized");

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    let proposals = Arc::new(ProposalService::new(
        Arc::new(LlmChangeOracle::new(llm)),
        Duration::from_millis(config.oracle_timeout_ms),
    ));

    let engine = Arc::new(AtsEngine::new());
    let pipeline = Arc::new(RevisionPipeline::new(
        DiffApplicator::new(config.append_policy),
        Arc::clone(&engine),
        Arc::clone(&history),
        renderer,
        Duration::from_millis(config.scoring_timeout_ms),
    ));
    info!("Append policy: {:?}", config.append_policy);

    // Build app state
    let state = AppState {
        config: config.clone(),
        engine,
        history,
        pipeline,
        proposals,
        rate_guard,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "revision-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
