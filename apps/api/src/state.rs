use std::sync::Arc;
use std::time::Duration;

use crate::ats::engine::AtsEngine;
use crate::config::Config;
use crate::history::service::HistoryService;
use crate::oracle::ProposalService;
use crate::rate_limit::RateGuard;
use crate::revision::pipeline::RevisionPipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub engine: Arc<AtsEngine>,
    pub history: Arc<HistoryService>,
    /// Owns the applicator and renderer; shares `engine` and `history`.
    pub pipeline: Arc<RevisionPipeline>,
    pub proposals: Arc<ProposalService>,
    pub rate_guard: Arc<RateGuard>,
}

impl AppState {
    pub fn scoring_timeout(&self) -> Duration {
        Duration::from_millis(self.config.scoring_timeout_ms)
    }
}
