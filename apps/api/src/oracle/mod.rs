//! Change oracle: the fallible, slow source of proposed changes. Calls are
//! bounded by a timeout, and the last good batch per user is kept as a fallback.

pub mod handlers;
pub mod llm;
pub mod prompts;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::llm_client::LlmError;
use crate::models::resume::ResumeDocument;
use crate::revision::changes::ProposedChange;

pub use llm::LlmChangeOracle;

const MAX_BATCH: usize = 20;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle did not respond in time")]
    Timeout,

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("invalid change batch: {0}")]
    InvalidBatch(String),
}

#[async_trait]
pub trait ChangeOracle: Send + Sync {
    async fn propose(
        &self,
        document: &ResumeDocument,
        job_text: Option<&str>,
    ) -> Result<Vec<ProposedChange>, OracleError>;
}

/// Drops unusable changes and makes ids unique. Fails when nothing usable is left.
pub fn validate_batch(changes: Vec<ProposedChange>) -> Result<Vec<ProposedChange>, OracleError> {
    let mut seen = HashSet::new();
    let mut valid = Vec::with_capacity(changes.len());

    for (n, mut change) in changes.into_iter().enumerate() {
        if !change.scope.is_presentational() && change.after.trim().is_empty() {
            warn!("Dropping proposed change {:?}: empty replacement", change.id);
            continue;
        }
        if change.id.trim().is_empty() {
            change.id = format!("c{}", n + 1);
        }
        if !seen.insert(change.id.clone()) {
            let mut suffix = 2;
            while !seen.insert(format!("{}-{suffix}", change.id)) {
                suffix += 1;
            }
            change.id = format!("{}-{suffix}", change.id);
        }
        valid.push(change);
        if valid.len() == MAX_BATCH {
            break;
        }
    }

    if valid.is_empty() {
        return Err(OracleError::InvalidBatch("no usable changes".to_string()));
    }
    Ok(valid)
}

#[derive(Debug, Clone, Serialize)]
pub struct Proposal {
    pub changes: Vec<ProposedChange>,
    /// True when the oracle failed and a previously returned batch was served.
    pub cached: bool,
}

/// Wraps a [`ChangeOracle`] with a timeout, batch validation and a per-user
/// last-good-batch cache.
pub struct ProposalService {
    oracle: Arc<dyn ChangeOracle>,
    timeout: Duration,
    last_batches: RwLock<HashMap<Uuid, Vec<ProposedChange>>>,
}

impl ProposalService {
    pub fn new(oracle: Arc<dyn ChangeOracle>, timeout: Duration) -> Self {
        Self {
            oracle,
            timeout,
            last_batches: RwLock::new(HashMap::new()),
        }
    }

    pub async fn propose(
        &self,
        user_id: Uuid,
        document: &ResumeDocument,
        job_text: Option<&str>,
    ) -> Result<Proposal, OracleError> {
        let result = match tokio::time::timeout(self.timeout, self.oracle.propose(document, job_text)).await {
            Ok(result) => result.and_then(validate_batch),
            Err(_) => Err(OracleError::Timeout),
        };

        match result {
            Ok(changes) => {
                info!("Oracle proposed {} changes for user {user_id}", changes.len());
                self.last_batches
                    .write()
                    .await
                    .insert(user_id, changes.clone());
                Ok(Proposal {
                    changes,
                    cached: false,
                })
            }
            Err(e) => match self.last_batches.read().await.get(&user_id) {
                Some(previous) => {
                    warn!("Oracle failed for user {user_id} ({e}); serving cached batch");
                    Ok(Proposal {
                        changes: previous.clone(),
                        cached: true,
                    })
                }
                None => Err(e),
            },
        }
    }
}
