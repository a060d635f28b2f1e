use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::LlmClient;
use crate::models::resume::ResumeDocument;
use crate::oracle::prompts::{build_propose_prompt, PROPOSE_SYSTEM};
use crate::oracle::{ChangeOracle, OracleError};
use crate::revision::changes::ProposedChange;

#[derive(Debug, Deserialize)]
struct ProposalReply {
    #[serde(default)]
    changes: Vec<ProposedChange>,
}

/// Asks the LLM for an edit batch.
pub struct LlmChangeOracle {
    llm: LlmClient,
}

impl LlmChangeOracle {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl ChangeOracle for LlmChangeOracle {
    async fn propose(
        &self,
        document: &ResumeDocument,
        job_text: Option<&str>,
    ) -> Result<Vec<ProposedChange>, OracleError> {
        let prompt = build_propose_prompt(document, job_text);
        let system = format!("{PROPOSE_SYSTEM}\n\n{JSON_ONLY_SYSTEM}");
        let reply: ProposalReply = self.llm.call_json(&prompt, &system).await?;
        debug!("LLM returned {} raw changes", reply.changes.len());
        Ok(reply.changes)
    }
}
