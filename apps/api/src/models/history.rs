use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::resume::{LanguageTag, ResumeDocument};
use crate::revision::changes::ProposedChange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    MarkdownPreview,
}

/// A rendered output stored alongside a version, e.g. an S3 object key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub reference: String,
}

/// One committed revision. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resume_snapshot: ResumeDocument,
    pub ats_score: u8,
    /// Change against the caller's baseline, when one was supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_delta: Option<i32>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub proposed_changes: Vec<ProposedChange>,
    #[serde(default)]
    pub language: LanguageTag,
    pub created_at: DateTime<Utc>,
}

impl VersionEntry {
    pub fn new(user_id: Uuid, resume_snapshot: ResumeDocument, ats_score: u8) -> Self {
        let language = resume_snapshot.language.clone();
        Self {
            id: Uuid::new_v4(),
            user_id,
            resume_snapshot,
            ats_score,
            score_delta: None,
            artifacts: Vec::new(),
            proposed_changes: Vec::new(),
            language,
            created_at: Utc::now(),
        }
    }
}

/// Lightweight listing row for the timeline endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionSummary {
    pub id: Uuid,
    pub ats_score: u8,
    pub score_delta: Option<i32>,
    pub change_count: usize,
    pub language: String,
    pub created_at: DateTime<Utc>,
}

impl From<&VersionEntry> for VersionSummary {
    fn from(entry: &VersionEntry) -> Self {
        Self {
            id: entry.id,
            ats_score: entry.ats_score,
            score_delta: entry.score_delta,
            change_count: entry.proposed_changes.len(),
            language: entry.language.code.clone(),
            created_at: entry.created_at,
        }
    }
}
