//! apply → score → detect language → render → commit.
//!
//! Nothing is persisted until the last step, so a request dropped mid-flight
//! leaves the history untouched. A batch that applies nothing is not
//! committed, which keeps the redo branch intact.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::ats::engine::AtsEngine;
use crate::ats::types::{AtsScoreOutput, ScoreDelta};
use crate::history::service::HistoryService;
use crate::history::store::StoreError;
use crate::history::timeline::Cursor;
use crate::language;
use crate::models::history::{Artifact, VersionEntry};
use crate::models::resume::{LanguageTag, ResumeDocument};
use crate::render::{ArtifactRenderer, Theme};
use crate::revision::applicator::DiffApplicator;
use crate::revision::changes::{ChangeOutcome, ProposedChange};

#[derive(Debug, Clone, Deserialize)]
pub struct RevisionRequest {
    pub user_id: Uuid,
    pub document: ResumeDocument,
    pub changes: Vec<ProposedChange>,
    #[serde(default)]
    pub job_description: Option<String>,
    /// Score the caller last saw; the delta is reported against it.
    #[serde(default)]
    pub baseline_score: Option<u8>,
    #[serde(default)]
    pub theme: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevisionResponse {
    pub document: ResumeDocument,
    pub outcomes: Vec<ChangeOutcome>,
    pub applied_count: usize,
    pub forwarded: Vec<ProposedChange>,
    pub ats: AtsScoreOutput,
    pub score: ScoreDelta,
    /// Id of the committed version; absent when nothing was applied.
    pub history_entry_id: Option<Uuid>,
    pub committed: bool,
    pub language: LanguageTag,
    pub cursor: Cursor,
}

/// Upper bound on preview rendering; past it the version commits without
/// artifacts.
const RENDER_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RevisionPipeline {
    applicator: DiffApplicator,
    engine: Arc<AtsEngine>,
    history: Arc<HistoryService>,
    renderer: Arc<dyn ArtifactRenderer>,
    scoring_timeout: Duration,
    render_timeout: Duration,
}

impl RevisionPipeline {
    pub fn new(
        applicator: DiffApplicator,
        engine: Arc<AtsEngine>,
        history: Arc<HistoryService>,
        renderer: Arc<dyn ArtifactRenderer>,
        scoring_timeout: Duration,
    ) -> Self {
        Self {
            applicator,
            engine,
            history,
            renderer,
            scoring_timeout,
            render_timeout: RENDER_TIMEOUT,
        }
    }

    pub fn with_render_timeout(mut self, limit: Duration) -> Self {
        self.render_timeout = limit;
        self
    }

    pub async fn run(&self, request: RevisionRequest) -> Result<RevisionResponse, StoreError> {
        let RevisionRequest {
            user_id,
            document,
            changes,
            job_description,
            baseline_score,
            theme,
        } = request;

        let applied = self.applicator.apply(&document, &changes);
        let mut revised = applied.document;

        let after_text = revised.to_plain_text();
        revised.language = language::resolve(&document.language, &after_text);

        let mut ats = self
            .engine
            .score_with_timeout(
                document.to_plain_text(),
                after_text,
                job_description,
                self.scoring_timeout,
            )
            .await;
        if revised.language.code != "en" {
            ats.metadata.warnings.push(format!(
                "scoring heuristics are tuned for English; document language is '{}'",
                revised.language.code
            ));
        }
        let score = ScoreDelta::from_output(&ats, baseline_score);

        let (history_entry_id, cursor) = if applied.applied_count == 0 {
            info!("Revision for user {user_id}: nothing applied, history left unchanged");
            (None, self.history.cursor(user_id).await?)
        } else {
            let mut entry = VersionEntry::new(user_id, revised.clone(), ats.ats_score_optimized);
            entry.proposed_changes = changes;
            entry.score_delta = baseline_score.map(|_| score.delta);
            entry.artifacts = self
                .render_preview(user_id, entry.id, &revised, Theme::parse(theme.as_deref()))
                .await;

            let id = entry.id;
            let cursor = self.history.commit(entry).await?;
            info!(
                "Revision for user {user_id}: {} applied, score {} -> {}",
                applied.applied_count, score.before, score.score
            );
            (Some(id), cursor)
        };

        Ok(RevisionResponse {
            language: revised.language.clone(),
            document: revised,
            outcomes: applied.outcomes,
            applied_count: applied.applied_count,
            forwarded: applied.forwarded,
            ats,
            score,
            committed: history_entry_id.is_some(),
            history_entry_id,
            cursor,
        })
    }

    /// Rendering failures and timeouts leave the version without artifacts.
    async fn render_preview(
        &self,
        user_id: Uuid,
        version_id: Uuid,
        document: &ResumeDocument,
        theme: Theme,
    ) -> Vec<Artifact> {
        let render = self.renderer.render(user_id, version_id, document, theme);
        match tokio::time::timeout(self.render_timeout, render).await {
            Ok(Ok(artifacts)) => artifacts,
            Ok(Err(e)) => {
                warn!("Preview render failed for version {version_id}: {e}");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    "Preview render for version {version_id} exceeded {}ms",
                    self.render_timeout.as_millis()
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::store::InMemoryHistoryStore;
    use crate::models::history::ArtifactKind;
    use crate::models::resume::ExperienceEntry;
    use crate::render::RenderError;
    use crate::revision::applicator::AppendPolicy;
    use crate::revision::changes::{ChangeScope, ChangeStatus};
    use async_trait::async_trait;

    struct FakeRenderer {
        fail: bool,
    }

    /// Never finishes within any reasonable deadline.
    struct StalledRenderer;

    #[async_trait]
    impl ArtifactRenderer for StalledRenderer {
        async fn render(
            &self,
            _: Uuid,
            _: Uuid,
            _: &ResumeDocument,
            _: Theme,
        ) -> Result<Vec<Artifact>, RenderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl ArtifactRenderer for FakeRenderer {
        async fn render(
            &self,
            _: Uuid,
            version_id: Uuid,
            _: &ResumeDocument,
            _: Theme,
        ) -> Result<Vec<Artifact>, RenderError> {
            if self.fail {
                return Err(RenderError::Upload("bucket unavailable".to_string()));
            }
            Ok(vec![Artifact {
                kind: ArtifactKind::MarkdownPreview,
                reference: format!("{version_id}.md"),
            }])
        }
    }

    fn pipeline(fail_render: bool) -> (RevisionPipeline, Arc<HistoryService>) {
        let history = Arc::new(HistoryService::new(Arc::new(InMemoryHistoryStore::new())));
        let pipeline = RevisionPipeline::new(
            DiffApplicator::new(AppendPolicy::Always),
            Arc::new(AtsEngine::new()),
            Arc::clone(&history),
            Arc::new(FakeRenderer { fail: fail_render }),
            Duration::from_secs(5),
        );
        (pipeline, history)
    }

    fn document() -> ResumeDocument {
        ResumeDocument {
            summary: "Experienced engineer".to_string(),
            experience: vec![ExperienceEntry {
                company: "Acme".to_string(),
                title: "Backend Engineer".to_string(),
                start_date: Some("2020".to_string()),
                achievements: vec!["Built payment APIs in Rust".to_string()],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn summary_change() -> ProposedChange {
        serde_json::from_value(serde_json::json!({
            "id": "c1",
            "scope": "paragraph",
            "before": "Experienced engineer",
            "after": "Senior engineer with 8 years",
        }))
        .unwrap()
    }

    fn request(user_id: Uuid, document: ResumeDocument, baseline: Option<u8>) -> RevisionRequest {
        RevisionRequest {
            user_id,
            document,
            changes: vec![summary_change()],
            job_description: Some("Senior Rust Engineer\nBuild payment APIs in Rust".to_string()),
            baseline_score: baseline,
            theme: None,
        }
    }

    #[tokio::test]
    async fn test_apply_then_reapply_is_not_applicable() {
        let (pipeline, history) = pipeline(false);
        let user = Uuid::new_v4();

        let first = pipeline.run(request(user, document(), None)).await.unwrap();
        assert_eq!(first.applied_count, 1);
        assert_eq!(first.document.summary, "Senior engineer with 8 years");
        assert_eq!(first.cursor, Cursor::At(0));

        let second = pipeline
            .run(request(user, first.document.clone(), None))
            .await
            .unwrap();
        assert_eq!(second.applied_count, 0);
        assert!(matches!(
            second.outcomes[0].status,
            ChangeStatus::NotApplicable { .. }
        ));
        assert_eq!(second.document.summary, first.document.summary);
        assert!(!second.committed);
        assert_eq!(second.history_entry_id, None);
        assert_eq!(second.cursor, Cursor::At(0));

        let listing = history.list(user).await.unwrap();
        assert_eq!(listing.versions.len(), 1);
        assert_eq!(listing.cursor, Cursor::At(0));
    }

    #[tokio::test]
    async fn test_noop_batch_after_undo_keeps_redo_branch() {
        let (pipeline, history) = pipeline(false);
        let user = Uuid::new_v4();

        let first = pipeline.run(request(user, document(), None)).await.unwrap();
        let mut staff = request(user, first.document.clone(), None);
        staff.changes = vec![serde_json::from_value(serde_json::json!({
            "id": "c2",
            "scope": "paragraph",
            "before": "Senior engineer",
            "after": "Staff engineer",
        }))
        .unwrap()];
        let second = pipeline.run(staff).await.unwrap();
        assert!(second.committed);

        history.undo(user).await.unwrap();
        let noop = pipeline
            .run(request(user, first.document.clone(), None))
            .await
            .unwrap();
        assert_eq!(noop.applied_count, 0);
        assert_eq!(noop.cursor, Cursor::At(0));

        let redo = history.redo(user).await.unwrap();
        assert_eq!(redo.entry.unwrap().id, second.history_entry_id.unwrap());
        assert_eq!(history.list(user).await.unwrap().versions.len(), 2);
    }

    #[tokio::test]
    async fn test_commit_carries_score_artifacts_and_changes() {
        let (pipeline, history) = pipeline(false);
        let user = Uuid::new_v4();

        let response = pipeline.run(request(user, document(), Some(40))).await.unwrap();
        assert_eq!(response.score.before, 40);
        assert_eq!(response.score.delta, i32::from(response.score.score) - 40);

        assert!(response.committed);
        let entry = history.current(user).await.unwrap().unwrap();
        assert_eq!(Some(entry.id), response.history_entry_id);
        assert_eq!(entry.ats_score, response.ats.ats_score_optimized);
        assert_eq!(entry.score_delta, Some(response.score.delta));
        assert_eq!(entry.proposed_changes.len(), 1);
        assert_eq!(entry.artifacts.len(), 1);
        assert_eq!(entry.language.code, "en");
    }

    #[tokio::test]
    async fn test_render_failure_still_commits() {
        let (pipeline, history) = pipeline(true);
        let user = Uuid::new_v4();

        let response = pipeline.run(request(user, document(), None)).await.unwrap();
        let entry = history.current(user).await.unwrap().unwrap();
        assert_eq!(Some(entry.id), response.history_entry_id);
        assert!(entry.artifacts.is_empty());
        assert_eq!(entry.score_delta, None);
    }

    #[tokio::test]
    async fn test_stalled_render_still_commits() {
        let history = Arc::new(HistoryService::new(Arc::new(InMemoryHistoryStore::new())));
        let pipeline = RevisionPipeline::new(
            DiffApplicator::new(AppendPolicy::Always),
            Arc::new(AtsEngine::new()),
            Arc::clone(&history),
            Arc::new(StalledRenderer),
            Duration::from_secs(5),
        )
        .with_render_timeout(Duration::from_millis(50));
        let user = Uuid::new_v4();

        let response = pipeline.run(request(user, document(), None)).await.unwrap();
        assert!(response.committed);
        let entry = history.current(user).await.unwrap().unwrap();
        assert_eq!(Some(entry.id), response.history_entry_id);
        assert!(entry.artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_forwarded_changes_leave_document_unchanged() {
        let (pipeline, _) = pipeline(false);
        let style: ProposedChange = serde_json::from_value(serde_json::json!({
            "id": "s1",
            "scope": ChangeScope::Style,
            "after": "bold headings",
        }))
        .unwrap();
        let mut req = request(Uuid::new_v4(), document(), None);
        req.changes = vec![style];

        let response = pipeline.run(req).await.unwrap();
        assert_eq!(response.applied_count, 0);
        assert_eq!(response.forwarded.len(), 1);
        assert_eq!(response.document.summary, "Experienced engineer");
        assert!(!response.committed);
    }
}
