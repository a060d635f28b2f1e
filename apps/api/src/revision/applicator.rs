//! Applies an ordered batch of proposed changes to a resume.
//!
//! Every change is best-effort: one that cannot be placed is reported as
//! `not_applicable` and the rest of the batch continues. The input document is
//! never touched; a modified deep copy is returned.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::resume::{ExperienceEntry, ResumeDocument};
use crate::revision::changes::{ChangeOutcome, ChangeScope, ChangeStatus, Confidence, ProposedChange};
use crate::revision::similarity::{normalize, similarity, MATCH_THRESHOLD};

/// What to do with a bullet change whose `before` text matches nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppendPolicy {
    /// Append `after` as a new achievement unconditionally.
    #[default]
    Always,
    /// Append only for non-low confidence changes that don't require human review.
    Gated,
}

impl FromStr for AppendPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(AppendPolicy::Always),
            "gated" => Ok(AppendPolicy::Gated),
            other => Err(format!("unknown append policy '{other}' (expected always|gated)")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyResult {
    pub document: ResumeDocument,
    /// Number of changes that modified content. Forwarded changes don't count.
    pub applied_count: usize,
    pub outcomes: Vec<ChangeOutcome>,
    /// Style/layout changes handed on unchanged for the presentation pipeline.
    pub forwarded: Vec<ProposedChange>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DiffApplicator {
    append_policy: AppendPolicy,
}

impl DiffApplicator {
    pub fn new(append_policy: AppendPolicy) -> Self {
        Self { append_policy }
    }

    pub fn apply(&self, document: &ResumeDocument, changes: &[ProposedChange]) -> ApplyResult {
        let mut updated = document.clone();
        let mut outcomes = Vec::with_capacity(changes.len());
        let mut forwarded = Vec::new();

        for change in changes {
            let outcome = match change.scope {
                ChangeScope::Paragraph | ChangeScope::Section => {
                    apply_to_summary(&mut updated.summary, change)
                }
                ChangeScope::Bullet => {
                    apply_to_bullets(&mut updated.experience, change, self.append_policy)
                }
                ChangeScope::Style | ChangeScope::Layout => {
                    forwarded.push(change.clone());
                    ChangeOutcome::new(&change.id, ChangeStatus::Forwarded)
                }
            };
            debug!("change {} -> {:?}", change.id, outcome.status);
            outcomes.push(outcome);
        }

        let applied_count = outcomes.iter().filter(|o| o.applied).count();
        ApplyResult {
            document: updated,
            applied_count,
            outcomes,
            forwarded,
        }
    }
}

fn apply_to_summary(summary: &mut String, change: &ProposedChange) -> ChangeOutcome {
    if change.before.is_empty() {
        if summary.trim().is_empty() && !change.after.trim().is_empty() {
            *summary = change.after.clone();
            return ChangeOutcome::new(&change.id, ChangeStatus::Replaced);
        }
        return ChangeOutcome::not_applicable(&change.id, "empty `before` on a non-empty summary");
    }

    // `after` may itself contain `before`; once it is present the change is done.
    if change.after.contains(&change.before) && summary.contains(&change.after) {
        return ChangeOutcome::not_applicable(&change.id, "change already satisfied");
    }

    if summary.contains(&change.before) {
        *summary = summary.replacen(&change.before, &change.after, 1);
        ChangeOutcome::new(&change.id, ChangeStatus::Replaced)
    } else {
        ChangeOutcome::not_applicable(&change.id, "`before` text not found in summary")
    }
}

fn apply_to_bullets(
    experience: &mut [ExperienceEntry],
    change: &ProposedChange,
    policy: AppendPolicy,
) -> ChangeOutcome {
    let target = normalize(&change.after);
    if target.is_empty() {
        return ChangeOutcome::not_applicable(&change.id, "empty replacement text");
    }

    if bullet_change_satisfied(experience, change, &target) {
        return ChangeOutcome::not_applicable(&change.id, "change already satisfied");
    }

    let pointed = change
        .metadata
        .experience_index()
        .filter(|&i| i < experience.len());

    if !change.before.trim().is_empty() {
        let all: Vec<usize> = (0..experience.len()).collect();
        let scans: Vec<Vec<usize>> = match pointed {
            Some(i) => vec![vec![i], all],
            None => vec![all],
        };

        for indices in &scans {
            if let Some((ei, bi)) = find_exact(experience, indices, &change.before) {
                let bullet = &mut experience[ei].achievements[bi];
                *bullet = bullet.replacen(&change.before, &change.after, 1);
                return ChangeOutcome::new(&change.id, ChangeStatus::Replaced);
            }
            if let Some((ei, bi, score)) = find_fuzzy(experience, indices, &change.before) {
                experience[ei].achievements[bi] = change.after.clone();
                return ChangeOutcome::new(
                    &change.id,
                    ChangeStatus::FuzzyReplaced { similarity: score },
                );
            }
        }
    }

    if experience.is_empty() {
        return ChangeOutcome::not_applicable(&change.id, "no experience entries to place bullet");
    }

    if policy == AppendPolicy::Gated
        && (change.confidence == Confidence::Low || change.metadata.requires_human_review)
    {
        return ChangeOutcome::not_applicable(
            &change.id,
            "no matching bullet; append withheld pending review",
        );
    }

    let index = pointed.unwrap_or(0);
    experience[index].achievements.push(change.after.clone());
    ChangeOutcome::new(
        &change.id,
        ChangeStatus::Appended {
            experience_index: index,
        },
    )
}

/// A bullet change is done once some achievement equals `after`, or holds
/// `after` while no achievement still holds `before`. The second case covers
/// substring edits, which leave the rest of the bullet in place.
fn bullet_change_satisfied(
    experience: &[ExperienceEntry],
    change: &ProposedChange,
    target: &str,
) -> bool {
    let bullets = || experience.iter().flat_map(|e| e.achievements.iter());
    if bullets().any(|a| normalize(a) == target) {
        return true;
    }
    if change.before.trim().is_empty() {
        return false;
    }
    let holds_after = bullets().any(|a| normalize(a).contains(target));
    let before_pending = !change.after.contains(&change.before)
        && bullets().any(|a| a.contains(&change.before));
    holds_after && !before_pending
}

fn find_exact(
    experience: &[ExperienceEntry],
    indices: &[usize],
    before: &str,
) -> Option<(usize, usize)> {
    indices.iter().find_map(|&ei| {
        experience[ei]
            .achievements
            .iter()
            .position(|a| a.contains(before))
            .map(|bi| (ei, bi))
    })
}

/// Highest-scoring bullet at or above [`MATCH_THRESHOLD`]; earliest wins ties.
fn find_fuzzy(
    experience: &[ExperienceEntry],
    indices: &[usize],
    before: &str,
) -> Option<(usize, usize, f64)> {
    let mut best: Option<(usize, usize, f64)> = None;
    for &ei in indices {
        for (bi, achievement) in experience[ei].achievements.iter().enumerate() {
            let score = similarity(before, achievement);
            if score < MATCH_THRESHOLD {
                continue;
            }
            if best.map_or(true, |(_, _, s)| score > s) {
                best = Some((ei, bi, score));
            }
        }
    }
    best
}
