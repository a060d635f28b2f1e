use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeScope {
    Section,
    Paragraph,
    Bullet,
    Style,
    Layout,
}

impl ChangeScope {
    /// Style and layout changes never touch document content.
    pub fn is_presentational(self) -> bool {
        matches!(self, ChangeScope::Style | ChangeScope::Layout)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeMetadata {
    /// Structural pointer into the document, e.g. `/experience/1/achievements/0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_delta: Option<i32>,
    #[serde(default)]
    pub requires_human_review: bool,
    /// Any other annotations, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChangeMetadata {
    /// Experience index named by the structural pointer, if any.
    ///
    /// Accepts `/experience/<n>/...` and `experience[<n>]...` forms.
    pub fn experience_index(&self) -> Option<usize> {
        let pointer = self.pointer.as_deref()?.trim();
        let rest = pointer
            .trim_start_matches('/')
            .strip_prefix("experience")?;
        let rest = rest.trim_start_matches(&['/', '['][..]);
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }
}

/// A single edit instruction. Batches are applied in order, each best-effort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedChange {
    pub id: String,
    #[serde(default)]
    pub summary: String,
    pub scope: ChangeScope,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(default)]
    pub before: String,
    pub after: String,
    #[serde(default)]
    pub metadata: ChangeMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChangeStatus {
    /// `before` was found verbatim and replaced.
    Replaced,
    /// A bullet was matched by similarity and rewritten wholesale.
    FuzzyReplaced { similarity: f64 },
    /// No target matched; `after` was added as a new achievement.
    Appended { experience_index: usize },
    /// Presentational change handed to the presentation pipeline untouched.
    Forwarded,
    NotApplicable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeOutcome {
    pub change_id: String,
    #[serde(flatten)]
    pub status: ChangeStatus,
    pub applied: bool,
}

impl ChangeOutcome {
    pub fn new(change_id: &str, status: ChangeStatus) -> Self {
        let applied = matches!(
            status,
            ChangeStatus::Replaced | ChangeStatus::FuzzyReplaced { .. } | ChangeStatus::Appended { .. }
        );
        Self {
            change_id: change_id.to_string(),
            status,
            applied,
        }
    }

    pub fn not_applicable(change_id: &str, reason: impl Into<String>) -> Self {
        Self::new(
            change_id,
            ChangeStatus::NotApplicable {
                reason: reason.into(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_deserializes_with_defaults() {
        let json = r#"{
            "id": "c1",
            "scope": "bullet",
            "after": "Led migration to Rust",
            "metadata": {"pointer": "/experience/2/achievements/0", "source": "oracle"}
        }"#;
        let change: ProposedChange = serde_json::from_str(json).unwrap();
        assert_eq!(change.scope, ChangeScope::Bullet);
        assert_eq!(change.confidence, Confidence::Medium);
        assert!(change.before.is_empty());
        assert_eq!(change.metadata.experience_index(), Some(2));
        assert_eq!(change.metadata.extra["source"], "oracle");
    }

    #[test]
    fn test_experience_index_bracket_form() {
        let meta = ChangeMetadata {
            pointer: Some("experience[3].achievements[1]".to_string()),
            ..Default::default()
        };
        assert_eq!(meta.experience_index(), Some(3));
    }

    #[test]
    fn test_experience_index_other_section_is_none() {
        let meta = ChangeMetadata {
            pointer: Some("/education/0".to_string()),
            ..Default::default()
        };
        assert_eq!(meta.experience_index(), None);
    }

    #[test]
    fn test_outcome_applied_flag() {
        assert!(ChangeOutcome::new("a", ChangeStatus::Replaced).applied);
        assert!(!ChangeOutcome::new("b", ChangeStatus::Forwarded).applied);
        assert!(!ChangeOutcome::not_applicable("c", "no match").applied);
    }

    #[test]
    fn test_outcome_serializes_flat_status() {
        let outcome = ChangeOutcome::new("c1", ChangeStatus::Appended { experience_index: 0 });
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "appended");
        assert_eq!(value["experience_index"], 0);
        assert_eq!(value["applied"], true);
    }
}
