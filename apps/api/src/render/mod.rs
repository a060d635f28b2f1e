//! Preview rendering. Produces a markdown rendition of a revised resume and
//! stores it in S3; the object key becomes the version's artifact reference.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::history::{Artifact, ArtifactKind};
use crate::models::resume::ResumeDocument;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("upload failed: {0}")]
    Upload(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Classic,
    Compact,
}

impl Theme {
    /// Unknown or missing theme names fall back to the default.
    pub fn parse(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_ascii_lowercase()).as_deref() {
            Some("compact") => Theme::Compact,
            _ => Theme::Classic,
        }
    }
}

#[async_trait]
pub trait ArtifactRenderer: Send + Sync {
    async fn render(
        &self,
        user_id: Uuid,
        version_id: Uuid,
        document: &ResumeDocument,
        theme: Theme,
    ) -> Result<Vec<Artifact>, RenderError>;
}

fn heading(md: &mut String, theme: Theme, title: &str) {
    match theme {
        Theme::Classic => md.push_str(&format!("\n## {title}\n\n")),
        Theme::Compact => md.push_str(&format!("\n**{}**\n", title.to_uppercase())),
    }
}

/// Markdown rendition of `document`. Empty sections are skipped.
pub fn render_markdown(document: &ResumeDocument, theme: Theme) -> String {
    let mut md = String::new();
    let name = if document.contact.name.is_empty() {
        "Resume"
    } else {
        document.contact.name.as_str()
    };
    md.push_str(&format!("# {name}\n"));

    let contact: Vec<&str> = [
        document.contact.email.as_deref(),
        document.contact.phone.as_deref(),
        document.contact.location.as_deref(),
    ]
    .into_iter()
    .flatten()
    .chain(document.contact.links.iter().map(String::as_str))
    .collect();
    if !contact.is_empty() {
        md.push_str(&format!("{}\n", contact.join(" · ")));
    }

    if !document.summary.trim().is_empty() {
        heading(&mut md, theme, "Summary");
        md.push_str(&format!("{}\n", document.summary.trim()));
    }

    if !document.experience.is_empty() {
        heading(&mut md, theme, "Experience");
        for role in &document.experience {
            let end = role.end_date.as_deref().unwrap_or("Present");
            let start = role.start_date.as_deref().unwrap_or("");
            md.push_str(&format!("### {} · {}", role.title, role.company));
            if !start.is_empty() {
                md.push_str(&format!(" ({start} – {end})"));
            }
            md.push('\n');
            for bullet in &role.achievements {
                md.push_str(&format!("- {bullet}\n"));
            }
        }
    }

    if !document.education.is_empty() {
        heading(&mut md, theme, "Education");
        for edu in &document.education {
            match edu.field.as_deref() {
                Some(field) => md.push_str(&format!("- {} in {field}, {}\n", edu.degree, edu.institution)),
                None => md.push_str(&format!("- {}, {}\n", edu.degree, edu.institution)),
            }
        }
    }

    if !document.skills.is_empty() {
        heading(&mut md, theme, "Skills");
        if !document.skills.technical.is_empty() {
            md.push_str(&format!("- **Technical:** {}\n", document.skills.technical.join(", ")));
        }
        if !document.skills.soft.is_empty() {
            md.push_str(&format!("- **Soft:** {}\n", document.skills.soft.join(", ")));
        }
    }

    if !document.projects.is_empty() {
        heading(&mut md, theme, "Projects");
        for project in &document.projects {
            md.push_str(&format!("- **{}**: {}\n", project.name, project.description));
        }
    }

    if !document.certifications.is_empty() {
        heading(&mut md, theme, "Certifications");
        for cert in &document.certifications {
            match cert.issuer.as_deref() {
                Some(issuer) => md.push_str(&format!("- {}, {issuer}\n", cert.name)),
                None => md.push_str(&format!("- {}\n", cert.name)),
            }
        }
    }
    md
}

pub struct S3MarkdownRenderer {
    s3: aws_sdk_s3::Client,
    bucket: String,
}

impl S3MarkdownRenderer {
    pub fn new(s3: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { s3, bucket }
    }

    pub fn object_key(user_id: Uuid, version_id: Uuid) -> String {
        format!("revisions/{user_id}/{version_id}.md")
    }
}

#[async_trait]
impl ArtifactRenderer for S3MarkdownRenderer {
    async fn render(
        &self,
        user_id: Uuid,
        version_id: Uuid,
        document: &ResumeDocument,
        theme: Theme,
    ) -> Result<Vec<Artifact>, RenderError> {
        let key = Self::object_key(user_id, version_id);
        let body = render_markdown(document, theme);

        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body.into_bytes()))
            .content_type("text/markdown")
            .send()
            .await
            .map_err(|e| RenderError::Upload(e.to_string()))?;

        info!("Uploaded revision preview to s3://{}/{}", self.bucket, key);
        Ok(vec![Artifact {
            kind: ArtifactKind::MarkdownPreview,
            reference: key,
        }])
    }
}
