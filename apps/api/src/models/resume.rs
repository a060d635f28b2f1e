use serde::{Deserialize, Serialize};

/// Where a document's language tag came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageSource {
    /// Set explicitly by the user. Never overwritten by detection.
    User,
    Detected,
    #[default]
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageTag {
    pub code: String,
    pub confidence: f64,
    pub rtl: bool,
    pub source: LanguageSource,
}

impl Default for LanguageTag {
    fn default() -> Self {
        Self {
            code: "en".to_string(),
            confidence: 0.0,
            rtl: false,
            source: LanguageSource::Default,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub links: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceEntry {
    pub company: String,
    pub title: String,
    pub start_date: Option<String>,
    /// `None` means a current position.
    pub end_date: Option<String>,
    pub location: Option<String>,
    pub achievements: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EducationEntry {
    pub institution: String,
    pub degree: String,
    pub field: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Skills {
    pub technical: Vec<String>,
    pub soft: Vec<String>,
}

impl Skills {
    pub fn is_empty(&self) -> bool {
        self.technical.is_empty() && self.soft.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectEntry {
    pub name: String,
    pub description: String,
    pub technologies: Vec<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificationEntry {
    pub name: String,
    pub issuer: Option<String>,
    pub date: Option<String>,
}

/// A structured resume. Owned by the caller; every engine operation takes it by
/// reference or value and returns a fresh copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeDocument {
    pub summary: String,
    pub contact: Contact,
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
    pub skills: Skills,
    pub projects: Vec<ProjectEntry>,
    pub certifications: Vec<CertificationEntry>,
    pub language: LanguageTag,
}

impl ResumeDocument {
    /// Flattens the document into the sectioned plain text consumed by the scorer.
    ///
    /// Section headings are upper-case on their own line and achievements are
    /// rendered as `- ` bullet lines, so text-level analyzers can recover structure.
    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();

        if !self.contact.name.is_empty() {
            out.push_str(&self.contact.name);
            out.push('\n');
        }
        let contact_line: Vec<&str> = [
            self.contact.email.as_deref(),
            self.contact.phone.as_deref(),
            self.contact.location.as_deref(),
        ]
        .into_iter()
        .flatten()
        .chain(self.contact.links.iter().map(String::as_str))
        .collect();
        if !contact_line.is_empty() {
            out.push_str(&contact_line.join(" | "));
            out.push('\n');
        }

        if !self.summary.trim().is_empty() {
            out.push_str("\nSUMMARY\n");
            out.push_str(self.summary.trim());
            out.push('\n');
        }

        if !self.experience.is_empty() {
            out.push_str("\nEXPERIENCE\n");
            for exp in &self.experience {
                out.push_str(&format!("{} at {}", exp.title, exp.company));
                let dates = date_range(exp.start_date.as_deref(), exp.end_date.as_deref());
                if !dates.is_empty() {
                    out.push_str(&format!(" ({dates})"));
                }
                out.push('\n');
                for achievement in &exp.achievements {
                    out.push_str("- ");
                    out.push_str(achievement);
                    out.push('\n');
                }
            }
        }

        if !self.education.is_empty() {
            out.push_str("\nEDUCATION\n");
            for edu in &self.education {
                out.push_str(&format!("{}, {}", edu.degree, edu.institution));
                if let Some(field) = &edu.field {
                    out.push_str(&format!(" ({field})"));
                }
                let dates = date_range(edu.start_date.as_deref(), edu.end_date.as_deref());
                if !dates.is_empty() {
                    out.push_str(&format!(" {dates}"));
                }
                out.push('\n');
            }
        }

        if !self.skills.is_empty() {
            out.push_str("\nSKILLS\n");
            if !self.skills.technical.is_empty() {
                out.push_str(&format!("Technical: {}\n", self.skills.technical.join(", ")));
            }
            if !self.skills.soft.is_empty() {
                out.push_str(&format!("Soft: {}\n", self.skills.soft.join(", ")));
            }
        }

        if !self.projects.is_empty() {
            out.push_str("\nPROJECTS\n");
            for project in &self.projects {
                out.push_str(&project.name);
                if !project.description.is_empty() {
                    out.push_str(&format!(": {}", project.description));
                }
                if !project.technologies.is_empty() {
                    out.push_str(&format!(" [{}]", project.technologies.join(", ")));
                }
                out.push('\n');
            }
        }

        if !self.certifications.is_empty() {
            out.push_str("\nCERTIFICATIONS\n");
            for cert in &self.certifications {
                out.push_str(&cert.name);
                if let Some(issuer) = &cert.issuer {
                    out.push_str(&format!(", {issuer}"));
                }
                if let Some(date) = &cert.date {
                    out.push_str(&format!(" ({date})"));
                }
                out.push('\n');
            }
        }

        out
    }
}

fn date_range(start: Option<&str>, end: Option<&str>) -> String {
    match (start, end) {
        (Some(s), Some(e)) => format!("{s} - {e}"),
        (Some(s), None) => format!("{s} - Present"),
        (None, Some(e)) => e.to_string(),
        (None, None) => String::new(),
    }
}
