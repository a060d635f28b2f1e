use crate::llm_client::prompts::FIDELITY_INSTRUCTION;
use crate::models::resume::ResumeDocument;

pub const PROPOSE_SYSTEM: &str = "You are an expert resume editor who improves how \
    resumes score in applicant tracking systems. You return edit proposals as JSON \
    and never rewrite the whole resume.";

/// Renders the resume with structural pointers so the model can target bullets.
fn addressed_resume(document: &ResumeDocument) -> String {
    let mut out = String::new();
    out.push_str(&format!("SUMMARY (pointer /summary):\n{}\n\n", document.summary));
    for (i, role) in document.experience.iter().enumerate() {
        out.push_str(&format!(
            "EXPERIENCE {i}: {} at {}\n",
            role.title, role.company
        ));
        for (j, bullet) in role.achievements.iter().enumerate() {
            out.push_str(&format!("  [/experience/{i}/achievements/{j}] {bullet}\n"));
        }
    }
    if !document.skills.is_empty() {
        out.push_str(&format!(
            "\nSKILLS: {}\n",
            document.skills.technical.join(", ")
        ));
    }
    out
}

pub fn build_propose_prompt(document: &ResumeDocument, job_text: Option<&str>) -> String {
    let job_section = match job_text {
        Some(job) if !job.trim().is_empty() => format!("TARGET JOB DESCRIPTION:\n{job}"),
        _ => "No job description was supplied. Optimize for clarity and measurable impact.".to_string(),
    };

    format!(
        r#"Propose focused edits to this resume.

{job_section}

RESUME:
{resume}

{FIDELITY_INSTRUCTION}

Return a JSON object of the form:
{{
  "changes": [
    {{
      "id": "c1",
      "summary": "one-line description of the edit",
      "scope": "paragraph" | "bullet" | "style" | "layout",
      "category": "keywords" | "metrics" | "alignment" | "formatting",
      "confidence": "low" | "medium" | "high",
      "before": "exact current text being replaced (empty to add a new bullet)",
      "after": "replacement text",
      "metadata": {{
        "pointer": "/experience/0/achievements/1",
        "risk": "low" | "medium" | "high",
        "estimated_delta": 3,
        "requires_human_review": false
      }}
    }}
  ]
}}

Rules:
- Use "paragraph" for summary edits and "bullet" for achievement edits.
- Copy "before" verbatim from the resume.
- Propose at most 8 changes, highest expected impact first."#,
        resume = addressed_resume(document),
    )
}
