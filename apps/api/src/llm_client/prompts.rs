// Cross-cutting prompt fragments. Each service that calls the LLM keeps its
// own prompts.rs next to it and composes these in.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Keeps rewrites honest: nothing may be added that the resume doesn't support.
pub const FIDELITY_INSTRUCTION: &str = "\
    CRITICAL: Every rewrite must stay faithful to the candidate's resume. \
    Do NOT invent employers, titles, dates, metrics, or technologies. \
    When a bullet would benefit from a number the resume does not contain, \
    keep the wording qualitative and append the marker [LOW_METRICS].";
