// Shared prompt fragments.
// Each chain's own templates live in chains/prompts.rs; this file holds
// the cross-cutting pieces several chains append to their system prompts.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Appended to chains whose output is consumed verbatim by code.
pub const BARE_OUTPUT_INSTRUCTION: &str = "\
    Respond with the requested value only. No greeting, no explanation, \
    no quotation marks, no markdown.";

/// Keeps every applicant-facing chain grounded in what was actually said.
pub const TRANSCRIPT_GROUNDING_INSTRUCTION: &str = "\
    Use ONLY information the applicant stated in the transcript. \
    Do NOT infer, embellish, or invent details. \
    If something was not stated, leave it empty.";
