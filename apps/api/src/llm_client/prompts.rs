// Shared prompt constants.
// Each pipeline that needs model calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Keeps scores tied to the supplied documents.
pub const EVIDENCE_INSTRUCTION: &str = "\
    CRITICAL: Base every score and explanation only on the candidate and job material provided. \
    Do NOT assume skills, credentials or experience that the material does not show. \
    When evidence for a dimension is missing, say so in its explanation and score it accordingly.";
