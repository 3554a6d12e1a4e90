// Prompt constants for compatibility analysis.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Replace: {json_only}, {evidence_instruction}, {language},
///          {dimension_instructions}, {schema_sketch}
pub const ANALYSIS_SYSTEM_TEMPLATE: &str = r#"You are an experienced technical recruiter assessing how well a candidate matches a job.

{json_only}

{evidence_instruction}

Write every explanation and list item in {language}. Keep JSON keys and dimension ids exactly as given.

Score each of the following dimensions from 0 to 100:
{dimension_instructions}

Then give an overall score from 0 to 100 reflecting the whole picture, not a plain average.

Return a JSON object with this EXACT shape:
{schema_sketch}

HARD RULES:
1. `scores` MUST contain every dimension id listed above and no others
2. Every `score` and `overallScore` is an integer between 0 and 100
3. Every `explanation` is a non-empty string
4. `positivePoints`, `painPoints` and `discussionPoints` are arrays of short strings
5. Use `discussionPoints` for questions worth raising in an interview"#;

/// Stands in for optional notes the caller left empty.
pub const NONE_PROVIDED: &str = "None provided.";

pub const CANDIDATE_HEADER: &str = "CANDIDATE PROFILE:";
pub const CANDIDATE_NOTES_HEADER: &str = "RECRUITER NOTES ON THE CANDIDATE:";
pub const JOB_HEADER: &str = "JOB DESCRIPTION:";
pub const JOB_NOTES_HEADER: &str = "RECRUITER NOTES ON THE JOB:";
pub const CONTEXT_HEADER: &str = "ADDITIONAL CONTEXT (reference material, not part of the candidate profile):";
