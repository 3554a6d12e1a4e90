//! Request construction driven by the active dimension list.
//!
//! Labels and guidance are copied verbatim and dimensions keep caller order, so a
//! given configuration always produces a byte-identical request.

use crate::analysis::models::{AnalysisInput, DimensionSpec, ScoringSettings};
use crate::analysis::prompts::{
    ANALYSIS_SYSTEM_TEMPLATE, CANDIDATE_HEADER, CANDIDATE_NOTES_HEADER, CONTEXT_HEADER,
    JOB_HEADER, JOB_NOTES_HEADER, NONE_PROVIDED,
};
use crate::llm_client::prompts::{EVIDENCE_INSTRUCTION, JSON_ONLY_SYSTEM};
use crate::llm_client::ModelRequest;

/// The dimension-dependent pieces of the outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSchema {
    /// JSON-shaped sketch of the expected response.
    pub response_schema_sketch: String,
    /// One instruction line per active dimension, in order.
    pub dimension_instructions: Vec<String>,
}

/// Builds the schema sketch and per-dimension instructions for the active dimensions.
/// Inactive entries are skipped.
pub fn build_request_schema(dimensions: &[&DimensionSpec]) -> RequestSchema {
    let active: Vec<&DimensionSpec> = dimensions.iter().copied().filter(|d| d.is_active).collect();

    let dimension_instructions = active
        .iter()
        .enumerate()
        .map(|(i, d)| {
            format!(
                "{}. {} (key \"{}\"): {}",
                i + 1,
                d.label,
                d.id,
                d.prompt_guidance
            )
        })
        .collect();

    RequestSchema {
        response_schema_sketch: schema_sketch(&active),
        dimension_instructions,
    }
}

fn schema_sketch(dimensions: &[&DimensionSpec]) -> String {
    let score_lines = dimensions
        .iter()
        .map(|d| {
            format!(
                "    {}: {{ \"score\": 0, \"explanation\": \"string\", \"details\": {{}} }}",
                quote(&d.id)
            )
        })
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        "{{\n  \"candidateName\": \"string\",\n  \"jobTitle\": \"string\",\n  \"scores\": {{\n{score_lines}\n  }},\n  \"overallScore\": 0,\n  \"detailedExplanation\": \"string\",\n  \"positivePoints\": [\"string\"],\n  \"painPoints\": [\"string\"],\n  \"discussionPoints\": [\"string\"]\n}}"
    )
}

fn quote(id: &str) -> String {
    serde_json::Value::String(id.to_string()).to_string()
}

/// Renders the full system instruction.
pub fn build_system_instruction(schema: &RequestSchema, language: &str) -> String {
    ANALYSIS_SYSTEM_TEMPLATE
        .replace("{json_only}", JSON_ONLY_SYSTEM)
        .replace("{evidence_instruction}", EVIDENCE_INSTRUCTION)
        .replace("{language}", language)
        .replace(
            "{dimension_instructions}",
            &schema.dimension_instructions.join("\n"),
        )
        .replace("{schema_sketch}", &schema.response_schema_sketch)
}

/// Content parts in fixed order: candidate, candidate notes, job, job notes, and
/// the retrieved-context block when present. Missing notes get an explicit marker.
pub fn build_content_parts(input: &AnalysisInput) -> Vec<String> {
    let mut parts = vec![
        format!("{CANDIDATE_HEADER}\n{}", input.candidate_text),
        format!(
            "{CANDIDATE_NOTES_HEADER}\n{}",
            input.candidate_notes().unwrap_or(NONE_PROVIDED)
        ),
        format!("{JOB_HEADER}\n{}", input.job_text),
        format!(
            "{JOB_NOTES_HEADER}\n{}",
            input.job_notes().unwrap_or(NONE_PROVIDED)
        ),
    ];
    if let Some(context) = input.retrieved_context() {
        parts.push(format!("{CONTEXT_HEADER}\n{context}"));
    }
    parts
}

pub fn build_model_request(
    input: &AnalysisInput,
    settings: &ScoringSettings,
    model_id: &str,
) -> ModelRequest {
    let schema = build_request_schema(&settings.active_dimensions());
    ModelRequest {
        model: model_id.to_string(),
        system: build_system_instruction(&schema, &input.language),
        parts: build_content_parts(input),
        max_tokens: settings.max_output_tokens,
        temperature: settings.temperature,
    }
}
