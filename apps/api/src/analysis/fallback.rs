//! Fallback results: structurally valid, all-zero documents flagged with the
//! failing stage. Returned to callers, never cached.

use std::collections::BTreeMap;

use crate::analysis::error::AnalysisError;
use crate::analysis::models::{
    AnalysisInput, AnalysisResult, DimensionScores, DimensionSpec, FallbackInfo, ScoreComponent,
};

/// Characters of untrusted model text allowed into diagnostics and logs.
pub const DIAGNOSTIC_PREFIX_CHARS: usize = 500;

/// User-facing message for quota exhaustion, distinct from other transport failures.
pub const QUOTA_MESSAGE: &str =
    "Rate limit exceeded: the AI service quota is exhausted. Please try again later.";

const NOT_CONFIGURED_NOTE: &str =
    "Not configured: AI analysis is unavailable until model credentials are provided.";

/// First `max_chars` characters of `text`, with `…` appended when cut.
pub fn bounded_prefix(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let prefix: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{prefix}…")
    } else {
        prefix
    }
}

/// Builds the fallback document for `error`. `raw_response` is the model output,
/// when the failure happened after the model answered.
pub fn build_fallback(
    error: &AnalysisError,
    raw_response: Option<&str>,
    input: &AnalysisInput,
    dimensions: &[&DimensionSpec],
) -> AnalysisResult {
    let stage = error.stage();

    let (summary, dimension_note) = match error {
        AnalysisError::Config(message) => (
            format!("Analysis not configured: {message}."),
            NOT_CONFIGURED_NOTE.to_string(),
        ),
        AnalysisError::Transport {
            quota: true,
            message,
        } => (
            format!(
                "{QUOTA_MESSAGE} ({})",
                bounded_prefix(message, DIAGNOSTIC_PREFIX_CHARS)
            ),
            QUOTA_MESSAGE.to_string(),
        ),
        AnalysisError::Transport {
            quota: false,
            message,
        } => critical(stage.as_str(), message),
        AnalysisError::Repair(failure) => critical(stage.as_str(), &failure.reason),
        AnalysisError::Validation(failure) => critical(stage.as_str(), &failure.reason),
        AnalysisError::Cache(cache_error) => critical(stage.as_str(), &cache_error.to_string()),
    };

    let detailed_explanation = match raw_response {
        Some(raw) => format!(
            "{summary} Raw response (first {DIAGNOSTIC_PREFIX_CHARS} chars): {}",
            bounded_prefix(raw, DIAGNOSTIC_PREFIX_CHARS)
        ),
        None => summary,
    };

    let scores = dimensions
        .iter()
        .filter(|d| d.is_active)
        .map(|d| {
            (
                d.id.clone(),
                ScoreComponent {
                    score: 0,
                    explanation: dimension_note.clone(),
                    details: None,
                },
            )
        })
        .collect::<BTreeMap<_, _>>();

    AnalysisResult {
        candidate_name: input.candidate_name.clone(),
        job_title: input.job_title.clone(),
        scores: DimensionScores::from_map(scores),
        overall_score: 0,
        detailed_explanation,
        positive_points: Vec::new(),
        pain_points: Vec::new(),
        discussion_points: Vec::new(),
        error: Some(FallbackInfo {
            stage,
            message: bounded_prefix(&error.to_string(), DIAGNOSTIC_PREFIX_CHARS),
            rate_limited: error.is_quota(),
        }),
    }
}

fn critical(stage: &str, message: &str) -> (String, String) {
    (
        format!(
            "Critical Error during the {stage} stage: {}.",
            bounded_prefix(message, DIAGNOSTIC_PREFIX_CHARS)
        ),
        format!("Critical Error: no score available ({stage} stage failed)."),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::models::{default_dimensions, FailureStage};
    use crate::analysis::validation::ValidationFailure;

    fn input() -> AnalysisInput {
        AnalysisInput {
            candidate_name: "Alan Turing".to_string(),
            job_title: "Cryptanalyst".to_string(),
            candidate_text: "Broke Enigma.".to_string(),
            candidate_notes: None,
            job_text: "Break codes.".to_string(),
            job_notes: None,
            retrieved_context: None,
            language: "English".to_string(),
        }
    }

    #[test]
    fn test_bounded_prefix_is_char_safe() {
        assert_eq!(bounded_prefix("héllo", 2), "hé…");
        assert_eq!(bounded_prefix("abc", 3), "abc");
        assert_eq!(bounded_prefix("", 3), "");
    }

    #[test]
    fn test_validation_fallback_zeroes_every_active_dimension() {
        let dims = default_dimensions();
        let refs: Vec<&DimensionSpec> = dims.iter().collect();
        let error = AnalysisError::Validation(ValidationFailure {
            reason: "scores is missing dimension 'communication'".to_string(),
        });
        let result = build_fallback(&error, Some("{\"overallScore\": 90}"), &input(), &refs);

        assert_eq!(result.overall_score, 0);
        assert_eq!(result.scores.len(), 10);
        assert!(result.scores.iter().all(|(_, s)| s.score == 0));
        assert!(result.detailed_explanation.contains("Critical Error"));
        assert!(result.detailed_explanation.contains("communication"));
        assert!(result.detailed_explanation.contains("overallScore"));
        assert_eq!(result.candidate_name, "Alan Turing");
        let info = result.error.unwrap();
        assert_eq!(info.stage, FailureStage::Validation);
        assert!(!info.rate_limited);
    }

    #[test]
    fn test_raw_response_is_bounded_in_explanation() {
        let dims = default_dimensions();
        let refs: Vec<&DimensionSpec> = dims.iter().collect();
        let raw = "x".repeat(5_000);
        let error = AnalysisError::Validation(ValidationFailure {
            reason: "bad".to_string(),
        });
        let result = build_fallback(&error, Some(&raw), &input(), &refs);
        assert!(result.detailed_explanation.len() < 1_000);
    }

    #[test]
    fn test_quota_fallback_uses_distinct_message() {
        let dims = default_dimensions();
        let refs: Vec<&DimensionSpec> = dims.iter().collect();
        let error = AnalysisError::Transport {
            quota: true,
            message: "429".to_string(),
        };
        let result = build_fallback(&error, None, &input(), &refs);
        assert!(result.detailed_explanation.starts_with(QUOTA_MESSAGE));
        assert!(result.error.unwrap().rate_limited);
    }

    #[test]
    fn test_config_fallback_explains_not_configured() {
        let dims = default_dimensions();
        let refs: Vec<&DimensionSpec> = dims.iter().collect();
        let error = AnalysisError::Config("LLM API key is not configured".to_string());
        let result = build_fallback(&error, None, &input(), &refs);
        assert!(result
            .scores
            .iter()
            .all(|(_, s)| s.explanation.starts_with("Not configured")));
    }

    #[test]
    fn test_inactive_dimensions_are_absent_from_fallback() {
        let mut dims = default_dimensions();
        dims[0].is_active = false;
        let refs: Vec<&DimensionSpec> = dims.iter().collect();
        let error = AnalysisError::Config("missing".to_string());
        let result = build_fallback(&error, None, &input(), &refs);
        assert_eq!(result.scores.len(), 9);
        assert!(result.scores.get(&dims[0].id).is_none());
    }
}
