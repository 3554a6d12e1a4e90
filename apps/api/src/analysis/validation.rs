//! Structural validation of a repaired document against the active dimensions.
//!
//! Checks run in order and stop at the first failure:
//! 1. `overallScore` is present and numeric
//! 2. `scores` is an object
//! 3. every active dimension has a numeric `score` and a non-empty `explanation`
//! 4. `detailedExplanation` is a string
//! 5. list fields, when present, are arrays (non-string items are dropped)
//!
//! A document missing even one active dimension is rejected whole.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::analysis::models::{AnalysisResult, DimensionScores, DimensionSpec, ScoreComponent};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{reason}")]
pub struct ValidationFailure {
    pub reason: String,
}

impl ValidationFailure {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Builds an `AnalysisResult` from a parsed document, keeping only the active
/// dimensions' scores. Keys the model invented are dropped.
pub fn validate_document(
    document: &Map<String, Value>,
    dimensions: &[&DimensionSpec],
) -> Result<AnalysisResult, ValidationFailure> {
    let overall_score = document
        .get("overallScore")
        .and_then(Value::as_f64)
        .map(clamp_score)
        .ok_or_else(|| ValidationFailure::new("overallScore is missing or not a number"))?;

    let scores_object = document
        .get("scores")
        .and_then(Value::as_object)
        .ok_or_else(|| ValidationFailure::new("scores is missing or not an object"))?;

    let mut scores = BTreeMap::new();
    for dimension in dimensions.iter().filter(|d| d.is_active) {
        let component = validate_component(scores_object, &dimension.id)?;
        scores.insert(dimension.id.clone(), component);
    }

    let detailed_explanation = document
        .get("detailedExplanation")
        .and_then(Value::as_str)
        .ok_or_else(|| ValidationFailure::new("detailedExplanation is missing or not a string"))?
        .to_string();

    let positive_points = string_list(document, "positivePoints")?;
    let pain_points = string_list(document, "painPoints")?;
    let discussion_points = string_list(document, "discussionPoints")?;

    Ok(AnalysisResult {
        candidate_name: optional_string(document, "candidateName"),
        job_title: optional_string(document, "jobTitle"),
        scores: DimensionScores::from_map(scores),
        overall_score,
        detailed_explanation,
        positive_points,
        pain_points,
        discussion_points,
        error: None,
    })
}

fn validate_component(
    scores: &Map<String, Value>,
    id: &str,
) -> Result<ScoreComponent, ValidationFailure> {
    let entry = scores
        .get(id)
        .and_then(Value::as_object)
        .ok_or_else(|| ValidationFailure::new(format!("scores is missing dimension '{id}'")))?;

    let score = entry
        .get("score")
        .and_then(Value::as_f64)
        .map(clamp_score)
        .ok_or_else(|| {
            ValidationFailure::new(format!("scores.{id}.score is missing or not a number"))
        })?;

    let explanation = entry
        .get("explanation")
        .and_then(Value::as_str)
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| {
            ValidationFailure::new(format!(
                "scores.{id}.explanation is missing, empty or not a string"
            ))
        })?
        .to_string();

    let details = entry.get("details").filter(|d| !d.is_null()).cloned();

    Ok(ScoreComponent {
        score,
        explanation,
        details,
    })
}

/// Rounds to the nearest integer and clamps to 0 – 100.
fn clamp_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

/// Absent or null → empty list; array → its string items; anything else fails.
fn string_list(document: &Map<String, Value>, field: &str) -> Result<Vec<String>, ValidationFailure> {
    match document.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()),
        Some(_) => Err(ValidationFailure::new(format!("{field} is not a list"))),
    }
}

fn optional_string(document: &Map<String, Value>, field: &str) -> String {
    document
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::models::default_dimensions;
    use serde_json::json;

    fn full_document(overall: i64) -> Map<String, Value> {
        let scores: Map<String, Value> = default_dimensions()
            .iter()
            .enumerate()
            .map(|(i, d)| {
                (
                    d.id.clone(),
                    json!({"score": 50 + i as i64, "explanation": format!("Evidence for {}", d.label)}),
                )
            })
            .collect();

        let value = json!({
            "candidateName": "Ada Lovelace",
            "jobTitle": "Analytical Engineer",
            "scores": scores,
            "overallScore": overall,
            "detailedExplanation": "Strong mathematical background.",
            "positivePoints": ["Pioneering work"],
            "painPoints": ["No recent industry role"],
            "discussionPoints": ["Availability?"]
        });
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn dims() -> Vec<DimensionSpec> {
        default_dimensions()
    }

    fn refs(dims: &[DimensionSpec]) -> Vec<&DimensionSpec> {
        dims.iter().collect()
    }

    #[test]
    fn test_valid_document_with_all_default_dimensions() {
        let dims = dims();
        let result = validate_document(&full_document(88), &refs(&dims)).unwrap();
        assert_eq!(result.overall_score, 88);
        assert_eq!(result.scores.len(), 10);
        assert_eq!(result.scores.get("skill_assessment").unwrap().score, 50);
        assert_eq!(result.positive_points, vec!["Pioneering work".to_string()]);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_missing_one_dimension_fails() {
        let dims = dims();
        let mut doc = full_document(88);
        doc["scores"].as_object_mut().unwrap().remove("communication");
        let failure = validate_document(&doc, &refs(&dims)).unwrap_err();
        assert!(failure.reason.contains("communication"));
    }

    #[test]
    fn test_missing_overall_score_fails_first() {
        let dims = dims();
        let mut doc = full_document(88);
        doc.remove("overallScore");
        doc.remove("scores");
        let failure = validate_document(&doc, &refs(&dims)).unwrap_err();
        assert!(failure.reason.contains("overallScore"));
    }

    #[test]
    fn test_string_overall_score_fails() {
        let dims = dims();
        let mut doc = full_document(88);
        doc.insert("overallScore".to_string(), json!("88"));
        assert!(validate_document(&doc, &refs(&dims)).is_err());
    }

    #[test]
    fn test_non_string_detailed_explanation_fails() {
        let dims = dims();
        let mut doc = full_document(88);
        doc.insert("detailedExplanation".to_string(), json!(["a"]));
        let failure = validate_document(&doc, &refs(&dims)).unwrap_err();
        assert!(failure.reason.contains("detailedExplanation"));
    }

    #[test]
    fn test_empty_explanation_fails() {
        let dims = dims();
        let mut doc = full_document(88);
        doc["scores"]["soft_skills"]["explanation"] = json!("  ");
        assert!(validate_document(&doc, &refs(&dims)).is_err());
    }

    #[test]
    fn test_extraneous_dimensions_are_dropped() {
        let dims = dims();
        let mut doc = full_document(70);
        doc["scores"]
            .as_object_mut()
            .unwrap()
            .insert("astrology".to_string(), json!({"score": 99, "explanation": "Leo"}));
        let result = validate_document(&doc, &refs(&dims)).unwrap();
        assert!(result.scores.get("astrology").is_none());
        assert_eq!(result.scores.len(), 10);
    }

    #[test]
    fn test_only_active_dimensions_are_required() {
        let mut dims = dims();
        dims[9].is_active = false;
        let mut doc = full_document(70);
        doc["scores"].as_object_mut().unwrap().remove(&dims[9].id);
        let result = validate_document(&doc, &refs(&dims)).unwrap();
        assert_eq!(result.scores.len(), 9);
    }

    #[test]
    fn test_non_string_list_items_are_filtered() {
        let dims = dims();
        let mut doc = full_document(70);
        doc.insert("painPoints".to_string(), json!(["gap", 3, null, {"x": 1}, "other"]));
        let result = validate_document(&doc, &refs(&dims)).unwrap();
        assert_eq!(result.pain_points, vec!["gap".to_string(), "other".to_string()]);
    }

    #[test]
    fn test_non_list_points_fail() {
        let dims = dims();
        let mut doc = full_document(70);
        doc.insert("positivePoints".to_string(), json!("great"));
        assert!(validate_document(&doc, &refs(&dims)).is_err());
    }

    #[test]
    fn test_absent_lists_become_empty() {
        let dims = dims();
        let mut doc = full_document(70);
        doc.remove("discussionPoints");
        let result = validate_document(&doc, &refs(&dims)).unwrap();
        assert!(result.discussion_points.is_empty());
    }

    #[test]
    fn test_scores_are_rounded_and_clamped() {
        let dims = dims();
        let mut doc = full_document(70);
        doc.insert("overallScore".to_string(), json!(140.2));
        doc["scores"]["soft_skills"]["score"] = json!(72.6);
        doc["scores"]["cultural_fit"]["score"] = json!(-5);
        let result = validate_document(&doc, &refs(&dims)).unwrap();
        assert_eq!(result.overall_score, 100);
        assert_eq!(result.scores.get("soft_skills").unwrap().score, 73);
        assert_eq!(result.scores.get("cultural_fit").unwrap().score, 0);
    }

    #[test]
    fn test_details_are_kept_when_present() {
        let dims = dims();
        let mut doc = full_document(70);
        doc["scores"]["technical_proficiency"]["details"] = json!({"matched": ["Rust"]});
        let result = validate_document(&doc, &refs(&dims)).unwrap();
        assert_eq!(
            result.scores.get("technical_proficiency").unwrap().details,
            Some(json!({"matched": ["Rust"]}))
        );
    }

    #[test]
    fn test_serialize_then_revalidate_is_identical() {
        let dims = dims();
        let mut doc = full_document(64);
        doc["scores"]["education_fit"]["details"] = json!({"degree": "BSc"});
        let first = validate_document(&doc, &refs(&dims)).unwrap();

        let reserialized = match serde_json::to_value(&first).unwrap() {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        let second = validate_document(&reserialized, &refs(&dims)).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}
