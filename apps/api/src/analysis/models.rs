//! Data model for compatibility analysis: dimension configuration, per-dimension
//! scores, the final `AnalysisResult`, and the settings snapshot stored with cache entries.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ────────────────────────────────────────────────────────────────────────────
// Dimension configuration
// ────────────────────────────────────────────────────────────────────────────

/// A single assessment axis. Owned by configuration; the pipeline only borrows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionSpec {
    /// Stable identifier, underscore-separated (e.g. `skill_assessment`).
    pub id: String,
    pub label: String,
    /// Scoring guidance passed verbatim to the model.
    pub prompt_guidance: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl DimensionSpec {
    pub fn new(id: &str, label: &str, prompt_guidance: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            prompt_guidance: prompt_guidance.to_string(),
            is_active: true,
        }
    }
}

/// Returns the active subset in caller order.
pub fn active_dimensions(dimensions: &[DimensionSpec]) -> Vec<&DimensionSpec> {
    dimensions.iter().filter(|d| d.is_active).collect()
}

/// Maps any word-separator convention onto the internal one: lowercase, underscores.
/// `Skill-Assessment` and `skill assessment` both become `skill_assessment`.
pub fn normalize_dimension_id(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c == '-' || c.is_whitespace() {
                '_'
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect()
}

/// Normalizes and checks a caller-supplied dimension list.
///
/// Ids are normalized first, then must be non-empty, `[a-z0-9_]` only, and unique.
/// At least one dimension must be active.
pub fn prepare_dimensions(dimensions: Vec<DimensionSpec>) -> Result<Vec<DimensionSpec>, String> {
    let mut seen = HashSet::new();
    let mut prepared = Vec::with_capacity(dimensions.len());

    for mut dimension in dimensions {
        dimension.id = normalize_dimension_id(&dimension.id);
        if dimension.id.is_empty() {
            return Err("dimension id cannot be empty".to_string());
        }
        if !dimension
            .id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(format!(
                "dimension id '{}' may only contain lowercase letters, digits and underscores",
                dimension.id
            ));
        }
        if !seen.insert(dimension.id.clone()) {
            return Err(format!("duplicate dimension id '{}'", dimension.id));
        }
        prepared.push(dimension);
    }

    if !prepared.iter().any(|d| d.is_active) {
        return Err("at least one dimension must be active".to_string());
    }

    Ok(prepared)
}

/// The ten dimensions used when a caller does not configure its own.
pub fn default_dimensions() -> Vec<DimensionSpec> {
    vec![
        DimensionSpec::new(
            "skill_assessment",
            "Skill Assessment",
            "Compare the candidate's demonstrated skills with the skills the job requires. Reward direct evidence over self-description.",
        ),
        DimensionSpec::new(
            "experience_relevance",
            "Experience Relevance",
            "Judge how closely past roles, responsibilities and seniority match the position.",
        ),
        DimensionSpec::new(
            "education_fit",
            "Education Fit",
            "Assess degrees, certifications and training against the stated or implied educational requirements.",
        ),
        DimensionSpec::new(
            "technical_proficiency",
            "Technical Proficiency",
            "Rate depth with the specific tools, technologies and methods named in the job description.",
        ),
        DimensionSpec::new(
            "soft_skills",
            "Soft Skills",
            "Look for evidence of collaboration, adaptability, problem solving and ownership.",
        ),
        DimensionSpec::new(
            "cultural_fit",
            "Cultural Fit",
            "Estimate alignment with the working style, values and environment described by the employer.",
        ),
        DimensionSpec::new(
            "career_trajectory",
            "Career Trajectory",
            "Evaluate progression, tenure and whether this role is a coherent next step.",
        ),
        DimensionSpec::new(
            "industry_knowledge",
            "Industry Knowledge",
            "Assess familiarity with the employer's industry, domain vocabulary and regulations.",
        ),
        DimensionSpec::new(
            "leadership_potential",
            "Leadership Potential",
            "Look for mentoring, initiative, decision making and people or project leadership.",
        ),
        DimensionSpec::new(
            "communication",
            "Communication",
            "Judge clarity of written material and evidence of presenting, documenting or negotiating.",
        ),
    ]
}

// ────────────────────────────────────────────────────────────────────────────
// Analysis input
// ────────────────────────────────────────────────────────────────────────────

pub const DEFAULT_LANGUAGE: &str = "English";

/// The documents and identity of one candidate/job comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisInput {
    pub candidate_name: String,
    pub job_title: String,
    pub candidate_text: String,
    pub candidate_notes: Option<String>,
    pub job_text: String,
    pub job_notes: Option<String>,
    /// Optional reference material retrieved by the caller.
    pub retrieved_context: Option<String>,
    pub language: String,
}

impl AnalysisInput {
    // Blank optional text is treated as absent everywhere: same request, same cache key.

    pub fn candidate_notes(&self) -> Option<&str> {
        provided(&self.candidate_notes)
    }

    pub fn job_notes(&self) -> Option<&str> {
        provided(&self.job_notes)
    }

    pub fn retrieved_context(&self) -> Option<&str> {
        provided(&self.retrieved_context)
    }
}

fn provided(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

// ────────────────────────────────────────────────────────────────────────────
// Scores and results
// ────────────────────────────────────────────────────────────────────────────

/// Score for one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    /// 0 – 100
    pub score: u8,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Dimension id → score, holding exactly the active dimension ids of the run that
/// produced it. Only the validator and the fallback builder construct one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionScores(BTreeMap<String, ScoreComponent>);

impl DimensionScores {
    pub(crate) fn from_map(scores: BTreeMap<String, ScoreComponent>) -> Self {
        Self(scores)
    }

    pub fn get(&self, id: &str) -> Option<&ScoreComponent> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ScoreComponent)> {
        self.0.iter()
    }

    /// True when the key set equals the active dimension ids exactly.
    pub fn covers_exactly(&self, dimensions: &[&DimensionSpec]) -> bool {
        let expected: BTreeSet<&str> = dimensions.iter().map(|d| d.id.as_str()).collect();
        expected.len() == self.len() && expected.iter().all(|id| self.get(id).is_some())
    }
}

/// Where in the pipeline a fallback result originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Configuration,
    Request,
    Repair,
    Validation,
    Cache,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Configuration => "configuration",
            FailureStage::Request => "request",
            FailureStage::Repair => "repair",
            FailureStage::Validation => "validation",
            FailureStage::Cache => "cache",
        }
    }
}

/// Marks a result as a fallback. Absent on genuine results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackInfo {
    pub stage: FailureStage,
    pub message: String,
    pub rate_limited: bool,
}

/// The structured compatibility assessment returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub candidate_name: String,
    pub job_title: String,
    pub scores: DimensionScores,
    /// 0 – 100
    pub overall_score: u8,
    pub detailed_explanation: String,
    #[serde(default)]
    pub positive_points: Vec<String>,
    #[serde(default)]
    pub pain_points: Vec<String>,
    #[serde(default)]
    pub discussion_points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FallbackInfo>,
}

impl AnalysisResult {
    pub fn is_fallback(&self) -> bool {
        self.error.is_some()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scoring settings and their cache snapshot
// ────────────────────────────────────────────────────────────────────────────

/// Bumped whenever the snapshot layout changes; older cache entries are then ignored.
pub const SETTINGS_SCHEMA_VERSION: u64 = 2;

/// Fields every stored snapshot must carry to be served from cache.
pub const REQUIRED_SNAPSHOT_FIELDS: &[&str] = &[
    "schema_version",
    "dimensions",
    "temperature",
    "max_output_tokens",
];

/// Everything besides the documents themselves that changes the model's answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringSettings {
    pub dimensions: Vec<DimensionSpec>,
    pub temperature: f64,
    pub max_output_tokens: u32,
}

impl ScoringSettings {
    pub fn active_dimensions(&self) -> Vec<&DimensionSpec> {
        active_dimensions(&self.dimensions)
    }

    /// Canonical snapshot of the settings. Dimension order is preserved, so
    /// reordering dimensions counts as a change.
    pub fn snapshot(&self) -> Value {
        let dimensions: Vec<Value> = self
            .active_dimensions()
            .into_iter()
            .map(|d| {
                json!({
                    "id": d.id,
                    "label": d.label,
                    "prompt_guidance": d.prompt_guidance,
                })
            })
            .collect();

        json!({
            "schema_version": SETTINGS_SCHEMA_VERSION,
            "dimensions": dimensions,
            "temperature": self.temperature,
            "max_output_tokens": self.max_output_tokens,
        })
    }
}

/// Whether a stored snapshot has the shape the current code writes.
pub fn snapshot_is_compatible(stored: &Value) -> bool {
    let Some(object) = stored.as_object() else {
        return false;
    };
    if !REQUIRED_SNAPSHOT_FIELDS
        .iter()
        .all(|field| object.contains_key(*field))
    {
        return false;
    }
    object.get("schema_version").and_then(Value::as_u64) == Some(SETTINGS_SCHEMA_VERSION)
        && object.get("dimensions").is_some_and(Value::is_array)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ScoringSettings {
        ScoringSettings {
            dimensions: default_dimensions(),
            temperature: 0.2,
            max_output_tokens: 4096,
        }
    }

    #[test]
    fn test_default_dimensions_has_ten_active_unique_ids() {
        let dims = default_dimensions();
        assert_eq!(dims.len(), 10);
        assert!(dims.iter().all(|d| d.is_active));
        let ids: HashSet<_> = dims.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids.len(), 10);
    }

    #[test]
    fn test_normalize_dimension_id_maps_separators() {
        assert_eq!(normalize_dimension_id("skill-assessment"), "skill_assessment");
        assert_eq!(normalize_dimension_id(" Cultural Fit "), "cultural_fit");
        assert_eq!(normalize_dimension_id("soft_skills"), "soft_skills");
    }

    #[test]
    fn test_prepare_dimensions_rejects_duplicates_after_normalization() {
        let dims = vec![
            DimensionSpec::new("soft-skills", "Soft", "g"),
            DimensionSpec::new("soft_skills", "Soft again", "g"),
        ];
        let err = prepare_dimensions(dims).unwrap_err();
        assert!(err.contains("duplicate"));
    }

    #[test]
    fn test_prepare_dimensions_requires_an_active_dimension() {
        let mut dim = DimensionSpec::new("a", "A", "g");
        dim.is_active = false;
        assert!(prepare_dimensions(vec![dim]).is_err());
    }

    #[test]
    fn test_prepare_dimensions_rejects_invalid_characters() {
        let dims = vec![DimensionSpec::new("skills/tools", "Skills", "g")];
        assert!(prepare_dimensions(dims).is_err());
    }

    #[test]
    fn test_dimension_spec_is_active_defaults_to_true() {
        let json = r#"{"id": "x", "label": "X", "prompt_guidance": "g"}"#;
        let dim: DimensionSpec = serde_json::from_str(json).unwrap();
        assert!(dim.is_active);
    }

    #[test]
    fn test_snapshot_excludes_inactive_dimensions() {
        let mut s = settings();
        s.dimensions[0].is_active = false;
        let snapshot = s.snapshot();
        assert_eq!(snapshot["dimensions"].as_array().unwrap().len(), 9);
    }

    #[test]
    fn test_snapshot_is_order_sensitive() {
        let a = settings();
        let mut b = settings();
        b.dimensions.swap(0, 1);
        assert_ne!(a.snapshot().to_string(), b.snapshot().to_string());
    }

    #[test]
    fn test_current_snapshot_is_compatible() {
        assert!(snapshot_is_compatible(&settings().snapshot()));
    }

    #[test]
    fn test_snapshot_missing_required_field_is_incompatible() {
        let mut snapshot = settings().snapshot();
        snapshot.as_object_mut().unwrap().remove("max_output_tokens");
        assert!(!snapshot_is_compatible(&snapshot));
    }

    #[test]
    fn test_snapshot_with_old_schema_version_is_incompatible() {
        let mut snapshot = settings().snapshot();
        snapshot["schema_version"] = json!(1);
        assert!(!snapshot_is_compatible(&snapshot));
    }

    #[test]
    fn test_fallback_info_omitted_from_genuine_result() {
        let result = AnalysisResult {
            candidate_name: "Ada".to_string(),
            job_title: "Engineer".to_string(),
            scores: DimensionScores::from_map(BTreeMap::new()),
            overall_score: 50,
            detailed_explanation: "ok".to_string(),
            positive_points: vec![],
            pain_points: vec![],
            discussion_points: vec![],
            error: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("error").is_none());
        assert_eq!(value["overallScore"], 50);
        assert!(!result.is_fallback());
    }

    #[test]
    fn test_covers_exactly_requires_the_same_id_set() {
        let dims = default_dimensions();
        let refs: Vec<&DimensionSpec> = dims.iter().collect();
        let component = || ScoreComponent {
            score: 50,
            explanation: "ok".to_string(),
            details: None,
        };

        let full: BTreeMap<_, _> = dims.iter().map(|d| (d.id.clone(), component())).collect();
        assert!(DimensionScores::from_map(full.clone()).covers_exactly(&refs));

        let mut missing = full.clone();
        missing.remove("communication");
        assert!(!DimensionScores::from_map(missing).covers_exactly(&refs));

        let mut extra = full;
        extra.insert("astrology".to_string(), component());
        assert!(!DimensionScores::from_map(extra).covers_exactly(&refs));
    }
}
