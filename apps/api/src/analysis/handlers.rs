use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::analysis::models::{
    default_dimensions, prepare_dimensions, AnalysisInput, AnalysisResult, DimensionSpec,
    ScoringSettings, DEFAULT_LANGUAGE,
};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub candidate_text: String,
    #[serde(default)]
    pub candidate_notes: Option<String>,
    pub job_text: String,
    #[serde(default)]
    pub job_notes: Option<String>,
    #[serde(default)]
    pub candidate_name: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub language: Option<String>,
    /// Falls back to the default catalogue when omitted.
    #[serde(default)]
    pub dimensions: Option<Vec<DimensionSpec>>,
    #[serde(default)]
    pub retrieved_context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub analysis_id: Uuid,
    pub result: AnalysisResult,
    pub cache_used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_timestamp: Option<DateTime<Utc>>,
}

/// POST /api/v1/analyses
///
/// Only malformed requests are errors. Analysis failures are returned as
/// flagged fallback results with a 200.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    if req.candidate_text.trim().is_empty() {
        return Err(AppError::Validation("candidate_text is required".to_string()));
    }
    if req.job_text.trim().is_empty() {
        return Err(AppError::Validation("job_text is required".to_string()));
    }

    let dimensions = prepare_dimensions(req.dimensions.unwrap_or_else(default_dimensions))
        .map_err(AppError::Validation)?;

    let settings = ScoringSettings {
        dimensions,
        temperature: state.config.llm_temperature,
        max_output_tokens: state.config.llm_max_tokens,
    };

    let input = AnalysisInput {
        candidate_name: req.candidate_name,
        job_title: req.job_title,
        candidate_text: req.candidate_text,
        candidate_notes: req.candidate_notes,
        job_text: req.job_text,
        job_notes: req.job_notes,
        retrieved_context: req.retrieved_context,
        language: req
            .language
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
    };

    let outcome = state.analyzer.analyze(&input, &settings).await;
    info!(
        "Analysis {} finished: cache_used={}, fallback={}",
        outcome.analysis_id,
        outcome.cache_used,
        outcome.result.is_fallback()
    );

    Ok(Json(AnalyzeResponse {
        analysis_id: outcome.analysis_id,
        result: outcome.result,
        cache_used: outcome.cache_used,
        cache_timestamp: outcome.cache_timestamp,
    }))
}

/// GET /api/v1/dimensions/defaults
pub async fn handle_default_dimensions() -> Json<Vec<DimensionSpec>> {
    Json(default_dimensions())
}
