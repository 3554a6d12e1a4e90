//! The analysis pipeline: cache check → model call → repair → validate → cache write.
//!
//! `Analyzer::analyze` never fails. Every `AnalysisError` becomes a flagged,
//! zero-score fallback result that is returned but never cached.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::analysis::error::AnalysisError;
use crate::analysis::fallback::{bounded_prefix, build_fallback, DIAGNOSTIC_PREFIX_CHARS};
use crate::analysis::hasher::{CacheKeyMaterial, Digester};
use crate::analysis::models::{AnalysisInput, AnalysisResult, DimensionSpec, ScoringSettings};
use crate::analysis::repair::repair_response;
use crate::analysis::schema::build_model_request;
use crate::analysis::validation::validate_document;
use crate::cache::{CacheEntry, CacheStore};
use crate::llm_client::ModelClient;

/// A finished analysis with its cache provenance.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub analysis_id: Uuid,
    pub result: AnalysisResult,
    pub cache_used: bool,
    /// When the served entry was written; only set for cache hits.
    pub cache_timestamp: Option<DateTime<Utc>>,
}

/// Owns the collaborators of one deployment. Shared across requests behind an `Arc`.
pub struct Analyzer {
    model: Arc<dyn ModelClient>,
    model_id: String,
    cache: CacheStore,
    digester: Digester,
}

impl Analyzer {
    pub fn new(
        model: Arc<dyn ModelClient>,
        model_id: impl Into<String>,
        cache: CacheStore,
        digester: Digester,
    ) -> Self {
        Self {
            model,
            model_id: model_id.into(),
            cache,
            digester,
        }
    }

    pub async fn analyze(&self, input: &AnalysisInput, settings: &ScoringSettings) -> AnalysisOutcome {
        let analysis_id = Uuid::new_v4();
        let span = info_span!("analysis", %analysis_id, model = %self.model_id);
        self.run(analysis_id, input, settings).instrument(span).await
    }

    async fn run(
        &self,
        analysis_id: Uuid,
        input: &AnalysisInput,
        settings: &ScoringSettings,
    ) -> AnalysisOutcome {
        let dimensions = settings.active_dimensions();

        if !self.model.is_configured() {
            let error = AnalysisError::Config("LLM API key is not configured".to_string());
            warn!("Analysis skipped: {error}");
            return miss(analysis_id, build_fallback(&error, None, input, &dimensions));
        }

        let snapshot = settings.snapshot();
        let key = self.cache_key(input, &snapshot.to_string());

        // ── Cache check ──────────────────────────────────────────────────────
        match self.cache.get(&key, &snapshot).await {
            Ok(Some(entry)) if entry.result.scores.covers_exactly(&dimensions) => {
                info!("Cache hit for {key} (written {})", entry.timestamp);
                return AnalysisOutcome {
                    analysis_id,
                    result: entry.result,
                    cache_used: true,
                    cache_timestamp: Some(entry.timestamp),
                };
            }
            Ok(Some(_)) => {
                info!("Evicting cache entry {key}: dimension mismatch");
                self.cache.remove(&key).await;
            }
            Ok(None) => info!("Cache miss for {key}"),
            Err(e) => error!("Cache read failed, continuing without cache: {e}"),
        }

        // ── Model call ───────────────────────────────────────────────────────
        let request = build_model_request(input, settings, &self.model_id);
        let raw = match self.model.generate(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                let error = AnalysisError::from(e);
                error!("Model request failed: {error}");
                return miss(analysis_id, build_fallback(&error, None, input, &dimensions));
            }
        };

        // ── Repair and validation ────────────────────────────────────────────
        let mut result = match parse_result(&raw, &dimensions) {
            Ok(result) => result,
            Err(error) => {
                error!(
                    "Analysis failed at the {} stage: {error}; raw response: {}",
                    error.stage().as_str(),
                    bounded_prefix(&raw, DIAGNOSTIC_PREFIX_CHARS)
                );
                return miss(
                    analysis_id,
                    build_fallback(&error, Some(&raw), input, &dimensions),
                );
            }
        };
        result.candidate_name = input.candidate_name.clone();
        result.job_title = input.job_title.clone();

        // ── Write-through ────────────────────────────────────────────────────
        let entry = CacheEntry::new(result.clone(), snapshot);
        if let Err(e) = self.cache.put(&key, &entry).await {
            error!("Cache write failed for {key}: {}", AnalysisError::from(e));
        }

        info!(
            "Analysis complete: overall_score={}, dimensions={}",
            result.overall_score,
            result.scores.len()
        );
        for (id, component) in result.scores.iter() {
            debug!("  {id}: {}", component.score);
        }
        miss(analysis_id, result)
    }

    fn cache_key(&self, input: &AnalysisInput, settings_json: &str) -> String {
        let material = CacheKeyMaterial {
            candidate_name: &input.candidate_name,
            job_title: &input.job_title,
            candidate_text: &input.candidate_text,
            candidate_notes: input.candidate_notes(),
            job_text: &input.job_text,
            job_notes: input.job_notes(),
            retrieved_context: input.retrieved_context(),
            language: &input.language,
            model_id: &self.model_id,
            settings: settings_json.to_string(),
        };
        let digest = self.digester.digest(&material.parts());
        self.cache
            .namespaced_key(&digest, self.digester.is_fallback())
    }
}

fn parse_result(raw: &str, dimensions: &[&DimensionSpec]) -> Result<AnalysisResult, AnalysisError> {
    let repaired = repair_response(raw)?;
    debug!(
        "Response repaired: passes={}, cap_reached={}",
        repaired.passes, repaired.cap_reached
    );
    validate_document(&repaired.document, dimensions).map_err(|failure| {
        warn!(
            "Validation failed: {failure}; repaired text: {}",
            bounded_prefix(&repaired.repaired_text, DIAGNOSTIC_PREFIX_CHARS)
        );
        AnalysisError::from(failure)
    })
}

fn miss(analysis_id: Uuid, result: AnalysisResult) -> AnalysisOutcome {
    AnalysisOutcome {
        analysis_id,
        result,
        cache_used: false,
        cache_timestamp: None,
    }
}
