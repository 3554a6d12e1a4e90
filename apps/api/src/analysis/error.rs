use thiserror::Error;

use crate::analysis::models::FailureStage;
use crate::analysis::repair::RepairFailure;
use crate::analysis::validation::ValidationFailure;
use crate::cache::CacheError;
use crate::llm_client::LlmError;

/// Every way an analysis can fail. The orchestrator turns each variant into a
/// fallback result; none of them reach the caller as an error.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {message}")]
    Transport { quota: bool, message: String },

    #[error("Repair failure: {0}")]
    Repair(#[from] RepairFailure),

    #[error("Validation failure: {0}")]
    Validation(#[from] ValidationFailure),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl AnalysisError {
    pub fn stage(&self) -> FailureStage {
        match self {
            AnalysisError::Config(_) => FailureStage::Configuration,
            AnalysisError::Transport { .. } => FailureStage::Request,
            AnalysisError::Repair(_) => FailureStage::Repair,
            AnalysisError::Validation(_) => FailureStage::Validation,
            AnalysisError::Cache(_) => FailureStage::Cache,
        }
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, AnalysisError::Transport { quota: true, .. })
    }
}

impl From<LlmError> for AnalysisError {
    fn from(error: LlmError) -> Self {
        match error {
            LlmError::MissingApiKey => AnalysisError::Config(error.to_string()),
            other => AnalysisError::Transport {
                quota: other.is_quota(),
                message: other.to_string(),
            },
        }
    }
}
