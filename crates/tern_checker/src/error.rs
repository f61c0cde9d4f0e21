use tern_inference::{ConfigError, InferenceError};
use thiserror::Error;

/// Conditions that stop a whole analysis. Problems in the analyzed program
/// are diagnostics, never errors.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("invalid analysis configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("worker thread panicked while analyzing `{body}`")]
    WorkerPanicked { body: String },
}

impl AnalysisError {
    /// Whether the failure came from the configuration rather than the input.
    pub fn is_config(&self) -> bool {
        matches!(self, AnalysisError::Config(_))
    }
}
