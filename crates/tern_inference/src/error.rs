//! Fatal inference conditions. User-facing problems are diagnostics instead.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InferenceError {
    #[error("analysis was cancelled")]
    Cancelled,
    #[error("inference limit `{limit}` exceeded ({value} > {max})")]
    LimitExceeded {
        limit: &'static str,
        value: usize,
        max: usize,
    },
}

impl InferenceError {
    pub fn limit(limit: &'static str, value: usize, max: usize) -> Self {
        InferenceError::LimitExceeded { limit, value, max }
    }
}
