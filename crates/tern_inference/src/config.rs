//! Analysis configuration: parallelism, inference limits and the specificity
//! policy used to rank applicable overload candidates.
//!
//! Every section deserializes with defaults so partial TOML files work.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Controls how bodies are spread over worker threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelInferenceConfig {
    /// Enables body-level parallel execution when `true`.
    pub module_parallelism: bool,
    /// Number of bodies handed to a worker at once.
    pub constraint_batching: usize,
    /// Maximum worker threads available for parallel processing.
    pub worker_threads: usize,
}

impl ParallelInferenceConfig {
    pub fn new(module_parallelism: bool, constraint_batching: usize, worker_threads: usize) -> Self {
        Self {
            module_parallelism,
            constraint_batching,
            worker_threads,
        }
        .sanitized()
    }

    /// Single-threaded execution, used by tests and regression runs.
    pub fn deterministic() -> Self {
        Self {
            module_parallelism: false,
            constraint_batching: 1,
            worker_threads: 1,
        }
    }

    /// Clamps zero counts to one and never advertises workers when
    /// parallelism is disabled.
    pub fn sanitized(mut self) -> Self {
        if self.constraint_batching == 0 {
            self.constraint_batching = 1;
        }
        if self.worker_threads == 0 {
            self.worker_threads = 1;
        }
        if !self.module_parallelism {
            self.worker_threads = 1;
        }
        self
    }

    pub fn effective_workers(&self) -> usize {
        self.sanitized().worker_threads
    }
}

impl Default for ParallelInferenceConfig {
    fn default() -> Self {
        Self::deterministic()
    }
}

/// Hard bounds that keep pathological inputs from running away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceLimits {
    /// Candidates considered for a single call across all scope levels.
    pub max_candidates: usize,
    /// Type variables in one constraint system, nested calls included.
    pub max_type_variables: usize,
    /// Bounds recorded in one constraint system.
    pub max_constraints: usize,
    /// Iterations of the postponed-argument completion loop.
    pub max_completion_iterations: usize,
    /// Depth of nested lambda analysis.
    pub max_lambda_depth: usize,
}

impl Default for InferenceLimits {
    fn default() -> Self {
        Self {
            max_candidates: 256,
            max_type_variables: 512,
            max_constraints: 8_192,
            max_completion_iterations: 1_024,
            max_lambda_depth: 32,
        }
    }
}

/// One discriminating rule of the specificity order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecificityRule {
    NonExtensionOverExtension,
    FewerCoercions,
    FewerDefaultsAndVarargs,
    ParameterSubtyping,
    NonGenericOverGeneric,
}

/// Ordered rules; the first rule that separates two candidates decides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecificityPolicy {
    pub rules: Vec<SpecificityRule>,
}

impl Default for SpecificityPolicy {
    fn default() -> Self {
        Self {
            rules: vec![
                SpecificityRule::NonExtensionOverExtension,
                SpecificityRule::FewerCoercions,
                SpecificityRule::FewerDefaultsAndVarargs,
                SpecificityRule::ParameterSubtyping,
                SpecificityRule::NonGenericOverGeneric,
            ],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub parallel: ParallelInferenceConfig,
    pub limits: InferenceLimits,
    pub specificity: SpecificityPolicy,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("limit `{0}` must be greater than zero")]
    ZeroLimit(&'static str),
    #[error("specificity rule `{0:?}` is listed more than once")]
    DuplicateRule(SpecificityRule),
}

impl AnalysisConfig {
    /// Sanitizes the parallel section and rejects unusable limits.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        self.parallel = self.parallel.sanitized();
        let limits = &self.limits;
        for (name, value) in [
            ("max_candidates", limits.max_candidates),
            ("max_type_variables", limits.max_type_variables),
            ("max_constraints", limits.max_constraints),
            ("max_completion_iterations", limits.max_completion_iterations),
            ("max_lambda_depth", limits.max_lambda_depth),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroLimit(name));
            }
        }
        let mut seen = Vec::new();
        for rule in &self.specificity.rules {
            if seen.contains(rule) {
                return Err(ConfigError::DuplicateRule(*rule));
            }
            seen.push(*rule);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_defaults() {
        let config = ParallelInferenceConfig::default();
        assert!(!config.module_parallelism);
        assert_eq!(config.constraint_batching, 1);
        assert_eq!(config.worker_threads, 1);
    }

    #[test]
    fn disables_workers_when_parallelism_off() {
        let config = ParallelInferenceConfig::new(false, 4, 8);
        assert_eq!(config.effective_workers(), 1);
        let config = ParallelInferenceConfig::new(true, 0, 0);
        assert_eq!(config.constraint_batching, 1);
        assert_eq!(config.worker_threads, 1);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: AnalysisConfig = toml::from_str(
            r#"
            [parallel]
            module_parallelism = true
            worker_threads = 4

            [limits]
            max_candidates = 16
            "#,
        )
        .expect("valid toml");
        let config = config.validate().expect("valid config");
        assert_eq!(config.parallel.effective_workers(), 4);
        assert_eq!(config.limits.max_candidates, 16);
        assert_eq!(config.limits.max_lambda_depth, InferenceLimits::default().max_lambda_depth);
        assert_eq!(config.specificity, SpecificityPolicy::default());
    }

    #[test]
    fn rejects_duplicate_rules_and_zero_limits() {
        let mut config = AnalysisConfig::default();
        config.specificity.rules.push(SpecificityRule::FewerCoercions);
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateRule(SpecificityRule::FewerCoercions))
        );

        let mut config = AnalysisConfig::default();
        config.limits.max_constraints = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroLimit("max_constraints")));
    }
}
