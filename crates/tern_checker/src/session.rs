//! Analysis driver.
//!
//! An [`AnalysisSession`] owns the configuration and the cancellation token
//! of a run. Each call to [`AnalysisSession::analyze`] collects symbols once,
//! then types every body, sequentially or on scoped worker threads.

use crate::error::AnalysisError;
use crate::symbols::{BodyRef, SymbolTable};
use crate::typing::{BodyAnalysis, TypingContext};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use tern_ast::SourceFile;
use tern_inference::{
    diagnostics, AnalysisConfig, CacheMetrics, CancellationToken, Diagnostic, InferenceError, Severity,
    SignatureCache, TypeRegistry,
};
use tracing::{debug, info, warn};

/// Everything one analysis run produced.
#[derive(Debug, Serialize)]
pub struct AnalysisResult {
    /// Analyzed bodies in declaration order.
    pub bodies: Vec<BodyAnalysis>,
    /// Symbol and body diagnostics, sorted by position.
    pub diagnostics: Vec<Diagnostic>,
    /// Set when the run stopped early; `bodies` holds the finished ones.
    pub cancelled: bool,
    pub cache: CacheMetrics,
    #[serde(skip)]
    pub registry: TypeRegistry,
}

impl AnalysisResult {
    pub fn body(&self, name: &str) -> Option<&BodyAnalysis> {
        self.bodies.iter().find(|body| body.name == name)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diagnostic| diagnostic.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.severity == Severity::Error)
            .count()
    }
}

#[derive(Debug)]
pub struct AnalysisSession {
    config: AnalysisConfig,
    cancel: CancellationToken,
}

impl AnalysisSession {
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        Ok(Self {
            config: config.validate()?,
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Token shared with the workers; cancelling it stops the run between
    /// declarations.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn analyze(&self, files: &[SourceFile]) -> Result<AnalysisResult, AnalysisError> {
        let table = SymbolTable::collect(files);
        // Declaration ids belong to one symbol table.
        let cache = SignatureCache::new();
        let bodies = table.bodies();

        let parallel = self.config.parallel.sanitized();
        let workers = parallel.effective_workers().min(bodies.len());
        info!(
            files = files.len(),
            declarations = table.declaration_count(),
            bodies = bodies.len(),
            workers = if parallel.module_parallelism { workers } else { 1 },
            "analysis started"
        );

        let outcome = if parallel.module_parallelism && workers > 1 {
            self.analyze_parallel(&table, &cache, workers, parallel.constraint_batching.max(1))?
        } else {
            self.analyze_sequential(&table, &cache)?
        };

        let mut all_diagnostics = table.diagnostics().to_vec();
        all_diagnostics.extend(
            outcome
                .bodies
                .iter()
                .flat_map(|body| body.diagnostics.iter().cloned()),
        );
        diagnostics::normalize(&mut all_diagnostics);

        let metrics = cache.metrics();
        info!(
            bodies = outcome.bodies.len(),
            diagnostics = all_diagnostics.len(),
            cancelled = outcome.cancelled,
            cache_hits = metrics.hits,
            "analysis finished"
        );

        Ok(AnalysisResult {
            bodies: outcome.bodies,
            diagnostics: all_diagnostics,
            cancelled: outcome.cancelled,
            cache: metrics,
            registry: table.into_registry(),
        })
    }

    fn analyze_sequential(&self, table: &SymbolTable<'_>, cache: &SignatureCache) -> Result<Outcome, AnalysisError> {
        let ctx = TypingContext::new(table, &self.config, cache, &self.cancel);
        let mut outcome = Outcome::default();
        for body in table.bodies() {
            match self.analyze_body(&ctx, body)? {
                Some(analysis) => outcome.bodies.push(analysis),
                None => {
                    outcome.cancelled = true;
                    break;
                }
            }
        }
        Ok(outcome)
    }

    /// Workers claim batches of bodies from a shared cursor. Results are put
    /// back into declaration order afterwards.
    fn analyze_parallel(
        &self,
        table: &SymbolTable<'_>,
        cache: &SignatureCache,
        workers: usize,
        batch: usize,
    ) -> Result<Outcome, AnalysisError> {
        let bodies = table.bodies();
        let cursor = AtomicUsize::new(0);
        let finished: Mutex<Vec<(usize, BodyAnalysis)>> = Mutex::new(Vec::with_capacity(bodies.len()));
        let failure: Mutex<Option<AnalysisError>> = Mutex::new(None);
        let abort = AtomicBool::new(false);

        thread::scope(|scope| {
            for worker in 0..workers {
                let cursor = &cursor;
                let finished = &finished;
                let failure = &failure;
                let abort = &abort;
                scope.spawn(move || {
                    let ctx = TypingContext::new(table, &self.config, cache, &self.cancel);
                    loop {
                        let start = cursor.fetch_add(batch, Ordering::Relaxed);
                        if start >= bodies.len() {
                            break;
                        }
                        let end = (start + batch).min(bodies.len());
                        debug!(worker, start, end, "worker claimed bodies");
                        for (index, body) in bodies[start..end].iter().enumerate() {
                            if abort.load(Ordering::Relaxed) {
                                return;
                            }
                            match self.analyze_body(&ctx, body) {
                                Ok(Some(analysis)) => lock(finished).push((start + index, analysis)),
                                Ok(None) => return,
                                Err(error) => {
                                    lock(failure).get_or_insert(error);
                                    abort.store(true, Ordering::Relaxed);
                                    return;
                                }
                            }
                        }
                    }
                });
            }
        });

        if let Some(error) = into_inner(failure) {
            return Err(error);
        }
        let mut finished = into_inner(finished);
        finished.sort_by_key(|(index, _)| *index);
        let cancelled = finished.len() < bodies.len();
        Ok(Outcome {
            bodies: finished.into_iter().map(|(_, analysis)| analysis).collect(),
            cancelled,
        })
    }

    /// `Ok(None)` means the run was cancelled before or while typing `body`.
    fn analyze_body<'a>(
        &self,
        ctx: &TypingContext<'_, 'a>,
        body: &BodyRef<'a>,
    ) -> Result<Option<BodyAnalysis>, AnalysisError> {
        if self.cancel.is_cancelled() {
            warn!(body = %body.name, "analysis cancelled");
            return Ok(None);
        }
        match panic::catch_unwind(AssertUnwindSafe(|| ctx.analyze(body))) {
            Ok(Ok(analysis)) => Ok(Some(analysis)),
            Ok(Err(InferenceError::Cancelled)) => {
                warn!(body = %body.name, "analysis cancelled while typing body");
                Ok(None)
            }
            Ok(Err(error)) => Err(AnalysisError::Inference(error)),
            Err(_) => Err(AnalysisError::WorkerPanicked { body: body.name.clone() }),
        }
    }
}

#[derive(Default)]
struct Outcome {
    bodies: Vec<BodyAnalysis>,
    cancelled: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn into_inner<T>(mutex: Mutex<T>) -> T {
    mutex.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_inference::{ConfigError, ParallelInferenceConfig};

    #[test]
    fn empty_input_produces_empty_result() {
        let session = AnalysisSession::new(AnalysisConfig::default()).unwrap();
        let result = session.analyze(&[]).unwrap();
        assert!(result.bodies.is_empty());
        assert!(!result.has_errors());
        assert!(!result.cancelled);
    }

    #[test]
    fn invalid_limits_are_rejected() {
        let mut config = AnalysisConfig::default();
        config.limits.max_candidates = 0;
        let error = AnalysisSession::new(config).unwrap_err();
        assert!(matches!(error, AnalysisError::Config(ConfigError::ZeroLimit("max_candidates"))));
    }

    #[test]
    fn parallel_config_is_kept_after_validation() {
        let mut config = AnalysisConfig::default();
        config.parallel = ParallelInferenceConfig::new(true, 2, 4);
        let session = AnalysisSession::new(config).unwrap();
        assert!(session.config().parallel.module_parallelism);
    }
}
