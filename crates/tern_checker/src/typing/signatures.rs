//! Signatures with inferred return types.
//!
//! A declaration without a written return type gets one by typing its body.
//! The result is cached per declaration; a declaration that needs its own
//! type while computing it is a recursive problem and types as `Error`.

use super::{BodyAnalysis, BodyTyper, TypedBody};
use crate::symbols::{BodyRef, SymbolTable};
use std::cell::RefCell;
use std::sync::Arc;
use tern_inference::{AnalysisConfig, CallableSignature, CancellationToken, DeclId, InferenceError, SignatureCache, Type};
use tracing::{debug, trace};

/// Outcome of asking for a declaration's signature.
#[derive(Debug, Clone)]
pub enum SignatureLookup {
    Ready(Arc<CallableSignature>),
    /// The return type depends on itself; the signature carries `Error`.
    Recursive(Arc<CallableSignature>),
}

impl SignatureLookup {
    pub fn signature(&self) -> &Arc<CallableSignature> {
        match self {
            SignatureLookup::Ready(signature) | SignatureLookup::Recursive(signature) => signature,
        }
    }
}

/// Shared state of the bodies one worker types.
pub struct TypingContext<'s, 'a> {
    pub table: &'s SymbolTable<'a>,
    pub config: &'s AnalysisConfig,
    pub cache: &'s SignatureCache,
    pub cancel: &'s CancellationToken,
    in_progress: RefCell<Vec<DeclId>>,
}

impl<'s, 'a> TypingContext<'s, 'a> {
    pub fn new(
        table: &'s SymbolTable<'a>,
        config: &'s AnalysisConfig,
        cache: &'s SignatureCache,
        cancel: &'s CancellationToken,
    ) -> Self {
        Self {
            table,
            config,
            cache,
            cancel,
            in_progress: RefCell::new(Vec::new()),
        }
    }

    /// Types one body as a unit of analysis.
    pub fn analyze(&self, body: &BodyRef<'a>) -> Result<BodyAnalysis, InferenceError> {
        let implicit = body
            .decl
            .filter(|decl| self.table.decl(*decl).implicit);
        match implicit {
            Some(decl) => {
                let typed = self.with_in_progress(decl, || BodyTyper::new(self, body).run())?;
                if !typed.recursive {
                    self.store(decl, typed.result.clone());
                }
                Ok(typed.analysis)
            }
            None => BodyTyper::new(self, body).run().map(|typed| typed.analysis),
        }
    }

    pub fn signature(&self, decl: DeclId) -> Result<SignatureLookup, InferenceError> {
        let info = self.table.decl(decl);
        if !info.implicit {
            return Ok(SignatureLookup::Ready(info.signature.clone()));
        }
        if let Some(cached) = self.cache.get(decl) {
            return Ok(SignatureLookup::Ready(cached));
        }
        if self.in_progress.borrow().contains(&decl) {
            debug!(decl = decl.to_raw(), name = %info.signature.name, "recursive return type");
            return Ok(SignatureLookup::Recursive(info.signature.clone()));
        }
        let Some(body) = self.table.bodies().iter().find(|body| body.decl == Some(decl)) else {
            return Ok(SignatureLookup::Ready(info.signature.clone()));
        };

        trace!(decl = decl.to_raw(), name = %info.signature.name, "inferring return type");
        let typed: TypedBody = self.with_in_progress(decl, || BodyTyper::new(self, body).run())?;
        if typed.recursive {
            // Cycle results depend on the entry point; never cached.
            let mut signature = (*info.signature).clone();
            signature.return_type = Type::Error;
            return Ok(SignatureLookup::Recursive(Arc::new(signature)));
        }
        Ok(SignatureLookup::Ready(self.store(decl, typed.result)))
    }

    fn store(&self, decl: DeclId, return_type: Type) -> Arc<CallableSignature> {
        let mut signature = (*self.table.decl(decl).signature).clone();
        signature.return_type = return_type;
        self.cache.upsert(signature)
    }

    fn with_in_progress<T>(&self, decl: DeclId, f: impl FnOnce() -> T) -> T {
        self.in_progress.borrow_mut().push(decl);
        let result = f();
        self.in_progress.borrow_mut().pop();
        result
    }
}
