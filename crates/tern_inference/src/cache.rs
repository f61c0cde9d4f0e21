//! Session-lived cache of callable signatures whose return types had to be
//! inferred from their bodies.
//!
//! Entries are written once. Two workers racing on the same declaration compute
//! the same value, so the first insert wins and the loser adopts it.

use crate::signature::CallableSignature;
use crate::types::DeclId;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::trace;

/// Aggregated metrics describing cache effectiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheMetrics {
    pub lookups: u64,
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
}

impl CacheMetrics {
    /// Hit rate in `[0.0, 1.0]` once at least one lookup happened.
    pub fn hit_rate(self) -> Option<f64> {
        if self.lookups == 0 {
            None
        } else {
            Some(self.hits as f64 / self.lookups as f64)
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
}

#[derive(Debug, Default)]
pub struct SignatureCache {
    entries: RwLock<FxHashMap<DeclId, Arc<CallableSignature>>>,
    counters: Counters,
}

impl SignatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, decl: DeclId) -> Option<Arc<CallableSignature>> {
        let found = match self.entries.read() {
            Ok(entries) => entries.get(&decl).cloned(),
            Err(poisoned) => poisoned.into_inner().get(&decl).cloned(),
        };
        if found.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            trace!(decl = decl.to_raw(), "signature cache hit");
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Inserts `signature` unless an entry exists; returns the stored value.
    pub fn upsert(&self, signature: CallableSignature) -> Arc<CallableSignature> {
        let decl = signature.id;
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries
            .entry(decl)
            .or_insert_with(|| {
                self.counters.inserts.fetch_add(1, Ordering::Relaxed);
                Arc::new(signature)
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metrics(&self) -> CacheMetrics {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        CacheMetrics {
            lookups: hits + misses,
            hits,
            misses,
            inserts: self.counters.inserts.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    #[test]
    fn first_insert_wins() {
        let cache = SignatureCache::new();
        let decl = DeclId::new(4);
        assert!(cache.get(decl).is_none());
        let first = cache.upsert(CallableSignature::function(decl, "f", Vec::new(), Type::int()));
        let second = cache.upsert(CallableSignature::function(decl, "f", Vec::new(), Type::string()));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.get(decl).map(|sig| sig.return_type.clone()), Some(Type::int()));

        let metrics = cache.metrics();
        assert_eq!(metrics.lookups, 2);
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.inserts, 1);
        assert_eq!(metrics.hit_rate(), Some(0.5));
    }

    #[test]
    fn concurrent_upserts_agree() {
        let cache = SignatureCache::new();
        let decl = DeclId::new(9);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    cache.upsert(CallableSignature::function(decl, "g", Vec::new(), Type::long()));
                });
            }
        });
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.metrics().inserts, 1);
    }
}
