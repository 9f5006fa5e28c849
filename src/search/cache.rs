//! Embedding cache keyed by message id
//!
//! Entries are immutable once written. A second `put` for the same key keeps
//! the first vector, so concurrent writers cannot disagree. Nothing is ever
//! evicted; `clear` is the only way to drop entries.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Append-only `message id -> vector` map shared across searches
#[derive(Debug, Default)]
pub struct EmbeddingCache {
    entries: RwLock<HashMap<String, Arc<[f32]>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Arc<[f32]>> {
        let found = self.entries.read().get(id).cloned();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Insert unless present; returns the stored vector either way
    pub fn put(&self, id: impl Into<String>, vector: Vec<f32>) -> Arc<[f32]> {
        let mut entries = self.entries.write();
        entries
            .entry(id.into())
            .or_insert_with(|| Arc::from(vector))
            .clone()
    }

    /// Cached vector for `id`, computing and storing it on a miss
    ///
    /// `compute` runs without the lock held; a failed computation stores nothing.
    pub fn get_or_insert_with<E>(
        &self,
        id: &str,
        compute: impl FnOnce() -> Result<Vec<f32>, E>,
    ) -> Result<Arc<[f32]>, E> {
        if let Some(hit) = self.get(id) {
            return Ok(hit);
        }
        let vector = compute()?;
        Ok(self.put(id, vector))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_first_write_wins() {
        let cache = EmbeddingCache::new();
        cache.put("C1/1.0", vec![1.0, 0.0]);
        let stored = cache.put("C1/1.0", vec![0.0, 1.0]);
        assert_eq!(&*stored, &[1.0, 0.0]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_or_insert_computes_once() {
        let cache = EmbeddingCache::new();
        let mut calls = 0;
        for _ in 0..3 {
            let v = cache
                .get_or_insert_with("m", || -> Result<_, ()> {
                    calls += 1;
                    Ok(vec![0.5])
                })
                .unwrap();
            assert_eq!(&*v, &[0.5]);
        }
        assert_eq!(calls, 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn test_failed_compute_stores_nothing() {
        let cache = EmbeddingCache::new();
        let result = cache.get_or_insert_with("m", || Err::<Vec<f32>, _>("boom"));
        assert_eq!(result.unwrap_err(), "boom");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_puts() {
        let cache = Arc::new(EmbeddingCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    cache.put(format!("m{}", i % 4), vec![i as f32]);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 4);

        cache.clear();
        assert!(cache.is_empty());
    }
}
