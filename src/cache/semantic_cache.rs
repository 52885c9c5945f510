use lru::LruCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

/// A positive judgement for one (output, input) name pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub confidence: f64,
    pub reasoning: String,
}

/// Cache key for an ordered (output path, input path) pair.
pub fn pair_key(output_path: &str, input_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(output_path.as_bytes());
    hasher.update([0x1f]);
    hasher.update(input_path.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Thread-safe LRU cache of semantic match verdicts
///
/// Keyed by parameter names only, independent of which tools own them, since
/// the same name pair recurs across many tool combinations. Negative
/// verdicts (`None`) are cached too so a warm cache answers every pair it has
/// seen without another request. Scoped to whoever constructs it.
pub struct SemanticCache {
    cache: Mutex<LruCache<String, Option<Verdict>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl SemanticCache {
    /// Create a new cache holding at most `capacity` pairs (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);

        Self {
            cache: Mutex::new(LruCache::new(cap)),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Option<Verdict>>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up a pair.
    ///
    /// `None` is a miss; `Some(None)` means the pair was judged unrelated.
    pub fn get(&self, output_path: &str, input_path: &str) -> Option<Option<Verdict>> {
        let found = self.lock().get(&pair_key(output_path, input_path)).cloned();
        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Store a verdict unless one is already present; first writer wins.
    ///
    /// Returns whichever verdict ends up cached.
    pub fn insert_if_absent(&self, output_path: &str, input_path: &str, verdict: Option<Verdict>) -> Option<Verdict> {
        let key = pair_key(output_path, input_path);
        let mut cache = self.lock();
        if let Some(existing) = cache.get(&key) {
            return existing.clone();
        }
        cache.put(key, verdict.clone());
        verdict
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    /// Grow the cache to hold at least `pairs` entries so one run never
    /// evicts a verdict it has just stored. Returns whether it grew.
    pub fn ensure_capacity(&self, pairs: usize) -> bool {
        let mut cache = self.lock();
        match NonZeroUsize::new(pairs) {
            Some(wanted) if wanted > cache.cap() => {
                log::warn!(
                    "Semantic cache capacity {} is below {} candidate pairs; growing it",
                    cache.cap(),
                    wanted
                );
                cache.resize(wanted);
                true
            }
            _ => false,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }
}

impl Default for SemanticCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn verdict(confidence: f64) -> Option<Verdict> {
        Some(Verdict {
            confidence,
            reasoning: "same identifier".to_string(),
        })
    }

    #[test]
    fn test_pair_key_is_ordered() {
        assert_eq!(pair_key("order_id", "order_number").len(), 64);
        assert_eq!(pair_key("a", "b"), pair_key("a", "b"));
        assert_ne!(pair_key("a", "b"), pair_key("b", "a"));
        // separator keeps ("ab", "c") distinct from ("a", "bc")
        assert_ne!(pair_key("ab", "c"), pair_key("a", "bc"));
    }

    #[test]
    fn test_cache_miss_then_hit() {
        let cache = SemanticCache::new(10);
        assert!(cache.get("order_id", "order_number").is_none());
        cache.insert_if_absent("order_id", "order_number", verdict(0.9));
        assert_eq!(cache.get("order_id", "order_number"), Some(verdict(0.9)));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_negative_verdict_is_a_hit() {
        let cache = SemanticCache::new(10);
        cache.insert_if_absent("wbn", "email", None);
        assert_eq!(cache.get("wbn", "email"), Some(None));
    }

    #[test]
    fn test_first_writer_wins() {
        let cache = SemanticCache::new(10);
        assert_eq!(cache.insert_if_absent("a", "b", verdict(0.9)), verdict(0.9));
        assert_eq!(cache.insert_if_absent("a", "b", None), verdict(0.9));
        assert_eq!(cache.get("a", "b"), Some(verdict(0.9)));
    }

    #[test]
    fn test_cache_eviction() {
        let cache = SemanticCache::new(2);
        cache.insert_if_absent("a", "1", None);
        cache.insert_if_absent("b", "2", None);
        cache.insert_if_absent("c", "3", None);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a", "1").is_none());
    }

    #[test]
    fn test_ensure_capacity_only_grows() {
        let cache = SemanticCache::new(4);
        assert!(!cache.ensure_capacity(3));
        assert_eq!(cache.capacity(), 4);
        assert!(cache.ensure_capacity(9));
        assert_eq!(cache.capacity(), 9);
        for i in 0..9 {
            cache.insert_if_absent("out", &i.to_string(), None);
        }
        assert_eq!(cache.len(), 9);
        assert_eq!(cache.get("out", "0"), Some(None));
    }

    #[test]
    fn test_concurrent_writers_agree() {
        let cache = Arc::new(SemanticCache::new(10));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.insert_if_absent("a", "b", verdict(0.8 + i as f64 / 100.0)))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let stored = cache.get("a", "b").unwrap();
        assert!(results.iter().all(|r| *r == stored));
    }
}
