//! LRU + TTL cache for query embeddings.
//!
//! Repeated search queries skip the embedder. Default: 1000 entries, 1-hour TTL.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use ndarray::Array1;
use parking_lot::Mutex;

struct CacheEntry {
    embedding: Array1<f32>,
    inserted_at: Instant,
}

/// Thread-safe LRU cache keyed by query text.
pub struct QueryCache {
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Front is least recently used.
    recency: VecDeque<String>,
    capacity: usize,
    ttl: Duration,
    hits: u64,
    misses: u64,
}

impl CacheInner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.recency.iter().position(|k| k == key) {
            if let Some(k) = self.recency.remove(pos) {
                self.recency.push_back(k);
            }
        }
    }

    fn evict(&mut self, key: &str) {
        self.entries.remove(key);
        self.recency.retain(|k| k != key);
    }
}

impl QueryCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::with_capacity(capacity),
                recency: VecDeque::with_capacity(capacity),
                capacity: capacity.max(1),
                ttl,
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Look up a query. Expired entries are dropped and count as a miss.
    pub fn get(&self, query: &str) -> Option<Array1<f32>> {
        let mut inner = self.inner.lock();
        let ttl = inner.ttl;
        let lookup = inner
            .entries
            .get(query)
            .map(|e| (e.inserted_at.elapsed() < ttl, e.embedding.clone()));
        let fresh = match lookup {
            Some((true, embedding)) => Some(embedding),
            Some((false, _)) => {
                inner.evict(query);
                None
            }
            None => None,
        };

        if fresh.is_some() {
            inner.hits += 1;
            inner.touch(query);
        } else {
            inner.misses += 1;
        }
        fresh
    }

    pub fn put(&self, query: String, embedding: Array1<f32>) {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&query) {
            inner.touch(&query);
        } else {
            while inner.entries.len() >= inner.capacity {
                match inner.recency.pop_front() {
                    Some(oldest) => {
                        inner.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            inner.recency.push_back(query.clone());
        }
        inner.entries.insert(
            query,
            CacheEntry {
                embedding,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `(hits, misses)` since creation.
    pub fn hit_stats(&self) -> (u64, u64) {
        let inner = self.inner.lock();
        (inner.hits, inner.misses)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.recency.clear();
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(1000, Duration::from_secs(3600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_hit_and_miss() {
        let cache = QueryCache::new(10, Duration::from_secs(3600));
        assert!(cache.get("hello").is_none());

        cache.put("hello".into(), array![1.0, 2.0, 3.0]);
        assert_eq!(cache.get("hello"), Some(array![1.0, 2.0, 3.0]));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hit_stats(), (1, 1));
    }

    #[test]
    fn test_lru_eviction() {
        let cache = QueryCache::new(2, Duration::from_secs(3600));
        cache.put("a".into(), array![1.0]);
        cache.put("b".into(), array![2.0]);
        // Touch "a" so "b" becomes least recently used.
        assert!(cache.get("a").is_some());

        cache.put("c".into(), array![3.0]);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = QueryCache::new(10, Duration::from_millis(1));
        cache.put("ephemeral".into(), array![1.0]);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("ephemeral").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reinsert_refreshes_value() {
        let cache = QueryCache::new(2, Duration::from_secs(60));
        cache.put("q".into(), array![1.0]);
        cache.put("q".into(), array![9.0]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("q"), Some(array![9.0]));
        cache.clear();
        assert!(cache.is_empty());
    }
}
