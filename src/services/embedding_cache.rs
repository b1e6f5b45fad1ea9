//! Bounded TTL + LRU cache of text embeddings.
//!
//! Keys are blake3 digests of the canonicalized text, so inputs that differ
//! only in case, Unicode compatibility form or whitespace share an entry.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lru::LruCache;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use crate::domain::models::{canonicalize, CacheConfig, EmbeddingVector};

type CacheKey = [u8; 32];

#[derive(Debug, Clone)]
struct CacheEntry {
    vector: EmbeddingVector,
    inserted_at: Instant,
}

#[derive(Debug)]
struct CacheInner {
    entries: LruCache<CacheKey, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped to stay within capacity.
    pub evictions: u64,
    /// Entries dropped because they outlived the TTL.
    pub expirations: u64,
}

impl CacheStats {
    /// Fraction of lookups that hit, or 0 before the first lookup.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Side-cache in front of the embedding provider. Never the source of truth
/// for a candidate's stored embedding.
#[derive(Debug)]
pub struct EmbeddingCache {
    inner: Mutex<CacheInner>,
    ttl: Duration,
}

impl EmbeddingCache {
    /// Create a cache holding at most `max_entries` (at least one) vectors
    /// for `ttl` each.
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
                evictions: 0,
                expirations: 0,
            }),
            ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.ttl())
    }

    fn key(text: &str) -> CacheKey {
        *blake3::hash(canonicalize(text).as_bytes()).as_bytes()
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up `text`. Expired entries count as a miss and are removed.
    pub fn get(&self, text: &str) -> Option<EmbeddingVector> {
        let key = Self::key(text);
        let mut inner = self.lock();

        let lookup = inner
            .entries
            .get(&key)
            .map(|entry| (entry.inserted_at.elapsed() < self.ttl, entry.vector.clone()));

        let fresh = match lookup {
            Some((true, vector)) => Some(vector),
            Some((false, _)) => {
                inner.entries.pop(&key);
                inner.expirations += 1;
                None
            }
            None => None,
        };

        if fresh.is_some() {
            inner.hits += 1;
            debug!("Embedding cache hit");
        } else {
            inner.misses += 1;
        }
        fresh
    }

    /// Insert or overwrite the vector for `text`, evicting the least recently
    /// used entry when full.
    pub fn put(&self, text: &str, vector: EmbeddingVector) {
        let key = Self::key(text);
        let entry = CacheEntry {
            vector,
            inserted_at: Instant::now(),
        };

        let mut inner = self.lock();
        if let Some((old_key, _)) = inner.entries.push(key, entry) {
            if old_key != key {
                inner.evictions += 1;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. Counters are kept.
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            capacity: inner.entries.cap().get(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expirations: inner.expirations,
        }
    }
}
