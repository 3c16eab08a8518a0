// File: src/fuzzy/cache.rs
use crate::config::CacheConfig;
use crate::core::types::{GesturePath, KeyboardFrame, RankedPrediction};
use crate::fuzzy::fingerprint::GestureFingerprint;
use crate::fuzzy::lru::LruList;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    fingerprint: GestureFingerprint,
    predictions: Vec<RankedPrediction>,
    last_access: Instant,
}

struct CacheState {
    entries: LruList<CacheEntry>,
    hits: u64,
    misses: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub total_requests: u64,
    pub hit_rate_percent: f64,
}

/// Bounded memo of gesture → ranked predictions, keyed by fingerprint similarity.
///
/// Lookups scan every key (the key is approximate, there is nothing to hash),
/// which is fine at the small fixed capacity. Each public operation runs under
/// one lock, so concurrent `get`/`put` pairs cannot leave near-duplicates behind.
pub struct GestureFingerprintCache {
    config: CacheConfig,
    state: Mutex<CacheState>,
}

impl GestureFingerprintCache {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = config.capacity;
        Self {
            config,
            state: Mutex::new(CacheState {
                entries: LruList::with_capacity(capacity),
                hits: 0,
                misses: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn find_similar(&self, state: &CacheState, key: &GestureFingerprint) -> Option<usize> {
        state
            .entries
            .iter()
            .find(|(_, entry)| {
                entry.fingerprint.is_similar_to(
                    key,
                    self.config.distance_threshold,
                    self.config.length_tolerance,
                )
            })
            .map(|(idx, _)| idx)
    }

    /// Returns the predictions of a similar earlier gesture and marks it most recent.
    /// Counts exactly one hit or one miss.
    pub fn get(&self, path: &GesturePath, frame: &KeyboardFrame) -> Option<Vec<RankedPrediction>> {
        let key = GestureFingerprint::of(path, frame);
        let mut state = self.lock();
        let found = self.find_similar(&state, &key);
        let Some(idx) = found else {
            state.misses += 1;
            return None;
        };
        state.hits += 1;
        state.entries.move_to_front(idx);
        let entry = state.entries.get_mut(idx)?;
        entry.last_access = Instant::now();
        let predictions = entry.predictions.clone();
        debug!(
            hits = state.hits,
            misses = state.misses,
            "gesture cache hit"
        );
        Some(predictions)
    }

    /// Stores predictions, replacing any similar entry and evicting the least
    /// recently used one beyond capacity.
    pub fn put(&self, path: &GesturePath, frame: &KeyboardFrame, predictions: Vec<RankedPrediction>) {
        let key = GestureFingerprint::of(path, frame);
        if self.config.capacity == 0 {
            return;
        }
        let mut state = self.lock();
        if let Some(idx) = self.find_similar(&state, &key) {
            state.entries.remove(idx);
        }
        state.entries.push_front(CacheEntry {
            fingerprint: key,
            predictions,
            last_access: Instant::now(),
        });
        while state.entries.len() > self.config.capacity {
            if let Some(evicted) = state.entries.pop_back() {
                debug!(
                    idle_ms = evicted.last_access.elapsed().as_millis() as u64,
                    "evicted least recently used gesture"
                );
            }
        }
        debug!(size = state.entries.len(), "cached prediction");
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
        debug!("gesture cache cleared");
    }

    pub fn reset_metrics(&self) {
        let mut state = self.lock();
        state.hits = 0;
        state.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        let total = state.hits + state.misses;
        CacheStats {
            size: state.entries.len(),
            capacity: self.config.capacity,
            hits: state.hits,
            misses: state.misses,
            total_requests: total,
            hit_rate_percent: if total > 0 {
                state.hits as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        }
    }
}

impl Default for GestureFingerprintCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
