// File: src/core/inference.rs
//! Boundary to the external word scorer.
//!
//! Engines are synchronous: the orchestrator runs them on the blocking pool and
//! hands them a [`CancelToken`] to poll between units of work.

use crate::core::keymodel::KeyProbabilityModel;
use crate::core::types::{CandidateWord, GesturePath};
use crate::error::{Cancelled, EngineError, InferenceError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

/// Cooperative cancellation flag shared between a request and its worker.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the token fired; use with `?` at scheduling points.
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves when the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Everything an engine gets for one gesture.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub path: Arc<GesturePath>,
    pub keyboard_width: f32,
    pub keyboard_height: f32,
    /// Per-letter path probabilities, when the orchestrator is configured to send them.
    pub key_priors: Option<HashMap<char, f32>>,
}

/// Parallel word/confidence arrays as produced by a model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPrediction {
    pub words: Vec<String>,
    pub confidences: Vec<f32>,
}

impl RawPrediction {
    pub fn from_candidates(candidates: impl IntoIterator<Item = (String, f32)>) -> Self {
        let (words, confidences) = candidates.into_iter().unzip();
        Self { words, confidences }
    }

    /// Pairs words with confidences, clamping confidences into `[0,1]`.
    pub fn into_candidates(self) -> Result<Vec<CandidateWord>, InferenceError> {
        if self.words.len() != self.confidences.len() {
            return Err(InferenceError::MismatchedOutput {
                words: self.words.len(),
                confidences: self.confidences.len(),
            });
        }
        Ok(self
            .words
            .into_iter()
            .zip(self.confidences)
            .map(|(word, c)| CandidateWord::new(word, if c.is_nan() { 0.0 } else { c.clamp(0.0, 1.0) }))
            .collect())
    }
}

pub trait InferenceEngine: Send + Sync {
    /// Scores a gesture. Implementations should call `cancel.checkpoint()?`
    /// at their natural yield points.
    fn predict(&self, request: &InferenceRequest, cancel: &CancelToken) -> Result<RawPrediction, EngineError>;
}

impl<F> InferenceEngine for F
where
    F: Fn(&InferenceRequest, &CancelToken) -> Result<RawPrediction, EngineError> + Send + Sync,
{
    fn predict(&self, request: &InferenceRequest, cancel: &CancelToken) -> Result<RawPrediction, EngineError> {
        self(request, cancel)
    }
}

/// Dictionary-driven fallback engine: scores every word whose first and last
/// letters sit under the path's endpoints by how well the path traces it.
pub struct LexiconEngine {
    key_model: Arc<KeyProbabilityModel>,
    words: Vec<String>,
    max_candidates: usize,
}

const ENDPOINT_FLOOR: f32 = 0.05;
const CHECKPOINT_INTERVAL: usize = 256;

impl LexiconEngine {
    pub fn new(key_model: Arc<KeyProbabilityModel>, words: Vec<String>) -> Self {
        Self {
            key_model,
            words,
            max_candidates: 10,
        }
    }

    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates;
        self
    }
}

impl InferenceEngine for LexiconEngine {
    fn predict(&self, request: &InferenceRequest, cancel: &CancelToken) -> Result<RawPrediction, EngineError> {
        cancel.checkpoint()?;
        let path = request.path.as_ref();
        let (start, end) = (path.first(), path.last());
        let mut scored: Vec<(String, f32)> = Vec::new();

        for (i, word) in self.words.iter().enumerate() {
            if i % CHECKPOINT_INTERVAL == 0 {
                cancel.checkpoint()?;
            }
            let (Some(first), Some(last)) = (word.chars().next(), word.chars().last()) else {
                continue;
            };
            if self.key_model.probability_of(start, first) < ENDPOINT_FLOOR
                || self.key_model.probability_of(end, last) < ENDPOINT_FLOOR
            {
                continue;
            }
            let mut confidence = self.key_model.word_confidence(word, path);
            if let Some(priors) = &request.key_priors {
                let letters = word.chars().count() as f32;
                let covered = word.chars().filter(|c| priors.contains_key(c)).count() as f32;
                confidence *= 0.5 + 0.5 * covered / letters;
            }
            scored.push((word.clone(), confidence));
        }

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(self.max_candidates);
        debug!(candidates = scored.len(), "lexicon engine scored gesture");
        cancel.checkpoint()?;
        Ok(RawPrediction::from_candidates(scored))
    }
}
