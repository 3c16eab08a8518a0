// File: src/lib.rs
//! Prediction core for gesture (swipe) typing.
//!
//! A gesture flows through [`PredictionOrchestrator`]: the [`GestureFingerprintCache`]
//! is consulted first, then the [`InferenceEngine`] proposes words, and the
//! [`VocabularyRanker`] re-scores them by frequency and gesture shape.
//! [`KeyProbabilityModel`] supplies per-key likelihoods for the engine.

pub mod config;
pub mod core;
pub mod error;
pub mod fuzzy;
pub mod persistence;

pub use crate::config::Config;
pub use crate::core::engine::SwipeEngine;
pub use crate::core::inference::{CancelToken, InferenceEngine, InferenceRequest, LexiconEngine, RawPrediction};
pub use crate::core::keymodel::KeyProbabilityModel;
pub use crate::core::orchestrator::{PredictionHandle, PredictionOrchestrator, PredictionOutcome, RequestStatus};
pub use crate::core::stats::PredictionStats;
pub use crate::core::types::{
    CandidateWord, GestureSample, GesturePath, GestureShape, KeyBounds, KeyboardFrame, Point, RankedPrediction,
};
pub use crate::core::vocabulary::{VocabularyRanker, VocabularyStats};
pub use crate::error::{Cancelled, ConfigError, EngineError, GestureError, InferenceError, PersistenceError};
pub use crate::fuzzy::cache::{CacheStats, GestureFingerprintCache};
