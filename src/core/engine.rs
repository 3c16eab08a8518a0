// File: src/core/engine.rs
use crate::config::Config;
use crate::core::inference::{InferenceEngine, LexiconEngine};
use crate::core::keymodel::KeyProbabilityModel;
use crate::core::orchestrator::PredictionOrchestrator;
use crate::core::vocabulary::VocabularyRanker;
use crate::error::PersistenceError;
use crate::fuzzy::cache::GestureFingerprintCache;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything needed to turn gestures into ranked words, wired from one [`Config`].
///
/// Like the orchestrator it owns, it must be built inside a tokio runtime.
pub struct SwipeEngine {
    config: Config,
    orchestrator: PredictionOrchestrator,
    snapshot_path: Option<PathBuf>,
}

impl SwipeEngine {
    /// No vocabulary: ranking runs in pass-through mode and the built-in
    /// lexicon engine has nothing to propose.
    pub fn new(config: Config) -> Self {
        let key_model = Arc::new(KeyProbabilityModel::new(config.key_model.clone()));
        let ranker = Arc::new(VocabularyRanker::new(config.vocabulary.clone()));
        Self::assemble(config, key_model, ranker, None)
    }

    /// Prefers the compiled snapshot; otherwise parses the word list and
    /// writes the snapshot for next time.
    pub fn from_sources(config: Config, word_list: Option<&Path>, snapshot: Option<&Path>) -> Self {
        let key_model = Arc::new(KeyProbabilityModel::new(config.key_model.clone()));
        let ranker = Arc::new(VocabularyRanker::new(config.vocabulary.clone()));

        let from_snapshot = snapshot.is_some_and(|p| p.exists() && ranker.load_snapshot(p));
        if !from_snapshot {
            if let Some(list) = word_list {
                if ranker.load_from_path(list) {
                    if let Some(snap) = snapshot {
                        if let Err(e) = ranker.save_snapshot(snap) {
                            warn!(path = %snap.display(), error = %e, "could not write vocabulary snapshot");
                        }
                    }
                }
            }
        }
        Self::assemble(config, key_model, ranker, snapshot.map(Path::to_path_buf))
    }

    /// Same wiring around a caller-supplied engine.
    pub fn with_engine(config: Config, engine: Arc<dyn InferenceEngine>, ranker: Arc<VocabularyRanker>) -> Self {
        let key_model = Arc::new(KeyProbabilityModel::new(config.key_model.clone()));
        let orchestrator = PredictionOrchestrator::new(
            engine,
            key_model,
            ranker,
            GestureFingerprintCache::new(config.cache.clone()),
            config.orchestrator.clone(),
        );
        Self {
            config,
            orchestrator,
            snapshot_path: None,
        }
    }

    fn assemble(
        config: Config,
        key_model: Arc<KeyProbabilityModel>,
        ranker: Arc<VocabularyRanker>,
        snapshot_path: Option<PathBuf>,
    ) -> Self {
        let lexicon = ranker.top_words(config.vocabulary.max_words);
        info!(words = lexicon.len(), loaded = ranker.is_loaded(), "swipe engine assembled");
        let engine = LexiconEngine::new(Arc::clone(&key_model), lexicon);
        let orchestrator = PredictionOrchestrator::new(
            Arc::new(engine),
            key_model,
            ranker,
            GestureFingerprintCache::new(config.cache.clone()),
            config.orchestrator.clone(),
        );
        Self {
            config,
            orchestrator,
            snapshot_path,
        }
    }

    pub fn orchestrator(&self) -> &PredictionOrchestrator {
        &self.orchestrator
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn save_vocabulary(&self) -> Result<(), PersistenceError> {
        match &self.snapshot_path {
            Some(path) if self.orchestrator.ranker().is_loaded() => self.orchestrator.ranker().save_snapshot(path),
            _ => Ok(()), // nothing to save
        }
    }
}
