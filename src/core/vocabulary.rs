// File: src/core/vocabulary.rs
use crate::config::VocabularyConfig;
use crate::core::types::{CandidateWord, GestureShape, RankedPrediction};
use crate::error::PersistenceError;
use crate::persistence::{load_word_list, save_word_list};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// Frequency table built from a most-frequent-first word list.
/// The word at rank `r` has frequency `1 / (r + 1)`.
#[derive(Debug, Default)]
struct VocabularyTable {
    words: Vec<String>,
    ranks: HashMap<String, usize>,
}

impl VocabularyTable {
    fn from_words(words: Vec<String>) -> Self {
        let ranks = words.iter().enumerate().map(|(i, w)| (w.clone(), i)).collect();
        Self { words, ranks }
    }

    fn rank(&self, word: &str) -> Option<usize> {
        self.ranks.get(word).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VocabularyStats {
    pub total_words: usize,
    pub common_words: usize,
    pub frequent_words: usize,
    pub average_length: f32,
}

/// Re-scores raw engine candidates against word frequencies.
///
/// Until a word list loads successfully the ranker runs in pass-through mode:
/// candidates come back ordered by raw confidence and nothing is filtered.
pub struct VocabularyRanker {
    config: VocabularyConfig,
    table: RwLock<Option<Arc<VocabularyTable>>>,
}

impl VocabularyRanker {
    pub fn new(config: VocabularyConfig) -> Self {
        Self {
            config,
            table: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &VocabularyConfig {
        &self.config
    }

    fn snapshot(&self) -> Option<Arc<VocabularyTable>> {
        self.table.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn install(&self, table: VocabularyTable) {
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(table));
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot().is_some()
    }

    /// Loads a newline-delimited word list. Returns `false` (and stays in
    /// pass-through mode) if the file is missing, unreadable or empty.
    pub fn load_from_path(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        match File::open(path) {
            Ok(file) => {
                let loaded = self.load_from_reader(BufReader::new(file));
                if loaded {
                    info!(path = %path.display(), "vocabulary loaded");
                }
                loaded
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "vocabulary unavailable, ranking in pass-through mode");
                false
            }
        }
    }

    pub fn load_from_reader<R: BufRead>(&self, reader: R) -> bool {
        let mut lines = Vec::new();
        for line in reader.lines() {
            match line {
                Ok(line) => lines.push(line),
                Err(e) => {
                    warn!(error = %e, "failed to read vocabulary, ranking in pass-through mode");
                    return false;
                }
            }
        }
        self.load_words(lines)
    }

    pub fn load_words<I, S>(&self, words: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashMap::new();
        let mut list = Vec::new();
        for raw in words {
            if list.len() >= self.config.max_words {
                break;
            }
            let Some(word) = normalize_word(raw.as_ref()) else {
                continue;
            };
            if seen.insert(word.clone(), ()).is_none() {
                list.push(word);
            }
        }
        if list.is_empty() {
            warn!("vocabulary contained no usable words, ranking in pass-through mode");
            return false;
        }
        let table = VocabularyTable::from_words(list);
        info!(
            words = table.words.len(),
            common = table.words.len().min(self.config.common_words_count),
            frequent = table.words.len().min(self.config.frequent_words_count),
            "vocabulary ready"
        );
        self.install(table);
        true
    }

    /// Appends words from a secondary list that the primary list lacks, ranked
    /// after everything already loaded. Requires a loaded primary list.
    pub fn extend_from_path(&self, path: impl AsRef<Path>) -> bool {
        let Some(current) = self.snapshot() else {
            return false;
        };
        let file = match File::open(path.as_ref()) {
            Ok(file) => file,
            Err(e) => {
                warn!(error = %e, "secondary word list unavailable");
                return false;
            }
        };
        let mut words = current.words.clone();
        let mut added = 0usize;
        for line in BufReader::new(file).lines() {
            let Ok(line) = line else {
                warn!("secondary word list truncated by read error");
                break;
            };
            if let Some(word) = normalize_word(&line) {
                if !current.ranks.contains_key(&word) && !words[current.words.len()..].contains(&word) {
                    words.push(word);
                    added += 1;
                }
            }
        }
        info!(added, "secondary word list merged");
        self.install(VocabularyTable::from_words(words));
        true
    }

    /// Writes the loaded word list as a binary snapshot for faster startup.
    pub fn save_snapshot(&self, path: &Path) -> Result<(), PersistenceError> {
        let words = self.snapshot().map(|t| t.words.clone()).unwrap_or_default();
        save_word_list(&words, path)
    }

    pub fn load_snapshot(&self, path: &Path) -> bool {
        match load_word_list(path) {
            Ok(words) => self.load_words(words),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "vocabulary snapshot unusable");
                false
            }
        }
    }

    pub fn is_known_word(&self, word: &str) -> bool {
        self.snapshot()
            .map_or(false, |t| t.rank(&word.to_lowercase()).is_some())
    }

    /// `1 / (rank + 1)` for known words, 0 otherwise.
    pub fn frequency(&self, word: &str) -> f32 {
        self.snapshot()
            .and_then(|t| t.rank(&word.to_lowercase()))
            .map_or(0.0, rank_frequency)
    }

    /// The `n` most frequent words.
    pub fn top_words(&self, n: usize) -> Vec<String> {
        self.snapshot()
            .map(|t| t.words.iter().take(n).cloned().collect())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> VocabularyStats {
        let Some(table) = self.snapshot() else {
            return VocabularyStats {
                total_words: 0,
                common_words: 0,
                frequent_words: 0,
                average_length: 0.0,
            };
        };
        let total = table.words.len();
        let chars: usize = table.words.iter().map(|w| w.chars().count()).sum();
        VocabularyStats {
            total_words: total,
            common_words: total.min(self.config.common_words_count),
            frequent_words: total.min(self.config.frequent_words_count),
            average_length: if total > 0 { chars as f32 / total as f32 } else { 0.0 },
        }
    }

    /// Scores and orders candidates; unknown words with low confidence are dropped.
    /// Equal scores keep their input order.
    pub fn rank(&self, candidates: &[CandidateWord], shape: &GestureShape) -> Vec<RankedPrediction> {
        let Some(table) = self.snapshot() else {
            let mut passthrough: Vec<RankedPrediction> = candidates
                .iter()
                .map(|c| RankedPrediction::new(c.word.clone(), c.confidence))
                .collect();
            passthrough.sort_by(|a, b| b.score.total_cmp(&a.score));
            return passthrough;
        };

        let mut ranked: Vec<RankedPrediction> = candidates
            .iter()
            .filter_map(|candidate| {
                let word = candidate.word.to_lowercase();
                let vocab_score = match table.rank(&word) {
                    Some(rank) => self.vocabulary_score(&word, rank),
                    None if candidate.confidence < self.config.oov_min_confidence => return None,
                    None => self.config.oov_penalty,
                };
                let score = candidate.confidence * vocab_score * self.context_score(&word, shape);
                Some(RankedPrediction::new(word, score))
            })
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }

    fn vocabulary_score(&self, word: &str, rank: usize) -> f32 {
        let c = &self.config;
        let mut score = 1.0 + rank_frequency(rank) * c.frequency_boost_multiplier;
        if rank < c.common_words_count {
            score *= c.common_word_boost;
        }
        if rank < c.frequent_words_count {
            score *= c.frequent_word_boost;
        }
        if word.chars().count() > c.long_word_length_threshold {
            score *= c.long_word_penalty;
        }
        score
    }

    /// Penalizes words whose length disagrees with the swipe's extent or duration.
    fn context_score(&self, word: &str, shape: &GestureShape) -> f32 {
        let len = word.chars().count() as f32;
        let expected_len = shape.path_length / self.config.path_length_divisor;
        let length_factor = (1.0 - (len - expected_len).abs() * 0.1).max(0.5);
        let expected_duration = len * self.config.typing_speed_multiplier;
        let duration_factor = (1.0 - (shape.duration - expected_duration).abs() * 0.2).max(0.7);
        length_factor * duration_factor
    }
}

impl Default for VocabularyRanker {
    fn default() -> Self {
        Self::new(VocabularyConfig::default())
    }
}

fn rank_frequency(rank: usize) -> f32 {
    1.0 / (rank as f32 + 1.0)
}

fn normalize_word(raw: &str) -> Option<String> {
    let word = raw.trim().to_lowercase();
    (!word.is_empty() && word.chars().all(char::is_alphabetic)).then_some(word)
}
