// File: src/config.rs
//! Tunable constants for every stage of the pipeline.
//!
//! All sections deserialize with `#[serde(default)]`, so a config file only
//! needs to name the values it overrides.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub key_model: KeyModelConfig,
    pub cache: CacheConfig,
    pub orchestrator: OrchestratorConfig,
    pub vocabulary: VocabularyConfig,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyModelConfig {
    /// Horizontal standard deviation as a fraction of key width.
    pub sigma_x_factor: f32,
    /// Vertical standard deviation as a fraction of key height.
    pub sigma_y_factor: f32,
    /// Per-point probabilities below this are ignored.
    pub min_probability: f32,
}

impl Default for KeyModelConfig {
    fn default() -> Self {
        Self {
            sigma_x_factor: 0.4,
            sigma_y_factor: 0.35,
            min_probability: 0.01,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
    /// Maximum start/end/mean distance, in keyboard pixels.
    pub distance_threshold: f32,
    /// Allowed relative difference in sample count (0.2 = ±20%).
    pub length_tolerance: f32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 20,
            distance_threshold: 50.0,
            length_tolerance: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub queue_capacity: usize,
    pub debounce_ms: u64,
    /// Upper bound for a single inference call; `None` disables it.
    pub max_latency_ms: Option<u64>,
    /// Pass per-letter path probabilities to the engine.
    pub use_key_priors: bool,
}

impl OrchestratorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn max_latency(&self) -> Option<Duration> {
        self.max_latency_ms.map(Duration::from_millis)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 16,
            debounce_ms: 50,
            max_latency_ms: None,
            use_key_priors: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    pub max_words: usize,
    pub common_words_count: usize,
    pub frequent_words_count: usize,
    pub frequency_boost_multiplier: f32,
    pub common_word_boost: f32,
    pub frequent_word_boost: f32,
    pub long_word_length_threshold: usize,
    pub long_word_penalty: f32,
    /// Pixels of swipe per expected letter.
    pub path_length_divisor: f32,
    /// Seconds of swipe per expected letter.
    pub typing_speed_multiplier: f32,
    pub oov_penalty: f32,
    pub oov_min_confidence: f32,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            max_words: 150_000,
            common_words_count: 100,
            frequent_words_count: 5000,
            frequency_boost_multiplier: 1000.0,
            common_word_boost: 2.0,
            frequent_word_boost: 1.5,
            long_word_length_threshold: 12,
            long_word_penalty: 0.5,
            path_length_divisor: 50.0,
            typing_speed_multiplier: 0.15,
            oov_penalty: 0.3,
            oov_min_confidence: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = Config::from_json_str(
            r#"{ "cache": { "capacity": 4 }, "orchestrator": { "max_latency_ms": 250 } }"#,
        )
        .unwrap();
        assert_eq!(config.cache.capacity, 4);
        assert_eq!(config.cache.distance_threshold, 50.0);
        assert_eq!(config.orchestrator.max_latency(), Some(Duration::from_millis(250)));
        assert_eq!(config.orchestrator.queue_capacity, 16);
        assert_eq!(config.vocabulary, VocabularyConfig::default());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(Config::from_json_str("{ nope"), Err(ConfigError::Json(_))));
    }
}
