// File: src/error.rs
use thiserror::Error;

/// Why a sample sequence could not be turned into a [`crate::GesturePath`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GestureError {
    #[error("gesture needs at least 2 samples, got {0}")]
    TooShort(usize),
    #[error("timestamp of sample {0} goes backwards")]
    NonMonotonic(usize),
    #[error("sample {0} has a non-finite coordinate")]
    NonFinite(usize),
}

/// Failure reported by (or around) the external inference engine.
///
/// Cancellation is deliberately not a variant: a cancelled request resolves to
/// [`crate::PredictionOutcome::Cancelled`], never to an error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("inference engine failed: {0}")]
    Engine(String),
    #[error("inference exceeded the latency limit of {0} ms")]
    Timeout(u64),
    #[error("engine returned {words} words but {confidences} confidences")]
    MismatchedOutput { words: usize, confidences: usize },
    #[error("inference task aborted: {0}")]
    Aborted(String),
}

/// Marker returned by [`crate::CancelToken::checkpoint`] once the token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// What an [`crate::InferenceEngine`] call can end with besides a prediction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("inference cancelled")]
    Cancelled,
    #[error(transparent)]
    Failed(#[from] InferenceError),
}

impl From<Cancelled> for EngineError {
    fn from(_: Cancelled) -> Self {
        EngineError::Cancelled
    }
}

impl EngineError {
    pub fn failed(message: impl Into<String>) -> Self {
        EngineError::Failed(InferenceError::Engine(message.into()))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("snapshot encoding failed: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("failed to persist snapshot: {0}")]
    Persist(#[from] tempfile::PersistError),
}
