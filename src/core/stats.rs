// File: src/core/stats.rs
use crate::core::orchestrator::PredictionOutcome;
use serde::Serialize;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Consistent view of the orchestrator counters, all from one update.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PredictionStats {
    pub total_requests: u64,
    pub successful: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub average_latency_ms: f64,
    pub success_rate: f64,
}

#[derive(Debug, Default)]
struct Counters {
    total: u64,
    successful: u64,
    failed: u64,
    cancelled: u64,
    latency: Duration,
}

/// Request counters guarded by a single lock: every update touches all fields
/// at once and every read copies them at once.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    counters: Mutex<Counters>,
}

impl StatsRecorder {
    pub fn record(&self, outcome: &PredictionOutcome, latency: Duration) {
        let mut c = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        c.total += 1;
        c.latency += latency;
        match outcome {
            PredictionOutcome::Completed(_) => c.successful += 1,
            PredictionOutcome::Failed(_) => c.failed += 1,
            PredictionOutcome::Cancelled => c.cancelled += 1,
        }
    }

    pub fn snapshot(&self) -> PredictionStats {
        let c = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        if c.total == 0 {
            return PredictionStats::default();
        }
        PredictionStats {
            total_requests: c.total,
            successful: c.successful,
            failed: c.failed,
            cancelled: c.cancelled,
            average_latency_ms: c.latency.as_secs_f64() * 1000.0 / c.total as f64,
            success_rate: c.successful as f64 / c.total as f64,
        }
    }

    pub fn reset(&self) {
        *self.counters.lock().unwrap_or_else(PoisonError::into_inner) = Counters::default();
    }
}
