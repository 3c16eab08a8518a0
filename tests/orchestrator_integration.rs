use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use swipe_core::config::{CacheConfig, OrchestratorConfig};
use swipe_core::{
    CancelToken, EngineError, GestureFingerprintCache, GesturePath, InferenceEngine, InferenceRequest,
    KeyProbabilityModel, PredictionOrchestrator, PredictionOutcome, RawPrediction, RequestStatus, VocabularyRanker,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Answers `w<sample count>` after `delay`, polling the token while it waits.
struct SlowEngine {
    delay: Duration,
    calls: AtomicUsize,
}

impl SlowEngine {
    fn new(delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            delay: Duration::from_millis(delay_ms),
            calls: AtomicUsize::new(0),
        })
    }
}

impl InferenceEngine for SlowEngine {
    fn predict(&self, request: &InferenceRequest, cancel: &CancelToken) -> Result<RawPrediction, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = Duration::from_millis(2);
        let mut waited = Duration::ZERO;
        while waited < self.delay {
            cancel.checkpoint()?;
            std::thread::sleep(step);
            waited += step;
        }
        cancel.checkpoint()?;
        Ok(RawPrediction::from_candidates([(format!("w{}", request.path.len()), 0.9)]))
    }
}

fn orchestrator(engine: Arc<SlowEngine>, config: OrchestratorConfig) -> PredictionOrchestrator {
    PredictionOrchestrator::new(
        engine,
        Arc::new(KeyProbabilityModel::default()),
        Arc::new(VocabularyRanker::default()),
        GestureFingerprintCache::new(CacheConfig::default()),
        config,
    )
}

/// A horizontal stroke on keyboard row `row` (rows are 72 px apart on the default frame).
fn stroke(row: usize, samples: usize, x_offset: f32) -> GesturePath {
    let y = 0.05 + row as f32 * 0.1;
    let pts: Vec<(f32, f32)> = (0..samples)
        .map(|i| (x_offset + 0.05 + 0.8 * i as f32 / (samples - 1) as f32, y))
        .collect();
    GesturePath::from_points(&pts, 15).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn newer_gesture_replaces_in_flight_one() {
    let engine = SlowEngine::new(300);
    let orch = orchestrator(Arc::clone(&engine), OrchestratorConfig::default());

    let first = orch.submit(stroke(0, 6, 0.0));
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(first.status(), RequestStatus::InFlight);

    let second = orch.submit(stroke(3, 8, 0.0));
    assert!(first.outcome().await.is_cancelled());
    let outcome = second.outcome().await;
    assert_eq!(outcome.predictions().unwrap()[0].word, "w8");

    let stats = orch.stats();
    assert_eq!(stats.total_requests, 2);
    assert_eq!(stats.successful, 1);
    assert_eq!(stats.cancelled, 1);
    assert!((stats.success_rate - 0.5).abs() < 1e-9);
    assert_eq!(orch.cache_stats().size, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn burst_delivers_only_the_newest() {
    let engine = SlowEngine::new(100);
    let orch = orchestrator(Arc::clone(&engine), OrchestratorConfig::default());

    let handles: Vec<_> = (0..5).map(|row| orch.submit(stroke(row, 5 + row, 0.0))).collect();
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.outcome().await);
    }
    let (last, earlier) = outcomes.split_last().unwrap();
    assert!(earlier.iter().all(PredictionOutcome::is_cancelled));
    assert_eq!(last.predictions().unwrap()[0].word, "w9");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn nearby_gesture_is_served_from_cache() {
    let engine = SlowEngine::new(0);
    let orch = orchestrator(Arc::clone(&engine), OrchestratorConfig::default());

    let first = orch.submit(stroke(1, 10, 0.0)).outcome().await;
    // 10 px to the right on a 1080 px keyboard
    let second = orch.submit(stroke(1, 10, 10.0 / 1080.0)).outcome().await;
    assert_eq!(first, second);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);

    orch.clear_cache();
    orch.submit(stroke(1, 10, 0.0)).outcome().await;
    assert_eq!(engine.calls.load(Ordering::SeqCst), 2);

    let cache = orch.cache_stats();
    assert_eq!((cache.hits, cache.misses), (1, 2));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_pending_reaches_queued_and_direct_work() {
    let engine = SlowEngine::new(2_000);
    let orch = Arc::new(orchestrator(Arc::clone(&engine), OrchestratorConfig::default()));

    let queued = orch.submit(stroke(0, 6, 0.0));
    let direct = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.predict_now(stroke(4, 6, 0.0)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    orch.cancel_pending();

    let queued_outcome = tokio::time::timeout(Duration::from_secs(1), queued.outcome()).await.unwrap();
    assert!(queued_outcome.is_cancelled());
    let direct_outcome = tokio::time::timeout(Duration::from_secs(1), direct).await.unwrap().unwrap();
    assert!(direct_outcome.is_cancelled());
    assert_eq!(orch.cache_stats().size, 0);
    assert_eq!(orch.stats().successful, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stream_debounces_and_skips_repeats() {
    let engine = SlowEngine::new(0);
    let config = OrchestratorConfig {
        debounce_ms: 20,
        ..OrchestratorConfig::default()
    };
    let orch = orchestrator(Arc::clone(&engine), config);

    let (tx, rx) = mpsc::channel(16);
    let mut predictions = orch.prediction_stream(ReceiverStream::new(rx));

    // burst collapses into its last gesture
    for samples in [3, 4, 5] {
        tx.send(stroke(0, samples, 0.0)).await.unwrap();
    }
    let first = tokio::time::timeout(Duration::from_secs(1), predictions.next()).await.unwrap().unwrap();
    assert_eq!(first[0].word, "w5");

    // same sample count and length as the last dispatch
    tx.send(stroke(0, 5, 0.0)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    tx.send(stroke(4, 7, 0.0)).await.unwrap();
    drop(tx);

    let rest: Vec<_> = predictions.collect().await;
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0][0].word, "w7");
    assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
}
