// File: src/core/orchestrator.rs
//! Serializes prediction requests against a single inference call.
//!
//! Requests move through `queued -> in-flight -> {completed | cancelled | failed}`.
//! A new submission cancels every request that has not delivered yet, so the
//! newest gesture always wins; the bounded queue only absorbs short bursts.

use crate::config::OrchestratorConfig;
use crate::core::inference::{CancelToken, InferenceEngine, InferenceRequest};
use crate::core::keymodel::KeyProbabilityModel;
use crate::core::stats::{PredictionStats, StatsRecorder};
use crate::core::types::{GesturePath, GestureShape, KeyBounds, RankedPrediction};
use crate::core::vocabulary::VocabularyRanker;
use crate::error::{EngineError, InferenceError};
use crate::fuzzy::cache::{CacheStats, GestureFingerprintCache};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// Terminal result of one prediction request.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    Completed(Vec<RankedPrediction>),
    /// Superseded or explicitly cancelled; expected and silent.
    Cancelled,
    Failed(InferenceError),
}

impl PredictionOutcome {
    pub fn predictions(&self) -> Option<&[RankedPrediction]> {
        match self {
            PredictionOutcome::Completed(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PredictionOutcome::Cancelled)
    }

    fn status(&self) -> RequestStatus {
        match self {
            PredictionOutcome::Completed(_) => RequestStatus::Completed,
            PredictionOutcome::Cancelled => RequestStatus::Cancelled,
            PredictionOutcome::Failed(_) => RequestStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestStatus {
    Queued,
    InFlight,
    Completed,
    Cancelled,
    Failed,
}

struct Slot {
    status: RequestStatus,
    reply: Option<oneshot::Sender<PredictionOutcome>>,
}

/// One submitted gesture. Whoever takes `reply` first decides the outcome.
struct Pending {
    id: u64,
    path: Arc<GesturePath>,
    token: CancelToken,
    slot: Mutex<Slot>,
}

impl Pending {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn status(&self) -> RequestStatus {
        self.lock().status
    }

    /// Moves a queued request in flight; `false` if it was already cancelled.
    fn start(&self) -> bool {
        let mut slot = self.lock();
        if slot.reply.is_none() || self.token.is_cancelled() {
            return false;
        }
        slot.status = RequestStatus::InFlight;
        true
    }

    fn cancel(&self) {
        self.token.cancel();
        let mut slot = self.lock();
        if let Some(reply) = slot.reply.take() {
            slot.status = RequestStatus::Cancelled;
            let _ = reply.send(PredictionOutcome::Cancelled);
            debug!(id = self.id, "prediction cancelled");
        }
    }

    /// Delivers the worker's result unless the request was cancelled meanwhile.
    /// `record` sees the outcome that actually counts.
    fn settle(&self, outcome: PredictionOutcome, record: impl FnOnce(&PredictionOutcome)) {
        let mut slot = self.lock();
        let outcome = if self.token.is_cancelled() {
            PredictionOutcome::Cancelled
        } else {
            outcome
        };
        record(&outcome);
        if let Some(reply) = slot.reply.take() {
            slot.status = outcome.status();
            let _ = reply.send(outcome);
        }
    }
}

/// Caller's view of a submitted gesture.
pub struct PredictionHandle {
    pending: Arc<Pending>,
    reply: oneshot::Receiver<PredictionOutcome>,
}

impl PredictionHandle {
    pub fn id(&self) -> u64 {
        self.pending.id
    }

    pub fn status(&self) -> RequestStatus {
        self.pending.status()
    }

    pub fn cancel(&self) {
        self.pending.cancel();
    }

    pub async fn outcome(self) -> PredictionOutcome {
        self.reply.await.unwrap_or(PredictionOutcome::Cancelled)
    }
}

struct Shared {
    config: OrchestratorConfig,
    engine: Arc<dyn InferenceEngine>,
    key_model: Arc<KeyProbabilityModel>,
    ranker: Arc<VocabularyRanker>,
    cache: GestureFingerprintCache,
    stats: StatsRecorder,
    queue: Mutex<VecDeque<Arc<Pending>>>,
    in_flight: Mutex<Option<Arc<Pending>>>,
    wakeup: Notify,
    /// Held for the whole engine call, including after its caller gave up on it.
    inference_gate: Arc<tokio::sync::Mutex<()>>,
    /// Cancels direct `predict_now` calls; replaced by every `cancel_pending`.
    direct_epoch: Mutex<CancelToken>,
    shutdown: CancelToken,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn next_request(&self) -> Option<Arc<Pending>> {
        let mut queue = lock(&self.queue);
        while let Some(pending) = queue.pop_front() {
            if pending.start() {
                *lock(&self.in_flight) = Some(Arc::clone(&pending));
                return Some(pending);
            }
        }
        None
    }

    async fn process(&self, pending: Arc<Pending>) {
        let started = Instant::now();
        let outcome = self.run_pipeline(&pending.path, &pending.token).await;
        let latency = started.elapsed();
        pending.settle(outcome, |final_outcome| {
            self.stats.record(final_outcome, latency);
            debug!(
                id = pending.id,
                status = ?final_outcome.status(),
                latency_ms = latency.as_millis() as u64,
                "prediction settled"
            );
        });
        let mut in_flight = lock(&self.in_flight);
        if in_flight.as_ref().map(|p| p.id) == Some(pending.id) {
            *in_flight = None;
        }
    }

    async fn run_direct(&self, path: Arc<GesturePath>) -> PredictionOutcome {
        let token = lock(&self.direct_epoch).clone();
        let started = Instant::now();
        let outcome = self.run_pipeline(&path, &token).await;
        self.stats.record(&outcome, started.elapsed());
        outcome
    }

    /// Cache lookup, then engine call, ranking and cache store on a miss.
    async fn run_pipeline(&self, path: &Arc<GesturePath>, token: &CancelToken) -> PredictionOutcome {
        let frame = self.key_model.keyboard_frame();
        if let Some(hit) = self.cache.get(path, &frame) {
            return PredictionOutcome::Completed(hit);
        }
        if token.is_cancelled() {
            return PredictionOutcome::Cancelled;
        }

        let gate = tokio::select! {
            guard = Arc::clone(&self.inference_gate).lock_owned() => guard,
            _ = token.cancelled() => return PredictionOutcome::Cancelled,
        };
        if token.is_cancelled() {
            return PredictionOutcome::Cancelled;
        }
        let request = InferenceRequest {
            path: Arc::clone(path),
            keyboard_width: frame.width,
            keyboard_height: frame.height,
            key_priors: self
                .config
                .use_key_priors
                .then(|| self.key_model.path_probabilities(path)),
        };
        // a timeout stops the engine through this token and leaves `token` untouched
        let engine = Arc::clone(&self.engine);
        let call_token = CancelToken::new();
        let engine_token = call_token.clone();
        let mut call = tokio::task::spawn_blocking(move || {
            let _gate = gate;
            engine.predict(&request, &engine_token)
        });

        let joined = match self.config.max_latency() {
            Some(limit) => tokio::select! {
                joined = &mut call => joined,
                _ = token.cancelled() => {
                    call_token.cancel();
                    return PredictionOutcome::Cancelled;
                }
                _ = tokio::time::sleep(limit) => {
                    call_token.cancel();
                    warn!(limit_ms = limit.as_millis() as u64, "inference exceeded latency limit");
                    return PredictionOutcome::Failed(InferenceError::Timeout(limit.as_millis() as u64));
                }
            },
            None => tokio::select! {
                joined = &mut call => joined,
                _ = token.cancelled() => {
                    call_token.cancel();
                    return PredictionOutcome::Cancelled;
                }
            },
        };

        let raw = match joined {
            Ok(Ok(raw)) => raw,
            Ok(Err(EngineError::Cancelled)) => return PredictionOutcome::Cancelled,
            Ok(Err(EngineError::Failed(e))) => {
                warn!(error = %e, "inference failed");
                return PredictionOutcome::Failed(e);
            }
            Err(e) => {
                warn!(error = %e, "inference task aborted");
                return PredictionOutcome::Failed(InferenceError::Aborted(e.to_string()));
            }
        };
        if token.is_cancelled() {
            return PredictionOutcome::Cancelled;
        }
        let candidates = match raw.into_candidates() {
            Ok(candidates) => candidates,
            Err(e) => return PredictionOutcome::Failed(e),
        };

        let shape = GestureShape::of(path, &frame);
        let ranked = self.ranker.rank(&candidates, &shape);
        if token.is_cancelled() {
            return PredictionOutcome::Cancelled;
        }
        if !ranked.is_empty() {
            self.cache.put(path, &frame, ranked.clone());
        }
        PredictionOutcome::Completed(ranked)
    }

    fn cancel_all(&self) {
        let queue = lock(&self.queue);
        for pending in queue.iter() {
            pending.cancel();
        }
        if let Some(active) = lock(&self.in_flight).as_ref() {
            active.cancel();
        }
    }
}

async fn run_worker(shared: Arc<Shared>) {
    debug!("prediction worker started");
    loop {
        if shared.shutdown.is_cancelled() {
            break;
        }
        match shared.next_request() {
            Some(pending) => shared.process(pending).await,
            None => {
                tokio::select! {
                    _ = shared.wakeup.notified() => {}
                    _ = shared.shutdown.cancelled() => break,
                }
            }
        }
    }
    debug!("prediction worker stopped");
}

/// Front door of the prediction pipeline.
///
/// Must be created inside a tokio runtime: construction spawns the single
/// consumer task that drains the request queue.
pub struct PredictionOrchestrator {
    shared: Arc<Shared>,
    next_id: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PredictionOrchestrator {
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        key_model: Arc<KeyProbabilityModel>,
        ranker: Arc<VocabularyRanker>,
        cache: GestureFingerprintCache,
        config: OrchestratorConfig,
    ) -> Self {
        let shared = Arc::new(Shared {
            config,
            engine,
            key_model,
            ranker,
            cache,
            stats: StatsRecorder::default(),
            queue: Mutex::new(VecDeque::new()),
            in_flight: Mutex::new(None),
            wakeup: Notify::new(),
            inference_gate: Arc::new(tokio::sync::Mutex::new(())),
            direct_epoch: Mutex::new(CancelToken::new()),
            shutdown: CancelToken::new(),
        });
        let worker = tokio::spawn(run_worker(Arc::clone(&shared)));
        info!(
            queue_capacity = shared.config.queue_capacity,
            debounce_ms = shared.config.debounce_ms,
            "prediction orchestrator ready"
        );
        Self {
            shared,
            next_id: AtomicU64::new(1),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queues a gesture, cancelling everything that has not delivered yet.
    pub fn submit(&self, path: GesturePath) -> PredictionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let pending = Arc::new(Pending {
            id,
            path: Arc::new(path),
            token: CancelToken::new(),
            slot: Mutex::new(Slot {
                status: RequestStatus::Queued,
                reply: Some(tx),
            }),
        });
        let handle = PredictionHandle {
            pending: Arc::clone(&pending),
            reply: rx,
        };
        if self.shared.shutdown.is_cancelled() {
            pending.cancel();
            return handle;
        }

        {
            let mut queue = lock(&self.shared.queue);
            for older in queue.iter() {
                older.cancel();
            }
            if let Some(active) = lock(&self.shared.in_flight).as_ref() {
                active.cancel();
            }
            let capacity = self.shared.config.queue_capacity.max(1);
            while queue.len() >= capacity {
                if let Some(oldest) = queue.pop_front() {
                    oldest.cancel();
                }
            }
            queue.push_back(pending);
        }
        self.shared.wakeup.notify_one();
        debug!(id, "gesture submitted");
        handle
    }

    /// Runs the full pipeline in the caller's task. Only [`Self::cancel_pending`]
    /// (or shutdown) cancels it; later submissions do not.
    pub async fn predict_now(&self, path: GesturePath) -> PredictionOutcome {
        self.shared.run_direct(Arc::new(path)).await
    }

    /// Debounced predictions for a stream of growing gestures.
    ///
    /// Bursts are collapsed to their last gesture after a quiet period; a
    /// gesture with the same sample count and length as the previous one is
    /// skipped. Failures yield an empty list, cancellations yield nothing.
    pub fn prediction_stream<S>(&self, events: S) -> ReceiverStream<Vec<RankedPrediction>>
    where
        S: Stream<Item = GesturePath> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.shared.config.queue_capacity.max(1));
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let debounce = shared.config.debounce();
            let mut events = Box::pin(events);
            let mut pending: Option<GesturePath> = None;
            let mut last_seen: Option<(usize, u32)> = None;
            loop {
                // Some(event) when input arrived, None when the quiet period elapsed
                let next = match pending {
                    Some(_) => tokio::select! {
                        event = events.next() => Some(event),
                        _ = tokio::time::sleep(debounce) => None,
                    },
                    None => Some(events.next().await),
                };
                let finished = match next {
                    Some(Some(path)) => {
                        pending = Some(path);
                        continue;
                    }
                    Some(None) => true,
                    None => false,
                };
                let ready = pending.take();
                if let Some(path) = ready {
                    let frame = shared.key_model.keyboard_frame();
                    let key = (path.len(), path.pixel_length(&frame).to_bits());
                    if last_seen != Some(key) {
                        last_seen = Some(key);
                        let emitted = match shared.run_direct(Arc::new(path)).await {
                            PredictionOutcome::Completed(predictions) => Some(predictions),
                            PredictionOutcome::Failed(e) => {
                                warn!(error = %e, "streamed prediction failed");
                                Some(Vec::new())
                            }
                            PredictionOutcome::Cancelled => None,
                        };
                        if let Some(predictions) = emitted {
                            if tx.send(predictions).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                if finished {
                    break;
                }
            }
        });
        ReceiverStream::new(rx)
    }

    /// Cancels queued and in-flight work, including direct calls.
    pub fn cancel_pending(&self) {
        self.shared.cancel_all();
        let mut epoch = lock(&self.shared.direct_epoch);
        epoch.cancel();
        *epoch = CancelToken::new();
    }

    pub fn set_key_bounds(&self, key_bounds: &HashMap<char, KeyBounds>, width: f32, height: f32) {
        self.shared.key_model.update_layout(key_bounds, width, height);
        // fingerprints are in pixels of the old layout
        self.shared.cache.clear();
    }

    pub fn stats(&self) -> PredictionStats {
        self.shared.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.shared.stats.reset();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.shared.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.shared.cache.clear();
    }

    pub fn key_model(&self) -> &Arc<KeyProbabilityModel> {
        &self.shared.key_model
    }

    pub fn ranker(&self) -> &Arc<VocabularyRanker> {
        &self.shared.ranker
    }

    /// Cancels everything and stops the worker; later submissions resolve as cancelled.
    pub fn shutdown(&self) {
        self.shared.shutdown.cancel();
        self.cancel_pending();
        if let Some(worker) = lock(&self.worker).take() {
            worker.abort();
        }
    }
}

impl Drop for PredictionOrchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
