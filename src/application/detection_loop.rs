//! Periodic face detection use case

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::config::DEFAULT_DETECTION_INTERVAL_MS;
use crate::domain::detection::DetectionSet;
use crate::domain::model::ModelBundle;

use super::capture_session::CaptureSession;
use super::events::{EventBus, FailureKind, StudioEvent};
use super::ports::{DetectionError, FaceDetector};

/// Default detection cadence
pub const DEFAULT_DETECTION_INTERVAL: Duration =
    Duration::from_millis(DEFAULT_DETECTION_INTERVAL_MS);

/// A single cycle failed. The loop keeps running and the previous set stays.
#[derive(Debug, Clone, Error)]
pub enum DetectionCycleError {
    #[error("No video frame available yet")]
    NoFrame,

    #[error("Face detection failed: {0}")]
    Detector(#[from] DetectionError),
}

/// Loop counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionStats {
    pub completed: u64,
    pub skipped: u64,
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    completed: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

/// State shared between the loop handle and its tasks
struct Shared {
    detector: Arc<dyn FaceDetector>,
    capture: Arc<CaptureSession>,
    published: watch::Sender<DetectionSet>,
    counters: Counters,
    // Held while publishing and while stopping, so nothing lands after stop()
    publish_gate: Mutex<()>,
    // Outlives a stop, so a restart waits for the aborted call to unwind
    in_flight: Mutex<Option<JoinHandle<()>>>,
    events: EventBus,
}

struct Running {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Runs the detector against the latest camera frame on a fixed cadence.
///
/// At most one detector call is ever in flight. A tick that fires while the
/// previous call is still pending is skipped, not queued.
pub struct DetectionLoop {
    shared: Arc<Shared>,
    period: Duration,
    running: Mutex<Option<Running>>,
}

impl DetectionLoop {
    pub fn new(
        detector: Arc<dyn FaceDetector>,
        capture: Arc<CaptureSession>,
        period: Duration,
        events: EventBus,
    ) -> Self {
        let (published, _) = watch::channel(DetectionSet::empty());
        Self {
            shared: Arc::new(Shared {
                detector,
                capture,
                published,
                counters: Counters::default(),
                publish_gate: Mutex::new(()),
                in_flight: Mutex::new(None),
                events,
            }),
            period,
            running: Mutex::new(None),
        }
    }

    /// Latest published set
    pub fn current(&self) -> DetectionSet {
        self.shared.published.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DetectionSet> {
        self.shared.published.subscribe()
    }

    pub fn stats(&self) -> DetectionStats {
        let counters = &self.shared.counters;
        DetectionStats {
            completed: counters.completed.load(Ordering::Relaxed),
            skipped: counters.skipped.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running().is_some()
    }

    /// Begin cycling. Returns false when already running.
    pub fn start(&self, models: Arc<ModelBundle>) -> bool {
        let mut running = self.running();
        if running.is_some() {
            debug!("Detection loop already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(
            Arc::clone(&self.shared),
            models,
            self.period,
            cancel.clone(),
        ));
        *running = Some(Running { cancel, task });

        info!(interval_ms = self.period.as_millis() as u64, "Detection loop started");
        self.shared.events.publish(StudioEvent::DetectionStarted);
        true
    }

    /// Halt cycling and abandon the pending detector call. Nothing is
    /// published or reported after this returns. Safe to call when never
    /// started, and more than once.
    pub fn stop(&self) -> bool {
        let Some(running) = self.running().take() else {
            return false;
        };
        {
            let _gate = self.shared.gate();
            running.cancel.cancel();
        }
        running.task.abort();
        if let Some(cycle) = self.shared.in_flight().as_ref() {
            cycle.abort();
        }
        info!("Detection loop stopped");
        true
    }

    fn running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for DetectionLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Shared {
    fn gate(&self) -> MutexGuard<'_, ()> {
        self.publish_gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn in_flight(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run(
    shared: Arc<Shared>,
    models: Arc<ModelBundle>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut cycle: u64 = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let mut in_flight = shared.in_flight();
        if in_flight.as_ref().is_some_and(|task| !task.is_finished()) {
            let skipped = shared.counters.skipped.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(skipped, "Detector busy, skipping tick");
            continue;
        }

        cycle += 1;
        *in_flight = Some(tokio::spawn(run_cycle(
            Arc::clone(&shared),
            Arc::clone(&models),
            cycle,
            cancel.clone(),
        )));
    }

    if let Some(task) = shared.in_flight().as_ref() {
        task.abort();
    }
}

async fn run_cycle(
    shared: Arc<Shared>,
    models: Arc<ModelBundle>,
    cycle: u64,
    cancel: CancellationToken,
) {
    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        outcome = detect_once(&shared, &models) => outcome,
    };

    match outcome {
        Ok(set) => {
            let set = set.with_cycle(cycle);
            let faces = set.len();
            let _gate = shared.gate();
            if cancel.is_cancelled() {
                return;
            }
            shared.published.send_replace(set);
            shared.counters.completed.fetch_add(1, Ordering::Relaxed);
            debug!(cycle, faces, "Detection cycle complete");
        }
        Err(e) => {
            let _gate = shared.gate();
            if cancel.is_cancelled() {
                return;
            }
            shared.counters.failed.fetch_add(1, Ordering::Relaxed);
            warn!(cycle, error = %e, "Detection cycle failed");
            shared.events.failure(FailureKind::DetectionCycle, e.to_string());
        }
    }
}

async fn detect_once(
    shared: &Shared,
    models: &ModelBundle,
) -> Result<DetectionSet, DetectionCycleError> {
    let frame = shared
        .capture
        .latest_frame()
        .ok_or(DetectionCycleError::NoFrame)?;
    let faces = shared.detector.detect(models, &frame).await?;
    Ok(DetectionSet::from_detections(faces))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{
        complete_bundle, FakeCamera, FakeDetector, FakeStream,
    };
    use crate::domain::capture::CaptureConstraints;

    async fn ready_capture() -> Arc<CaptureSession> {
        let capture = Arc::new(CaptureSession::new(FakeCamera::with_frames(), EventBus::new()));
        capture.acquire(&CaptureConstraints::default()).await.unwrap();
        capture
    }

    fn detection_loop(
        detector: Arc<FakeDetector>,
        capture: Arc<CaptureSession>,
    ) -> DetectionLoop {
        DetectionLoop::new(detector, capture, DEFAULT_DETECTION_INTERVAL, EventBus::new())
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_sets_each_cycle() {
        let detector = FakeDetector::new(Duration::from_millis(10));
        detector.set_faces(2);
        let detection = detection_loop(detector.clone(), ready_capture().await);
        let mut sets = detection.subscribe();

        assert!(detection.start(complete_bundle()));
        sets.changed().await.unwrap();

        let set = detection.current();
        assert_eq!(set.len(), 2);
        assert_eq!(set.cycle(), 1);
        assert_eq!(set.faces()[0].id, 0);
        assert_eq!(set.faces()[1].id, 1);
        detection.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn slow_detector_never_overlaps() {
        let detector = FakeDetector::new(Duration::from_millis(250));
        let detection = detection_loop(detector.clone(), ready_capture().await);

        detection.start(complete_bundle());
        tokio::time::sleep(Duration::from_millis(1_050)).await;
        detection.stop();

        assert_eq!(detector.max_in_flight(), 1);
        let stats = detection.stats();
        assert!(stats.skipped > 0, "{:?}", stats);
        assert!(stats.completed >= 3, "{:?}", stats);
        assert!(detector.calls() <= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_cycle_keeps_previous_set() {
        let detector = FakeDetector::new(Duration::from_millis(10));
        let detection = detection_loop(detector.clone(), ready_capture().await);
        let mut sets = detection.subscribe();

        detection.start(complete_bundle());
        sets.changed().await.unwrap();
        let before = detection.current();

        detector.set_failing(true);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(detection.current(), before);
        assert!(detection.stats().failed > 0);
        assert!(detection.is_running());

        detector.set_failing(false);
        sets.changed().await.unwrap();
        assert!(detection.current().cycle() > before.cycle());
        detection.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn missing_frame_is_a_failed_cycle() {
        let capture = Arc::new(CaptureSession::new(
            FakeCamera::with_stream(FakeStream::silent()),
            EventBus::new(),
        ));
        let detector = FakeDetector::new(Duration::from_millis(10));
        let detection = detection_loop(detector.clone(), capture);

        detection.start(complete_bundle());
        tokio::time::sleep(Duration::from_millis(350)).await;
        detection.stop();

        assert_eq!(detector.calls(), 0);
        assert!(detection.stats().failed >= 3);
        assert!(detection.current().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_is_a_noop() {
        let detector = FakeDetector::new(Duration::from_millis(10));
        let detection = detection_loop(detector, ready_capture().await);

        assert!(detection.start(complete_bundle()));
        assert!(!detection.start(complete_bundle()));
        assert!(detection.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_safe_before_start() {
        let detector = FakeDetector::new(Duration::from_millis(10));
        let detection = detection_loop(detector, ready_capture().await);

        assert!(!detection.stop());
        detection.start(complete_bundle());
        assert!(detection.stop());
        assert!(!detection.stop());
        assert!(!detection.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_publishes_after_stop() {
        let detector = FakeDetector::new(Duration::from_millis(80));
        let detection = detection_loop(detector.clone(), ready_capture().await);

        detection.start(complete_bundle());
        // first call is in flight
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(detector.calls(), 1);
        detection.stop();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(detection.current().cycle(), 0);
        assert_eq!(detection.stats().completed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_waits_for_abandoned_call() {
        let detector = FakeDetector::new(Duration::from_millis(80));
        let detection = detection_loop(detector.clone(), ready_capture().await);
        let mut sets = detection.subscribe();

        detection.start(complete_bundle());
        tokio::time::sleep(Duration::from_millis(20)).await;
        detection.stop();
        detection.start(complete_bundle());
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(detector.max_in_flight(), 1);
        sets.changed().await.unwrap();
        assert_eq!(detection.stats().completed, 1);
        assert_eq!(detector.max_in_flight(), 1);
        detection.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn failing_call_is_silent_after_stop() {
        let events = EventBus::new();
        let mut received = events.subscribe();
        let detector = FakeDetector::new(Duration::from_millis(80));
        detector.set_failing(true);
        let detection = DetectionLoop::new(
            detector.clone(),
            ready_capture().await,
            DEFAULT_DETECTION_INTERVAL,
            events,
        );

        detection.start(complete_bundle());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(detector.calls(), 1);
        detection.stop();
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(detection.stats().failed, 0);
        while let Ok(event) = received.try_recv() {
            assert!(
                !matches!(event, StudioEvent::Failure { .. }),
                "unexpected {:?}",
                event
            );
        }
    }
}
