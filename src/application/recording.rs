//! Recording pipeline use case

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{Local, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, error, info, warn};

use crate::domain::config::{
    DEFAULT_CHUNK_INTERVAL_MS, DEFAULT_STOP_GRACE_MS, DEFAULT_VIDEO_BITRATE,
};
use crate::domain::error::EmptyRecording;
use crate::domain::recording::{
    ArtifactIdGenerator, RecordingSession, RecordingState, VideoArtifact, VideoMimeType,
};

use super::capture_session::CaptureSession;
use super::events::{EventBus, FailureKind, StudioEvent};
use super::ports::{BlobStore, EncoderEvent, EncoderFactory, EncoderOptions, MediaEncoder};
use super::session_registry::SessionRegistry;

const ELAPSED_TICK: Duration = Duration::from_secs(1);

/// Recording pipeline errors
#[derive(Debug, Clone, Error)]
pub enum RecordingError {
    #[error("Cannot start recording: {0}")]
    NotReady(String),

    #[error("No supported video format (tried {0})")]
    NoSupportedFormat(String),

    #[error("Recording failed: {0}")]
    Encoder(String),

    #[error(transparent)]
    Empty(#[from] EmptyRecording),
}

impl RecordingError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::NotReady(_) => FailureKind::RecordingNotReady,
            Self::NoSupportedFormat(_) => FailureKind::NoSupportedFormat,
            Self::Encoder(_) => FailureKind::Recording,
            Self::Empty(_) => FailureKind::EmptyRecording,
        }
    }
}

/// Recording tunables
#[derive(Debug, Clone)]
pub struct RecordingOptions {
    /// Encodings to try, most preferred first
    pub candidates: Vec<VideoMimeType>,
    pub timeslice: Duration,
    /// Delay between stop() and asking the encoder to finalize
    pub stop_grace: Duration,
    pub video_bits_per_second: u64,
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            candidates: VideoMimeType::default_candidates(),
            timeslice: Duration::from_millis(DEFAULT_CHUNK_INTERVAL_MS),
            stop_grace: Duration::from_millis(DEFAULT_STOP_GRACE_MS),
            video_bits_per_second: DEFAULT_VIDEO_BITRATE,
        }
    }
}

/// What observers see of the pipeline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordingStatus {
    pub state: RecordingState,
    pub elapsed_seconds: u64,
    pub mime_type: Option<VideoMimeType>,
}

impl RecordingStatus {
    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }
}

#[derive(Default)]
struct Tasks {
    ticker: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
    finalizer: Option<JoinHandle<()>>,
}

impl Tasks {
    fn abort_all(&mut self) {
        for task in [self.ticker.take(), self.pump.take(), self.finalizer.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }
}

/// State shared with the pipeline's background tasks
struct Shared {
    session: Mutex<RecordingSession>,
    encoder: Mutex<Option<(u64, Arc<dyn MediaEncoder>)>>,
    tasks: Mutex<Tasks>,
    status: watch::Sender<RecordingStatus>,
    registry: Arc<SessionRegistry>,
    blobs: Arc<dyn BlobStore>,
    ids: ArtifactIdGenerator,
    events: EventBus,
}

/// Turns the live camera stream into finished recordings.
///
/// State machine: idle -> recording -> finalizing -> idle. Lifecycle calls
/// are serialized; encoder events for a superseded session are dropped.
pub struct RecordingPipeline {
    shared: Arc<Shared>,
    capture: Arc<CaptureSession>,
    factory: Arc<dyn EncoderFactory>,
    options: RecordingOptions,
    lifecycle: tokio::sync::Mutex<()>,
}

impl RecordingPipeline {
    pub fn new(
        capture: Arc<CaptureSession>,
        factory: Arc<dyn EncoderFactory>,
        registry: Arc<SessionRegistry>,
        blobs: Arc<dyn BlobStore>,
        options: RecordingOptions,
        events: EventBus,
    ) -> Self {
        let (status, _) = watch::channel(RecordingStatus::default());
        Self {
            shared: Arc::new(Shared {
                session: Mutex::new(RecordingSession::new()),
                encoder: Mutex::new(None),
                tasks: Mutex::new(Tasks::default()),
                status,
                registry,
                blobs,
                ids: ArtifactIdGenerator::new(),
                events,
            }),
            capture,
            factory,
            options,
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub fn status(&self) -> RecordingStatus {
        self.shared.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RecordingStatus> {
        self.shared.status.subscribe()
    }

    pub fn is_recording(&self) -> bool {
        self.status().is_recording()
    }

    /// Start recording the live stream. Returns the negotiated encoding.
    pub async fn start(&self) -> Result<VideoMimeType, RecordingError> {
        let result = self.try_start().await;
        if let Err(e) = &result {
            warn!(error = %e, "Recording did not start");
            self.shared.events.failure(e.kind(), e.to_string());
        }
        result
    }

    async fn try_start(&self) -> Result<VideoMimeType, RecordingError> {
        let _lifecycle = self.lifecycle.lock().await;

        let state = self.shared.session().state();
        if state != RecordingState::Idle {
            return Err(RecordingError::NotReady(format!("recording is {}", state)));
        }
        let stream = self
            .capture
            .ready_stream()
            .ok_or_else(|| RecordingError::NotReady("camera is not ready".to_string()))?;

        let mime_type = self.negotiate().await?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let encoder = self
            .factory
            .create(
                stream,
                EncoderOptions {
                    mime_type: mime_type.clone(),
                    video_bits_per_second: self.options.video_bits_per_second,
                },
                sender,
            )
            .map_err(|e| RecordingError::Encoder(e.to_string()))?;

        let begun = self.shared.session().begin(mime_type.clone(), Local::now());
        let generation = begun.map_err(|e| RecordingError::NotReady(e.to_string()))?;
        *self.shared.encoder_slot() = Some((generation, Arc::clone(&encoder)));
        self.shared.publish_status();

        {
            let mut tasks = self.shared.tasks();
            tasks.pump = Some(tokio::spawn(pump(
                Arc::clone(&self.shared),
                generation,
                receiver,
            )));
            tasks.ticker = Some(tokio::spawn(tick(Arc::clone(&self.shared), generation)));
        }

        if let Err(e) = encoder.start(self.options.timeslice).await {
            self.shared.discard(generation);
            return Err(RecordingError::Encoder(e.to_string()));
        }

        info!(mime_type = %mime_type, "Recording started");
        self.shared.events.publish(StudioEvent::RecordingStarted {
            mime_type: mime_type.clone(),
        });
        Ok(mime_type)
    }

    /// Stop recording. Returns false, doing nothing, when not recording.
    ///
    /// The state flips to finalizing at once; the encoder is asked to finish
    /// after the grace period so a last in-flight chunk can still land.
    pub async fn stop(&self) -> bool {
        let _lifecycle = self.lifecycle.lock().await;

        let transition = self.shared.session().begin_finalizing();
        let Ok((generation, elapsed_seconds)) = transition else {
            debug!("Stop ignored, not recording");
            return false;
        };
        if let Some(ticker) = self.shared.tasks().ticker.take() {
            ticker.abort();
        }
        self.shared.publish_status();
        info!(elapsed_seconds, "Recording stopped, finalizing");
        self.shared
            .events
            .publish(StudioEvent::RecordingStopped { elapsed_seconds });

        let shared = Arc::clone(&self.shared);
        let grace = self.options.stop_grace;
        self.shared.tasks().finalizer = Some(tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let Some(encoder) = shared.encoder_for(generation) else {
                return;
            };
            if let Err(e) = encoder.request_stop().await {
                shared.abort(generation, &e.to_string());
            }
        }));
        true
    }

    /// Wait until the pipeline is back in idle
    pub async fn wait_idle(&self) {
        let mut status = self.subscribe();
        let _ = status
            .wait_for(|s| s.state == RecordingState::Idle)
            .await;
    }

    /// Drop any in-progress recording without producing an artifact and
    /// stop its encoder.
    pub async fn shutdown(&self) {
        let _lifecycle = self.lifecycle.lock().await;

        let generation = self.shared.session().generation();
        let encoder = self.shared.encoder_for(generation);
        if self.shared.discard(generation) {
            info!("In-progress recording discarded");
        }
        self.shared.tasks().abort_all();
        if let Some(encoder) = encoder {
            if let Err(e) = encoder.request_stop().await {
                warn!(error = %e, "Encoder did not stop cleanly");
            }
        }
    }

    /// Candidates the encoder factory can produce, in preference order
    pub async fn supported_formats(&self) -> Vec<VideoMimeType> {
        let mut supported = Vec::new();
        for candidate in &self.options.candidates {
            if self.factory.is_type_supported(candidate).await {
                supported.push(candidate.clone());
            }
        }
        supported
    }

    async fn negotiate(&self) -> Result<VideoMimeType, RecordingError> {
        for candidate in &self.options.candidates {
            if self.factory.is_type_supported(candidate).await {
                return Ok(candidate.clone());
            }
            debug!(mime_type = %candidate, "Encoding not supported");
        }
        let tried: Vec<String> = self.options.candidates.iter().map(|c| c.to_string()).collect();
        Err(RecordingError::NoSupportedFormat(tried.join(", ")))
    }
}

impl Shared {
    fn session(&self) -> MutexGuard<'_, RecordingSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn encoder_slot(&self) -> MutexGuard<'_, Option<(u64, Arc<dyn MediaEncoder>)>> {
        self.encoder.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tasks(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn encoder_for(&self, generation: u64) -> Option<Arc<dyn MediaEncoder>> {
        self.encoder_slot()
            .as_ref()
            .filter(|(g, _)| *g == generation)
            .map(|(_, encoder)| Arc::clone(encoder))
    }

    fn release_encoder(&self, generation: u64) {
        let mut slot = self.encoder_slot();
        if slot.as_ref().is_some_and(|(g, _)| *g == generation) {
            *slot = None;
        }
    }

    fn publish_status(&self) {
        let status = {
            let session = self.session();
            RecordingStatus {
                state: session.state(),
                elapsed_seconds: session.elapsed_seconds(),
                mime_type: session.mime_type().cloned(),
            }
        };
        self.status.send_replace(status);
    }

    /// Return to idle without an artifact. False when the generation is stale.
    fn discard(&self, generation: u64) -> bool {
        if !self.session().abort(generation) {
            return false;
        }
        if let Some(ticker) = self.tasks().ticker.take() {
            ticker.abort();
        }
        self.release_encoder(generation);
        self.publish_status();
        true
    }

    fn abort(&self, generation: u64, message: &str) {
        if !self.discard(generation) {
            return;
        }
        error!(error = message, "Recording aborted");
        self.events.failure(FailureKind::Recording, message);
    }

    fn finalize(&self, generation: u64) {
        let finished = {
            let mut session = self.session();
            if session.is_recording() {
                // encoder ended on its own
                let _ = session.begin_finalizing();
            }
            session.finish(generation)
        };
        let Some(finished) = finished else {
            return;
        };
        if let Some(ticker) = self.tasks().ticker.take() {
            ticker.abort();
        }
        self.release_encoder(generation);

        match finished {
            Ok(recording) => {
                let elapsed_seconds = recording.elapsed_seconds;
                let mime_type = recording.mime_type.clone();
                let payload = recording.into_payload();
                let size_bytes = payload.len();

                let blob_url = self.blobs.create(payload, &mime_type);
                let id = self.ids.next(now_millis());
                let artifact = VideoArtifact::new(
                    id,
                    blob_url,
                    Local::now(),
                    size_bytes,
                    elapsed_seconds,
                    mime_type,
                );
                self.registry.append(artifact.clone());
                info!(
                    id = %id,
                    size = %artifact.human_readable_size(),
                    duration = elapsed_seconds,
                    "Recording saved"
                );
                self.publish_status();
                self.events.publish(StudioEvent::ArtifactCreated(artifact));
            }
            Err(empty) => {
                warn!("Recording produced no data");
                self.publish_status();
                self.events.failure(FailureKind::EmptyRecording, empty.to_string());
            }
        }
    }
}

/// Route encoder events into the session for one generation
async fn pump(
    shared: Arc<Shared>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<EncoderEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            EncoderEvent::Started => debug!(generation, "Encoder started"),
            EncoderEvent::Chunk(bytes) => {
                let len = bytes.len();
                if shared.session().push_chunk(generation, bytes) {
                    debug!(generation, bytes = len, "Chunk received");
                }
            }
            EncoderEvent::Error(message) => {
                shared.abort(generation, &message);
                return;
            }
            EncoderEvent::Stopped => {
                shared.finalize(generation);
                return;
            }
        }
    }
    shared.abort(generation, "encoder closed without finishing the recording");
}

/// One-second elapsed counter while recording
async fn tick(shared: Arc<Shared>, generation: u64) {
    let mut ticker = interval_at(Instant::now() + ELAPSED_TICK, ELAPSED_TICK);
    loop {
        ticker.tick().await;
        let ticked = shared.session().tick(generation);
        if ticked.is_none() {
            return;
        }
        shared.publish_status();
    }
}

fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{FakeCamera, FakeEncoderFactory};
    use crate::domain::capture::CaptureConstraints;
    use crate::infrastructure::blob::MemoryBlobStore;

    struct Rig {
        pipeline: RecordingPipeline,
        factory: Arc<FakeEncoderFactory>,
        registry: Arc<SessionRegistry>,
        events: EventBus,
    }

    async fn rig_with(factory: Arc<FakeEncoderFactory>, camera_ready: bool) -> Rig {
        let events = EventBus::new();
        let capture = Arc::new(CaptureSession::new(FakeCamera::with_frames(), events.clone()));
        if camera_ready {
            capture.acquire(&CaptureConstraints::default()).await.unwrap();
        }
        let blobs = Arc::new(MemoryBlobStore::new());
        let registry = Arc::new(SessionRegistry::new(blobs.clone()));
        let pipeline = RecordingPipeline::new(
            capture,
            factory.clone(),
            Arc::clone(&registry),
            blobs,
            RecordingOptions::default(),
            events.clone(),
        );
        Rig {
            pipeline,
            factory,
            registry,
            events,
        }
    }

    async fn rig() -> Rig {
        rig_with(FakeEncoderFactory::supporting(&["video/webm;codecs=vp9"]), true).await
    }

    #[tokio::test(start_paused = true)]
    async fn start_requires_ready_camera() {
        let rig = rig_with(FakeEncoderFactory::supporting(&["video/webm"]), false).await;
        let err = rig.pipeline.start().await.unwrap_err();
        assert!(matches!(err, RecordingError::NotReady(_)));
        assert_eq!(rig.pipeline.status().state, RecordingState::Idle);
        assert_eq!(rig.factory.created(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn negotiates_first_supported_candidate() {
        let rig = rig_with(
            FakeEncoderFactory::supporting(&["video/webm", "video/webm;codecs=vp8"]),
            true,
        )
        .await;
        let mime = rig.pipeline.start().await.unwrap();
        assert_eq!(mime.to_string(), "video/webm;codecs=vp8");

        let encoder = rig.factory.last();
        assert_eq!(encoder.options().mime_type, mime);
        assert_eq!(encoder.options().video_bits_per_second, 2_500_000);
        assert_eq!(encoder.starts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn supported_formats_keep_candidate_order() {
        let rig = rig_with(
            FakeEncoderFactory::supporting(&["video/mp4;codecs=h264,aac", "video/webm;codecs=vp8"]),
            false,
        )
        .await;
        let formats: Vec<String> = rig
            .pipeline
            .supported_formats()
            .await
            .iter()
            .map(|f| f.to_string())
            .collect();
        assert_eq!(formats, vec!["video/webm;codecs=vp8", "video/mp4;codecs=h264,aac"]);
        assert_eq!(rig.factory.created(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn no_supported_format_is_an_error() {
        let rig = rig_with(FakeEncoderFactory::supporting(&[]), true).await;
        let err = rig.pipeline.start().await.unwrap_err();
        assert!(matches!(err, RecordingError::NoSupportedFormat(_)));
        assert_eq!(err.kind(), FailureKind::NoSupportedFormat);
        assert!(!rig.pipeline.is_recording());
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_recording_is_rejected() {
        let rig = rig().await;
        rig.pipeline.start().await.unwrap();
        let err = rig.pipeline.start().await.unwrap_err();
        assert!(matches!(err, RecordingError::NotReady(_)));
        assert_eq!(rig.factory.created(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_when_idle_is_silent() {
        let rig = rig().await;
        assert!(!rig.pipeline.stop().await);
        assert_eq!(rig.pipeline.status(), RecordingStatus::default());
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_counts_whole_seconds_and_freezes_on_stop() {
        let rig = rig().await;
        rig.pipeline.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(rig.pipeline.status().elapsed_seconds, 3);

        rig.factory.last().emit_chunk(b"data");
        assert!(rig.pipeline.stop().await);
        assert_eq!(rig.pipeline.status().state, RecordingState::Finalizing);
        assert!(!rig.pipeline.is_recording());

        tokio::time::sleep(Duration::from_secs(2)).await;
        let artifacts = rig.registry.list();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].duration_seconds(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn chunks_concatenate_in_arrival_order() {
        let rig = rig().await;
        let mut events = rig.events.subscribe();
        rig.pipeline.start().await.unwrap();

        let encoder = rig.factory.last();
        encoder.emit_chunk(b"one-");
        encoder.emit(EncoderEvent::Chunk(Vec::new()));
        encoder.emit_chunk(b"two-");
        encoder.set_tail(b"tail");
        tokio::task::yield_now().await;

        rig.pipeline.stop().await;
        rig.pipeline.wait_idle().await;

        let artifacts = rig.registry.list();
        assert_eq!(artifacts.len(), 1);
        let artifact = &artifacts[0];
        assert_eq!(artifact.size_bytes(), 12);
        assert_eq!(artifact.file_extension(), "webm");
        assert_eq!(&*rig.registry.payload(artifact).unwrap(), b"one-two-tail");
        assert_eq!(encoder.stop_requests(), 1);

        let mut created = false;
        while let Ok(event) = events.try_recv() {
            created |= matches!(event, StudioEvent::ArtifactCreated(_));
        }
        assert!(created);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_waits_for_grace_period() {
        let rig = rig().await;
        rig.pipeline.start().await.unwrap();
        let encoder = rig.factory.last();
        encoder.emit_chunk(b"x");

        rig.pipeline.stop().await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(encoder.stop_requests(), 0);
        // late chunk still lands during the grace period
        encoder.emit_chunk(b"y");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(encoder.stop_requests(), 1);
        rig.pipeline.wait_idle().await;
        let artifact = &rig.registry.list()[0];
        assert_eq!(&*rig.registry.payload(artifact).unwrap(), b"xy");
    }

    #[tokio::test(start_paused = true)]
    async fn zero_chunks_yield_no_artifact() {
        let rig = rig().await;
        let mut events = rig.events.subscribe();
        rig.pipeline.start().await.unwrap();
        rig.pipeline.stop().await;
        rig.pipeline.wait_idle().await;

        assert!(rig.registry.is_empty());
        let mut empty = false;
        while let Ok(event) = events.try_recv() {
            empty |= matches!(
                event,
                StudioEvent::Failure {
                    kind: FailureKind::EmptyRecording,
                    ..
                }
            );
        }
        assert!(empty);
    }

    #[tokio::test(start_paused = true)]
    async fn encoder_error_aborts_to_idle() {
        let rig = rig().await;
        rig.pipeline.start().await.unwrap();
        let encoder = rig.factory.last();
        encoder.emit_chunk(b"partial");
        encoder.emit(EncoderEvent::Error("disk full".to_string()));
        rig.pipeline.wait_idle().await;

        assert!(rig.registry.is_empty());
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(rig.pipeline.status().elapsed_seconds, 0);

        // a fresh recording works afterwards
        rig.pipeline.start().await.unwrap();
        assert_eq!(rig.factory.created(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_encoder_events_are_ignored() {
        let rig = rig().await;
        rig.pipeline.start().await.unwrap();
        let first = rig.factory.last();
        first.emit(EncoderEvent::Error("boom".to_string()));
        rig.pipeline.wait_idle().await;

        rig.pipeline.start().await.unwrap();
        let second = rig.factory.last();
        first.emit_chunk(b"stale");
        second.emit_chunk(b"fresh");
        tokio::task::yield_now().await;

        rig.pipeline.stop().await;
        rig.pipeline.wait_idle().await;
        let artifact = &rig.registry.list()[0];
        assert_eq!(&*rig.registry.payload(artifact).unwrap(), b"fresh");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_discards_recording() {
        let rig = rig().await;
        rig.pipeline.start().await.unwrap();
        let encoder = rig.factory.last();
        encoder.emit_chunk(b"data");
        tokio::task::yield_now().await;

        rig.pipeline.shutdown().await;
        assert_eq!(rig.pipeline.status().state, RecordingState::Idle);
        assert_eq!(encoder.stop_requests(), 1);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rig.registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn artifact_ids_are_unique() {
        let rig = rig().await;
        for _ in 0..3 {
            rig.pipeline.start().await.unwrap();
            rig.factory.last().emit_chunk(b"c");
            tokio::task::yield_now().await;
            rig.pipeline.stop().await;
            rig.pipeline.wait_idle().await;
        }
        let mut ids: Vec<u64> = rig.registry.list().iter().map(|a| a.id().value()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }
}
