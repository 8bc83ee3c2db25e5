//! Studio orchestrator
//!
//! Wires the capture session, model loader, detection loop, recording
//! pipeline and session registry together and exposes them as one unit.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::domain::capture::{CameraStatus, CaptureConstraints};
use crate::domain::config::AppConfig;
use crate::domain::detection::DetectionSet;
use crate::domain::model::ModelStatus;
use crate::domain::recording::{download_file_name, ArtifactId, VideoArtifact, VideoMimeType};

use super::capture_session::CaptureSession;
use super::detection_loop::{DetectionLoop, DetectionStats};
use super::events::{EventBus, FailureKind, StudioEvent};
use super::model_loader::ModelLoader;
use super::ports::{
    ArtifactSink, BlobStore, CaptureDevice, DownloadError, EncoderFactory, FaceDetector,
    ModelSource,
};
use super::recording::{RecordingError, RecordingOptions, RecordingPipeline, RecordingStatus};
use super::session_registry::SessionRegistry;

/// Adapters the studio runs against
pub struct StudioPorts {
    pub camera: Arc<dyn CaptureDevice>,
    pub detector: Arc<dyn FaceDetector>,
    pub primary_models: Arc<dyn ModelSource>,
    pub fallback_models: Arc<dyn ModelSource>,
    pub encoders: Arc<dyn EncoderFactory>,
    pub blobs: Arc<dyn BlobStore>,
}

/// Studio tunables
#[derive(Debug, Clone)]
pub struct StudioConfig {
    pub constraints: CaptureConstraints,
    pub detection_interval: Duration,
    pub recording: RecordingOptions,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self::from(&AppConfig::defaults())
    }
}

impl From<&AppConfig> for StudioConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            constraints: config.constraints(),
            detection_interval: config.detection_interval(),
            recording: RecordingOptions {
                candidates: VideoMimeType::default_candidates(),
                timeslice: config.chunk_interval(),
                stop_grace: config.stop_grace(),
                video_bits_per_second: config.video_bitrate_or_default(),
            },
        }
    }
}

/// Outcome of [`Studio::initialize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitReport {
    pub camera_ready: bool,
    pub models_ready: bool,
    pub detecting: bool,
}

/// Everything an observer needs to draw the studio
#[derive(Debug, Clone)]
pub struct StudioSnapshot {
    pub camera: CameraStatus,
    pub model: ModelStatus,
    pub detections: DetectionSet,
    pub recording: RecordingStatus,
    pub artifacts: Vec<VideoArtifact>,
}

pub struct Studio {
    config: StudioConfig,
    events: EventBus,
    capture: Arc<CaptureSession>,
    models: ModelLoader,
    detection: DetectionLoop,
    recording: RecordingPipeline,
    registry: Arc<SessionRegistry>,
}

impl Studio {
    pub fn new(ports: StudioPorts, config: StudioConfig) -> Self {
        let events = EventBus::new();
        let capture = Arc::new(CaptureSession::new(ports.camera, events.clone()));
        let models = ModelLoader::new(ports.primary_models, ports.fallback_models, events.clone());
        let detection = DetectionLoop::new(
            ports.detector,
            Arc::clone(&capture),
            config.detection_interval,
            events.clone(),
        );
        let registry = Arc::new(SessionRegistry::new(Arc::clone(&ports.blobs)));
        let recording = RecordingPipeline::new(
            Arc::clone(&capture),
            ports.encoders,
            Arc::clone(&registry),
            ports.blobs,
            config.recording.clone(),
            events.clone(),
        );

        Self {
            config,
            events,
            capture,
            models,
            detection,
            recording,
            registry,
        }
    }

    /// Load the models and open the camera concurrently. Detection starts
    /// only if both succeed; either failure is terminal for this studio.
    pub async fn initialize(&self) -> InitReport {
        let (models, camera) = tokio::join!(
            self.models.load(),
            self.capture.acquire(&self.config.constraints)
        );

        let detecting = match (&models, &camera) {
            (Ok(bundle), Ok(_)) => {
                self.detection.start(Arc::clone(bundle));
                true
            }
            _ => {
                warn!("Face detection disabled for this session");
                false
            }
        };

        let report = InitReport {
            camera_ready: camera.is_ok(),
            models_ready: models.is_ok(),
            detecting,
        };
        info!(?report, "Studio initialized");
        report
    }

    pub async fn start_recording(&self) -> Result<VideoMimeType, RecordingError> {
        self.recording.start().await
    }

    /// Recording formats available on this machine, best first
    pub async fn supported_formats(&self) -> Vec<VideoMimeType> {
        self.recording.supported_formats().await
    }

    /// Returns false when nothing was recording
    pub async fn stop_recording(&self) -> bool {
        self.recording.stop().await
    }

    /// Wait for an in-progress stop to finish finalizing
    pub async fn wait_recording_idle(&self) {
        self.recording.wait_idle().await
    }

    /// Hand a recording to the sink under a timestamped file name
    pub async fn download(
        &self,
        id: ArtifactId,
        sink: &dyn ArtifactSink,
    ) -> Result<PathBuf, DownloadError> {
        let result = self.try_download(id, sink).await;
        match &result {
            Ok(path) => info!(id = %id, path = %path.display(), "Recording downloaded"),
            Err(e) => {
                warn!(id = %id, error = %e, "Download failed");
                self.events.failure(FailureKind::Download, e.to_string());
            }
        }
        result
    }

    async fn try_download(
        &self,
        id: ArtifactId,
        sink: &dyn ArtifactSink,
    ) -> Result<PathBuf, DownloadError> {
        let artifact = self.registry.get(id).ok_or(DownloadError::NotFound(id))?;
        let bytes = self.registry.payload(&artifact)?;
        let file_name = download_file_name(artifact.file_extension(), Utc::now());
        sink.save(&file_name, &bytes).await
    }

    /// Delete a recording. Unknown ids are ignored.
    pub fn delete(&self, id: ArtifactId) -> bool {
        let removed = self.registry.remove(id).is_some();
        if removed {
            self.events.publish(StudioEvent::ArtifactDeleted(id));
        }
        removed
    }

    pub fn snapshot(&self) -> StudioSnapshot {
        StudioSnapshot {
            camera: self.capture.status(),
            model: self.models.status(),
            detections: self.detection.current(),
            recording: self.recording.status(),
            artifacts: self.registry.list(),
        }
    }

    pub fn artifacts(&self) -> Vec<VideoArtifact> {
        self.registry.list()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.events.subscribe()
    }

    pub fn detections(&self) -> watch::Receiver<DetectionSet> {
        self.detection.subscribe()
    }

    pub fn recording_status(&self) -> watch::Receiver<RecordingStatus> {
        self.recording.subscribe()
    }

    pub fn detection_stats(&self) -> DetectionStats {
        self.detection.stats()
    }

    pub fn is_detecting(&self) -> bool {
        self.detection.is_running()
    }

    /// Stop both loops, discard any in-progress recording and release the
    /// camera. Finished recordings stay available.
    pub async fn shutdown(&self) {
        self.detection.stop();
        self.recording.shutdown().await;
        self.capture.release();
        info!("Studio shut down");
    }
}
