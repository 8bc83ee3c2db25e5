//! In-memory port doubles shared by the use case tests

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::domain::capture::{CaptureConstraints, Frame};
use crate::domain::detection::{BoundingBox, Point};
use crate::domain::model::{LoadedSubModel, ModelBundle, SubModel, WeightManifest, REQUIRED_SUB_MODELS};
use crate::domain::recording::VideoMimeType;

use super::ports::{
    CaptureDevice, CaptureError, DetectionError, EncoderError, EncoderEvent, EncoderFactory,
    EncoderOptions, FaceDetection, FaceDetector, MediaEncoder, MediaStream, ModelSource,
    ModelSourceError,
};

static NEXT_STREAM: AtomicU64 = AtomicU64::new(1);

pub fn tiny_frame(index: u64) -> Frame {
    Frame::new(vec![0u8; Frame::byte_len(2, 2)], 2, 2, index)
}

pub fn complete_bundle() -> Arc<ModelBundle> {
    let parts = REQUIRED_SUB_MODELS
        .iter()
        .map(|kind| LoadedSubModel {
            kind: *kind,
            manifest: WeightManifest::default(),
            weights: vec![0u8; 4],
        })
        .collect();
    Arc::new(ModelBundle::new("memory", parts))
}

pub struct FakeStream {
    id: String,
    constraints: CaptureConstraints,
    frames: watch::Sender<Option<Frame>>,
    live: AtomicBool,
}

impl FakeStream {
    /// A stream that already delivered its first frame
    pub fn with_frame() -> Arc<Self> {
        let stream = Self::silent();
        stream.push_frame(0);
        stream
    }

    /// A stream that never delivers a frame unless told to
    pub fn silent() -> Arc<Self> {
        let (frames, _) = watch::channel(None);
        Arc::new(Self {
            id: format!("fake-{}", NEXT_STREAM.fetch_add(1, Ordering::Relaxed)),
            constraints: CaptureConstraints::default(),
            frames,
            live: AtomicBool::new(true),
        })
    }

    pub fn push_frame(&self, index: u64) {
        self.frames.send_replace(Some(tiny_frame(index)));
    }
}

#[async_trait]
impl MediaStream for FakeStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn constraints(&self) -> &CaptureConstraints {
        &self.constraints
    }

    fn frames(&self) -> watch::Receiver<Option<Frame>> {
        self.frames.subscribe()
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn stop_tracks(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

enum CameraBehaviour {
    Frames,
    Stream(Arc<FakeStream>),
    Fail(CaptureError),
}

pub struct FakeCamera {
    behaviour: CameraBehaviour,
    requests: AtomicUsize,
    last: Mutex<Option<Arc<FakeStream>>>,
}

impl FakeCamera {
    fn build(behaviour: CameraBehaviour) -> Arc<Self> {
        Arc::new(Self {
            behaviour,
            requests: AtomicUsize::new(0),
            last: Mutex::new(None),
        })
    }

    /// Every request yields a fresh stream with a frame ready
    pub fn with_frames() -> Arc<Self> {
        Self::build(CameraBehaviour::Frames)
    }

    pub fn with_stream(stream: Arc<FakeStream>) -> Arc<Self> {
        Self::build(CameraBehaviour::Stream(stream))
    }

    pub fn failing(error: CaptureError) -> Arc<Self> {
        Self::build(CameraBehaviour::Fail(error))
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn last_stream(&self) -> Option<Arc<FakeStream>> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl CaptureDevice for FakeCamera {
    async fn request_stream(
        &self,
        _constraints: &CaptureConstraints,
    ) -> Result<Arc<dyn MediaStream>, CaptureError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let stream = match &self.behaviour {
            CameraBehaviour::Frames => FakeStream::with_frame(),
            CameraBehaviour::Stream(stream) => Arc::clone(stream),
            CameraBehaviour::Fail(error) => return Err(error.clone()),
        };
        *self.last.lock().unwrap() = Some(Arc::clone(&stream));
        Ok(stream)
    }
}

/// Detector that reports a fixed number of faces after a delay and tracks
/// how many invocations overlap.
pub struct FakeDetector {
    delay: Duration,
    faces: AtomicUsize,
    failing: AtomicBool,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeDetector {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            faces: AtomicUsize::new(1),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn set_faces(&self, count: usize) {
        self.faces.store(count, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl FaceDetector for FakeDetector {
    async fn detect(
        &self,
        _models: &ModelBundle,
        _frame: &Frame,
    ) -> Result<Vec<FaceDetection>, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        // an abandoned call stops counting once its future is dropped
        let _in_flight = InFlight(&self.in_flight);

        tokio::time::sleep(self.delay).await;

        if self.failing.load(Ordering::SeqCst) {
            return Err(DetectionError::Inference("scripted failure".to_string()));
        }
        Ok((0..self.faces.load(Ordering::SeqCst))
            .map(|i| {
                let x = i as f64 * 100.0;
                (BoundingBox::new(x, 10.0, 80.0, 80.0), vec![Point::new(x, 10.0)])
            })
            .collect())
    }
}

pub struct FakeEncoder {
    events: mpsc::UnboundedSender<EncoderEvent>,
    options: EncoderOptions,
    starts: AtomicUsize,
    stop_requests: AtomicUsize,
    tail: Mutex<Option<Vec<u8>>>,
}

impl FakeEncoder {
    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    pub fn emit(&self, event: EncoderEvent) {
        let _ = self.events.send(event);
    }

    pub fn emit_chunk(&self, bytes: &[u8]) {
        self.emit(EncoderEvent::Chunk(bytes.to_vec()));
    }

    /// Chunk flushed when the stop request arrives, ahead of `Stopped`
    pub fn set_tail(&self, bytes: &[u8]) {
        *self.tail.lock().unwrap() = Some(bytes.to_vec());
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_requests(&self) -> usize {
        self.stop_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaEncoder for FakeEncoder {
    async fn start(&self, _timeslice: Duration) -> Result<(), EncoderError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.emit(EncoderEvent::Started);
        Ok(())
    }

    async fn request_stop(&self) -> Result<(), EncoderError> {
        self.stop_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(tail) = self.tail.lock().unwrap().take() {
            self.emit(EncoderEvent::Chunk(tail));
        }
        self.emit(EncoderEvent::Stopped);
        Ok(())
    }
}

pub struct FakeEncoderFactory {
    supported: Vec<VideoMimeType>,
    created: Mutex<Vec<Arc<FakeEncoder>>>,
}

impl FakeEncoderFactory {
    pub fn supporting(types: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            supported: types.iter().map(|t| t.parse().unwrap()).collect(),
            created: Mutex::new(Vec::new()),
        })
    }

    pub fn created(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn last(&self) -> Arc<FakeEncoder> {
        self.created.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl EncoderFactory for FakeEncoderFactory {
    async fn is_type_supported(&self, mime_type: &VideoMimeType) -> bool {
        self.supported.contains(mime_type)
    }

    fn create(
        &self,
        _stream: Arc<dyn MediaStream>,
        options: EncoderOptions,
        events: mpsc::UnboundedSender<EncoderEvent>,
    ) -> Result<Arc<dyn MediaEncoder>, EncoderError> {
        let encoder = Arc::new(FakeEncoder {
            events,
            options,
            starts: AtomicUsize::new(0),
            stop_requests: AtomicUsize::new(0),
            tail: Mutex::new(None),
        });
        self.created.lock().unwrap().push(Arc::clone(&encoder));
        Ok(encoder)
    }
}

pub struct FakeModelSource {
    location: String,
    failure: Option<String>,
    loads: AtomicUsize,
}

impl FakeModelSource {
    pub fn ok(location: &str) -> Arc<Self> {
        Arc::new(Self {
            location: location.to_string(),
            failure: None,
            loads: AtomicUsize::new(0),
        })
    }

    pub fn failing(location: &str, message: &str) -> Arc<Self> {
        Arc::new(Self {
            location: location.to_string(),
            failure: Some(message.to_string()),
            loads: AtomicUsize::new(0),
        })
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelSource for FakeModelSource {
    fn location(&self) -> &str {
        &self.location
    }

    async fn fetch(&self, path: &str) -> Result<Vec<u8>, ModelSourceError> {
        Err(ModelSourceError::Fetch {
            path: path.to_string(),
            message: "not used".to_string(),
        })
    }

    async fn load(&self, model: SubModel) -> Result<LoadedSubModel, ModelSourceError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(ModelSourceError::Fetch {
                path: model.manifest_file(),
                message: message.clone(),
            });
        }
        Ok(LoadedSubModel {
            kind: model,
            manifest: WeightManifest::default(),
            weights: vec![0u8; 4],
        })
    }
}
