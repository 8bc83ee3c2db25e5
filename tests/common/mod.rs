//! Port doubles for the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use face_tracking_studio::application::ports::{
    CaptureDevice, CaptureError, DetectionError, EncoderError, EncoderEvent, EncoderFactory,
    EncoderOptions, FaceDetection, FaceDetector, MediaEncoder, MediaStream, ModelSource,
    ModelSourceError,
};
use face_tracking_studio::application::{Studio, StudioConfig, StudioPorts};
use face_tracking_studio::domain::capture::{CaptureConstraints, Frame};
use face_tracking_studio::domain::detection::{BoundingBox, Point};
use face_tracking_studio::domain::model::{ModelBundle, REQUIRED_SUB_MODELS};
use face_tracking_studio::domain::recording::VideoMimeType;
use face_tracking_studio::infrastructure::MemoryBlobStore;

pub fn frame(index: u64) -> Frame {
    Frame::new(vec![0u8; Frame::byte_len(4, 4)], 4, 4, index)
}

/// Manifest plus one shard holding `bytes` uint8 weights
pub fn manifest_for(stem: &str, bytes: usize) -> (String, String) {
    let shard = format!("{}-shard1", stem);
    let manifest = format!(
        r#"[{{"paths": ["{}"], "weights": [{{"name": "w", "shape": [{}], "dtype": "uint8"}}]}}]"#,
        shard, bytes
    );
    (manifest, shard)
}

pub struct TestStream {
    constraints: CaptureConstraints,
    frames: watch::Sender<Option<Frame>>,
    live: AtomicBool,
}

#[async_trait]
impl MediaStream for TestStream {
    fn id(&self) -> &str {
        "test-stream"
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

/// Camera that either grants a stream with a frame ready or refuses
pub struct TestCamera {
    refusal: Option<CaptureError>,
    last: Mutex<Option<Arc<TestStream>>>,
}

impl TestCamera {
    pub fn granting() -> Arc<Self> {
        Arc::new(Self {
            refusal: None,
            last: Mutex::new(None),
        })
    }

    pub fn refusing(error: CaptureError) -> Arc<Self> {
        Arc::new(Self {
            refusal: Some(error),
            last: Mutex::new(None),
        })
    }

    pub fn stream_is_live(&self) -> bool {
        self.last
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|s| s.is_live())
    }
}

#[async_trait]
impl CaptureDevice for TestCamera {
    async fn request_stream(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Arc<dyn MediaStream>, CaptureError> {
        if let Some(error) = &self.refusal {
            return Err(error.clone());
        }
        let (frames, _) = watch::channel(Some(frame(0)));
        let stream = Arc::new(TestStream {
            constraints: constraints.clone(),
            frames,
            live: AtomicBool::new(true),
        });
        *self.last.lock().unwrap() = Some(Arc::clone(&stream));
        Ok(stream)
    }
}

/// Reports `faces` boxes for every frame after `delay`
pub struct TestDetector {
    delay: Duration,
    faces: usize,
    calls: AtomicUsize,
}

impl TestDetector {
    pub fn new(delay: Duration, faces: usize) -> Arc<Self> {
        Arc::new(Self {
            delay,
            faces,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FaceDetector for TestDetector {
    async fn detect(
        &self,
        models: &ModelBundle,
        _frame: &Frame,
    ) -> Result<Vec<FaceDetection>, DetectionError> {
        assert!(models.is_complete());
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok((0..self.faces)
            .map(|i| {
                let x = 50.0 * i as f64;
                (BoundingBox::new(x, 0.0, 40.0, 40.0), vec![Point::new(x + 20.0, 20.0)])
            })
            .collect())
    }
}

/// Serves weight files from memory through the default `load`
pub struct MemoryModelSource {
    location: String,
    files: HashMap<String, Vec<u8>>,
}

impl MemoryModelSource {
    pub fn complete(location: &str) -> Arc<Self> {
        let mut files = HashMap::new();
        for model in REQUIRED_SUB_MODELS {
            let (manifest, shard) = manifest_for(model.file_stem(), 8);
            files.insert(model.manifest_file(), manifest.into_bytes());
            files.insert(shard, vec![7u8; 8]);
        }
        Arc::new(Self {
            location: location.to_string(),
            files,
        })
    }

    pub fn empty(location: &str) -> Arc<Self> {
        Arc::new(Self {
            location: location.to_string(),
            files: HashMap::new(),
        })
    }
}

#[async_trait]
impl ModelSource for MemoryModelSource {
    fn location(&self) -> &str {
        &self.location
    }

    async fn fetch(&self, path: &str) -> Result<Vec<u8>, ModelSourceError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| ModelSourceError::Fetch {
                path: path.to_string(),
                message: "404 Not Found".to_string(),
            })
    }
}

/// Emits one chunk per second of recording plus a final chunk on stop.
///
/// A scripted encoder emits exactly the listed chunk sizes, one per
/// timeslice, and nothing on stop.
pub struct TickingEncoder {
    events: mpsc::UnboundedSender<EncoderEvent>,
    script: Option<Vec<usize>>,
    running: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

#[async_trait]
impl MediaEncoder for TickingEncoder {
    async fn start(&self, timeslice: Duration) -> Result<(), EncoderError> {
        let _ = self.events.send(EncoderEvent::Started);
        let events = self.events.clone();
        let script = self.script.clone();
        let task = tokio::spawn(async move {
            let mut n = 0u8;
            loop {
                tokio::time::sleep(timeslice).await;
                let size = match &script {
                    Some(sizes) => match sizes.get(n as usize) {
                        Some(size) => *size,
                        None => break,
                    },
                    None => 10,
                };
                if events.send(EncoderEvent::Chunk(vec![n; size])).is_err() {
                    break;
                }
                n = n.wrapping_add(1);
            }
        });
        *self.running.lock().unwrap() = Some(task);
        Ok(())
    }

    async fn request_stop(&self) -> Result<(), EncoderError> {
        if let Some(task) = self.running.lock().unwrap().take() {
            task.abort();
        }
        if self.script.is_none() {
            let _ = self.events.send(EncoderEvent::Chunk(vec![0xff; 5]));
        }
        let _ = self.events.send(EncoderEvent::Stopped);
        Ok(())
    }
}

pub struct TestEncoders {
    supported: Vec<VideoMimeType>,
    script: Option<Vec<usize>>,
}

impl TestEncoders {
    pub fn supporting(types: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            supported: types.iter().map(|t| t.parse().unwrap()).collect(),
            script: None,
        })
    }

    pub fn scripted(types: &[&str], chunk_sizes: &[usize]) -> Arc<Self> {
        Arc::new(Self {
            supported: types.iter().map(|t| t.parse().unwrap()).collect(),
            script: Some(chunk_sizes.to_vec()),
        })
    }
}

#[async_trait]
impl EncoderFactory for TestEncoders {
    async fn is_type_supported(&self, mime_type: &VideoMimeType) -> bool {
        self.supported.contains(mime_type)
    }

    fn create(
        &self,
        _stream: Arc<dyn MediaStream>,
        _options: EncoderOptions,
        events: mpsc::UnboundedSender<EncoderEvent>,
    ) -> Result<Arc<dyn MediaEncoder>, EncoderError> {
        Ok(Arc::new(TickingEncoder {
            events,
            script: self.script.clone(),
            running: Mutex::new(None),
        }))
    }
}

pub struct Harness {
    pub studio: Studio,
    pub camera: Arc<TestCamera>,
    pub detector: Arc<TestDetector>,
    pub blobs: Arc<MemoryBlobStore>,
}

pub fn harness(
    camera: Arc<TestCamera>,
    primary: Arc<dyn ModelSource>,
    fallback: Arc<dyn ModelSource>,
) -> Harness {
    harness_with(
        camera,
        primary,
        fallback,
        TestEncoders::supporting(&["video/webm;codecs=vp8"]),
    )
}

pub fn harness_with(
    camera: Arc<TestCamera>,
    primary: Arc<dyn ModelSource>,
    fallback: Arc<dyn ModelSource>,
    encoders: Arc<TestEncoders>,
) -> Harness {
    let detector = TestDetector::new(Duration::from_millis(30), 2);
    let blobs = Arc::new(MemoryBlobStore::new());
    let ports = StudioPorts {
        camera: camera.clone(),
        detector: detector.clone(),
        primary_models: primary,
        fallback_models: fallback,
        encoders,
        blobs: blobs.clone(),
    };
    Harness {
        studio: Studio::new(ports, StudioConfig::default()),
        camera,
        detector,
        blobs,
    }
}
