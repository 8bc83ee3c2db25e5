//! FFmpeg-based camera adapter
//!
//! Runs one FFmpeg process per stream that decodes the camera into raw RGB24
//! frames on stdout. A reader task publishes each complete frame to a watch
//! channel.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::ports::{CaptureDevice, CaptureError, MediaStream};
use crate::domain::capture::{CaptureConstraints, Frame};

#[cfg(target_os = "linux")]
const DEFAULT_DEVICE: &str = "/dev/video0";

#[cfg(target_os = "macos")]
const DEFAULT_DEVICE: &str = "0";

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
const DEFAULT_DEVICE: &str = "video=Integrated Camera";

const CAPTURE_FRAME_RATE: u32 = 30;

/// Camera opened through FFmpeg's platform input device
pub struct FfmpegCamera {
    device: String,
    next_stream: AtomicU64,
}

impl FfmpegCamera {
    pub fn new(device: Option<String>) -> Self {
        Self {
            device: device.unwrap_or_else(|| DEFAULT_DEVICE.to_string()),
            next_stream: AtomicU64::new(1),
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Build FFmpeg args that decode the camera into raw frames on stdout.
    ///
    /// Output is scaled to the requested size so every frame on the pipe has
    /// exactly `width * height * 3` bytes.
    fn build_ffmpeg_args(device: &str, constraints: &CaptureConstraints) -> Vec<String> {
        let mut args: Vec<String> = vec!["-hide_banner".into(), "-loglevel".into(), "error".into()];

        args.extend(Self::input_args(device, constraints));

        args.extend([
            "-an".to_string(),
            "-vf".to_string(),
            format!("scale={}:{}", constraints.width, constraints.height),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "pipe:1".to_string(),
        ]);

        args
    }

    #[cfg(target_os = "linux")]
    fn input_args(device: &str, constraints: &CaptureConstraints) -> Vec<String> {
        vec![
            "-f".into(),
            "v4l2".into(),
            "-framerate".into(),
            CAPTURE_FRAME_RATE.to_string(),
            "-video_size".into(),
            constraints.resolution(),
            "-i".into(),
            device.into(),
        ]
    }

    #[cfg(target_os = "macos")]
    fn input_args(device: &str, constraints: &CaptureConstraints) -> Vec<String> {
        vec![
            "-f".into(),
            "avfoundation".into(),
            "-framerate".into(),
            CAPTURE_FRAME_RATE.to_string(),
            "-video_size".into(),
            constraints.resolution(),
            "-i".into(),
            device.into(),
        ]
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    fn input_args(device: &str, constraints: &CaptureConstraints) -> Vec<String> {
        vec![
            "-f".into(),
            "dshow".into(),
            "-framerate".into(),
            CAPTURE_FRAME_RATE.to_string(),
            "-video_size".into(),
            constraints.resolution(),
            "-i".into(),
            device.into(),
        ]
    }

    /// Device nodes that are plain paths must exist before we spawn anything
    fn check_device(device: &str) -> Result<(), CaptureError> {
        if device.starts_with('/') && !Path::new(device).exists() {
            return Err(CaptureError::NoDevice);
        }
        Ok(())
    }
}

impl Default for FfmpegCamera {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl CaptureDevice for FfmpegCamera {
    async fn request_stream(
        &self,
        constraints: &CaptureConstraints,
    ) -> Result<Arc<dyn MediaStream>, CaptureError> {
        if constraints.width == 0 || constraints.height == 0 {
            return Err(CaptureError::ConstraintsUnsatisfiable(format!(
                "resolution {} is empty",
                constraints.resolution()
            )));
        }
        Self::check_device(&self.device)?;

        let args = Self::build_ffmpeg_args(&self.device, constraints);
        debug!(device = %self.device, ?args, "Spawning camera process");

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    CaptureError::FfmpegNotFound
                } else {
                    CaptureError::StreamFailed(e.to_string())
                }
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::StreamFailed("camera stdout unavailable".into()))?;
        let stderr = child.stderr.take();

        let id = format!(
            "camera-{}",
            self.next_stream.fetch_add(1, Ordering::Relaxed)
        );
        let (frames, _) = watch::channel(None);
        let stream = Arc::new(FfmpegStream {
            id,
            constraints: constraints.clone(),
            frames,
            live: AtomicBool::new(true),
            stop: CancellationToken::new(),
            ended: CancellationToken::new(),
            failure: Mutex::new(None),
            stderr_tail: Mutex::new(String::new()),
        });

        let stderr_task = stderr.map(|stderr| tokio::spawn(collect_stderr(Arc::clone(&stream), stderr)));
        tokio::spawn(read_frames(Arc::clone(&stream), child, stdout, stderr_task));

        info!(stream = %stream.id, resolution = %constraints.resolution(), "Camera stream opened");
        Ok(stream)
    }
}

/// A camera stream backed by a running FFmpeg process
pub struct FfmpegStream {
    id: String,
    constraints: CaptureConstraints,
    frames: watch::Sender<Option<Frame>>,
    live: AtomicBool,
    stop: CancellationToken,
    // cancelled once the process has exited
    ended: CancellationToken,
    failure: Mutex<Option<CaptureError>>,
    stderr_tail: Mutex<String>,
}

impl FfmpegStream {
    fn set_failure(&self, error: CaptureError) {
        let mut failure = self.failure.lock().unwrap_or_else(PoisonError::into_inner);
        failure.get_or_insert(error);
    }

    fn take_failure(&self) -> Option<CaptureError> {
        self.failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn stderr_tail(&self) -> String {
        self.stderr_tail
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl MediaStream for FfmpegStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn constraints(&self) -> &CaptureConstraints {
        &self.constraints
    }

    fn frames(&self) -> watch::Receiver<Option<Frame>> {
        self.frames.subscribe()
    }

    async fn playing(&self) -> Result<(), CaptureError> {
        let mut frames = self.frames();
        tokio::select! {
            delivered = async { frames.wait_for(Option::is_some).await.is_ok() } => {
                if delivered {
                    return Ok(());
                }
            }
            _ = self.ended.cancelled() => {
                let delivered = self.frames.borrow().is_some();
                if delivered {
                    return Ok(());
                }
            }
        }
        Err(self.take_failure().unwrap_or_else(|| {
            CaptureError::StreamFailed("stream ended before the first frame".to_string())
        }))
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn stop_tracks(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            debug!(stream = %self.id, "Stopping camera stream");
        }
        self.stop.cancel();
    }
}

/// Map what FFmpeg printed on a failed open to a capture error
fn classify_failure(stderr: &str) -> CaptureError {
    let lower = stderr.to_lowercase();
    if lower.contains("permission denied") || lower.contains("not authorized") {
        CaptureError::PermissionDenied
    } else if lower.contains("no such file or directory") || lower.contains("could not find") {
        CaptureError::NoDevice
    } else if lower.contains("invalid argument") || lower.contains("not supported") {
        CaptureError::ConstraintsUnsatisfiable(last_line(stderr))
    } else {
        CaptureError::StreamFailed(last_line(stderr))
    }
}

fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("camera process exited")
        .trim()
        .to_string()
}

async fn collect_stderr(stream: Arc<FfmpegStream>, stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(stream = %stream.id, "ffmpeg: {}", line);
        let mut tail = stream.stderr_tail.lock().unwrap_or_else(PoisonError::into_inner);
        tail.push_str(&line);
        tail.push('\n');
    }
}

async fn read_frames(
    stream: Arc<FfmpegStream>,
    mut child: tokio::process::Child,
    mut stdout: ChildStdout,
    stderr_task: Option<JoinHandle<()>>,
) {
    let width = stream.constraints.width;
    let height = stream.constraints.height;
    let mut index: u64 = 0;

    loop {
        let mut buf = vec![0u8; Frame::byte_len(width, height)];
        tokio::select! {
            _ = stream.stop.cancelled() => break,
            read = stdout.read_exact(&mut buf) => {
                if read.is_err() {
                    break;
                }
                stream.frames.send_replace(Some(Frame::new(buf, width, height, index)));
                index += 1;
            }
        }
    }

    let stopped = stream.stop.is_cancelled();
    let _ = child.start_kill();
    let status = child.wait().await;
    stream.live.store(false, Ordering::SeqCst);

    if let Some(task) = stderr_task {
        let _ = task.await;
    }

    if !stopped {
        let tail = stream.stderr_tail();
        let error = classify_failure(&tail);
        warn!(stream = %stream.id, frames = index, ?status, error = %error, "Camera stream ended");
        stream.set_failure(error);
    } else {
        debug!(stream = %stream.id, frames = index, "Camera process exited");
    }
    stream.ended.cancel();
}
