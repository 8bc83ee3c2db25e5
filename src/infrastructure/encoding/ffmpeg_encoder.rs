//! FFmpeg-based video encoder adapter
//!
//! Camera frames are written as raw RGB24 to FFmpeg's stdin and the encoded
//! container is read back from stdout. Output is cut into chunks on a fixed
//! timeslice. Both WebM and MP4 are written in streamable form so every chunk
//! can be appended as it arrives.

use std::collections::HashSet;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex, OnceCell};
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::ports::{
    EncoderError, EncoderEvent, EncoderFactory, EncoderOptions, MediaEncoder, MediaStream,
};
use crate::domain::recording::VideoMimeType;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// FFmpeg encoders needed to produce a given mime type
#[derive(Debug, Clone, PartialEq, Eq)]
struct EncoderPlan {
    muxer: &'static str,
    video: &'static str,
    audio: &'static str,
}

impl EncoderPlan {
    fn for_mime(mime: &VideoMimeType) -> Result<Self, EncoderError> {
        let (muxer, default_video, default_audio) = match mime.container() {
            "webm" => ("webm", "libvpx", "libopus"),
            "mp4" => ("mp4", "libx264", "aac"),
            other => {
                return Err(EncoderError::Unsupported(format!(
                    "container '{}' is not supported",
                    other
                )))
            }
        };

        let mut video = default_video;
        let mut audio = default_audio;
        for codec in mime.codecs() {
            match codec.as_str() {
                "vp9" | "vp09" => video = "libvpx-vp9",
                "vp8" => video = "libvpx",
                c if c == "h264" || c.starts_with("avc1") => video = "libx264",
                "opus" => audio = "libopus",
                "vorbis" => audio = "libvorbis",
                c if c == "aac" || c.starts_with("mp4a") => audio = "aac",
                other => {
                    return Err(EncoderError::Unsupported(format!(
                        "codec '{}' is not supported",
                        other
                    )))
                }
            }
        }

        let webm_codecs = ["libvpx", "libvpx-vp9", "libopus", "libvorbis"];
        let fits = match muxer {
            "webm" => webm_codecs.contains(&video) && webm_codecs.contains(&audio),
            _ => video == "libx264" && audio == "aac",
        };
        if !fits {
            return Err(EncoderError::Unsupported(format!(
                "{} cannot be muxed into {}",
                mime, muxer
            )));
        }

        Ok(Self {
            muxer,
            video,
            audio,
        })
    }

    fn is_available(&self, encoders: &HashSet<String>, with_audio: bool) -> bool {
        encoders.contains(self.video) && (!with_audio || encoders.contains(self.audio))
    }
}

/// Pull encoder names out of `ffmpeg -encoders` output
fn parse_encoder_list(output: &str) -> HashSet<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let flags = fields.next()?;
            let name = fields.next()?;
            let is_entry = flags.len() == 6
                && flags.starts_with(|c| matches!(c, 'V' | 'A' | 'S'))
                && name != "=";
            is_entry.then(|| name.to_string())
        })
        .collect()
}

/// Audio capture input for the encoder process
#[derive(Debug, Clone, PartialEq, Eq)]
struct AudioInput {
    format: &'static str,
    device: String,
}

impl AudioInput {
    fn platform(device: Option<&str>) -> Self {
        #[cfg(target_os = "linux")]
        let (format, default) = ("pulse", "default");
        #[cfg(target_os = "macos")]
        let (format, default) = ("avfoundation", ":0");
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        let (format, default) = ("dshow", "audio=Microphone");

        Self {
            format,
            device: device.unwrap_or(default).to_string(),
        }
    }
}

/// Build FFmpeg args for one encoding session
fn build_ffmpeg_args(
    plan: &EncoderPlan,
    width: u32,
    height: u32,
    bits_per_second: u64,
    audio: Option<&AudioInput>,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        // frames arrive at the camera's pace, not a fixed rate
        "-use_wallclock_as_timestamps".into(),
        "1".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgb24".into(),
        "-s".into(),
        format!("{}x{}", width, height),
        "-i".into(),
        "pipe:0".into(),
    ];

    if let Some(input) = audio {
        args.extend([
            "-f".to_string(),
            input.format.to_string(),
            "-i".to_string(),
            input.device.clone(),
        ]);
    }

    args.extend([
        "-c:v".to_string(),
        plan.video.to_string(),
        "-b:v".to_string(),
        bits_per_second.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
    ]);

    match plan.video {
        "libx264" => args.extend(["-preset".to_string(), "veryfast".to_string()]),
        _ => args.extend([
            "-deadline".to_string(),
            "realtime".to_string(),
            "-cpu-used".to_string(),
            "8".to_string(),
        ]),
    }

    if audio.is_some() {
        args.extend(["-c:a".to_string(), plan.audio.to_string()]);
    } else {
        args.push("-an".to_string());
    }

    if plan.muxer == "mp4" {
        args.extend([
            "-movflags".to_string(),
            "frag_keyframe+empty_moov+default_base_moof".to_string(),
        ]);
    }

    args.extend(["-f".to_string(), plan.muxer.to_string(), "pipe:1".to_string()]);
    args
}

/// Creates FFmpeg encoders and answers which mime types this machine can produce.
///
/// With `capture_audio` set, a mime type only counts as supported when both
/// its video and audio encoders are present.
pub struct FfmpegEncoderFactory {
    audio_device: Option<String>,
    capture_audio: bool,
    encoders: OnceCell<HashSet<String>>,
}

impl FfmpegEncoderFactory {
    pub fn new(audio_device: Option<String>, capture_audio: bool) -> Self {
        Self {
            audio_device,
            capture_audio,
            encoders: OnceCell::new(),
        }
    }

    #[cfg(test)]
    fn with_known_encoders(encoders: &[&str], capture_audio: bool) -> Self {
        Self {
            audio_device: None,
            capture_audio,
            encoders: OnceCell::new_with(Some(encoders.iter().map(|e| e.to_string()).collect())),
        }
    }

    async fn available_encoders(&self) -> &HashSet<String> {
        self.encoders
            .get_or_init(|| async {
                let output = Command::new("ffmpeg")
                    .args(["-hide_banner", "-encoders"])
                    .stdin(Stdio::null())
                    .stderr(Stdio::null())
                    .output()
                    .await;
                match output {
                    Ok(out) => parse_encoder_list(&String::from_utf8_lossy(&out.stdout)),
                    Err(e) => {
                        warn!(error = %e, "Could not list FFmpeg encoders");
                        HashSet::new()
                    }
                }
            })
            .await
    }
}

impl Default for FfmpegEncoderFactory {
    fn default() -> Self {
        Self::new(None, true)
    }
}

#[async_trait]
impl EncoderFactory for FfmpegEncoderFactory {
    async fn is_type_supported(&self, mime_type: &VideoMimeType) -> bool {
        let Ok(plan) = EncoderPlan::for_mime(mime_type) else {
            return false;
        };
        plan.is_available(self.available_encoders().await, self.capture_audio)
    }

    fn create(
        &self,
        stream: Arc<dyn MediaStream>,
        options: EncoderOptions,
        events: mpsc::UnboundedSender<EncoderEvent>,
    ) -> Result<Arc<dyn MediaEncoder>, EncoderError> {
        let plan = EncoderPlan::for_mime(&options.mime_type)?;
        let audio = (self.capture_audio && stream.constraints().audio)
            .then(|| AudioInput::platform(self.audio_device.as_deref()));
        Ok(Arc::new(FfmpegEncoder {
            stream,
            options,
            plan,
            audio,
            events,
            process: Mutex::new(None),
            stopping: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct Process {
    pid: Option<u32>,
    feed: CancellationToken,
}

/// One FFmpeg encoding run bound to a camera stream
pub struct FfmpegEncoder {
    stream: Arc<dyn MediaStream>,
    options: EncoderOptions,
    plan: EncoderPlan,
    audio: Option<AudioInput>,
    events: mpsc::UnboundedSender<EncoderEvent>,
    process: Mutex<Option<Process>>,
    stopping: Arc<AtomicBool>,
}

impl FfmpegEncoder {
    fn spawn_ffmpeg(args: Vec<String>) -> Result<Child, EncoderError> {
        Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EncoderError::FfmpegNotFound
                } else {
                    EncoderError::StartFailed(e.to_string())
                }
            })
    }

    /// Send signal to FFmpeg process
    #[cfg(unix)]
    fn send_interrupt(pid: u32) -> Result<(), EncoderError> {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        signal::kill(Pid::from_raw(pid as i32), Signal::SIGINT)
            .map_err(|e| EncoderError::StopFailed(format!("Signal failed: {}", e)))
    }

    #[cfg(not(unix))]
    fn send_interrupt(_pid: u32) -> Result<(), EncoderError> {
        Ok(())
    }
}

#[async_trait]
impl MediaEncoder for FfmpegEncoder {
    async fn start(&self, timeslice: Duration) -> Result<(), EncoderError> {
        let mut process = self.process.lock().await;
        if process.is_some() {
            return Err(EncoderError::StartFailed(
                "Encoder already started".to_string(),
            ));
        }

        let constraints = self.stream.constraints();
        let args = build_ffmpeg_args(
            &self.plan,
            constraints.width,
            constraints.height,
            self.options.video_bits_per_second,
            self.audio.as_ref(),
        );
        debug!(?args, "Spawning encoder process");

        let mut child = Self::spawn_ffmpeg(args)?;
        let missing = |what: &str| EncoderError::StartFailed(format!("encoder {} unavailable", what));
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        let feed = CancellationToken::new();
        *process = Some(Process {
            pid: child.id(),
            feed: feed.clone(),
        });

        let _ = self.events.send(EncoderEvent::Started);
        info!(mime_type = %self.options.mime_type, "Encoder started");

        let stderr_tail = Arc::new(StdMutex::new(String::new()));
        let stderr_task = tokio::spawn(collect_stderr(stderr, Arc::clone(&stderr_tail)));
        tokio::spawn(feed_frames(Arc::clone(&self.stream), stdin, feed));
        tokio::spawn(read_output(
            child,
            stdout,
            timeslice,
            self.events.clone(),
            Arc::clone(&self.stopping),
            stderr_task,
            stderr_tail,
        ));
        Ok(())
    }

    async fn request_stop(&self) -> Result<(), EncoderError> {
        let process = self.process.lock().await;
        let Some(process) = process.as_ref() else {
            return Err(EncoderError::StopFailed(
                "Encoder was never started".to_string(),
            ));
        };
        if self.stopping.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        // Closing stdin ends the video input; the interrupt ends audio capture
        process.feed.cancel();
        if self.audio.is_some() {
            if let Some(pid) = process.pid {
                Self::send_interrupt(pid)?;
            }
        }
        debug!("Encoder stop requested");
        Ok(())
    }
}

async fn feed_frames(stream: Arc<dyn MediaStream>, mut stdin: ChildStdin, feed: CancellationToken) {
    let mut frames = stream.frames();
    frames.mark_changed();
    loop {
        tokio::select! {
            _ = feed.cancelled() => break,
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
                let frame = frames.borrow_and_update().clone();
                let Some(frame) = frame else { continue };
                if let Err(e) = stdin.write_all(frame.data()).await {
                    debug!(error = %e, "Encoder input closed");
                    break;
                }
            }
        }
    }
    let _ = stdin.shutdown().await;
}

async fn collect_stderr(stderr: ChildStderr, tail: Arc<StdMutex<String>>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("ffmpeg: {}", line);
        *tail.lock().unwrap_or_else(PoisonError::into_inner) = line;
    }
}

async fn read_output(
    mut child: Child,
    mut stdout: ChildStdout,
    timeslice: Duration,
    events: mpsc::UnboundedSender<EncoderEvent>,
    stopping: Arc<AtomicBool>,
    stderr_task: tokio::task::JoinHandle<()>,
    stderr_tail: Arc<StdMutex<String>>,
) {
    let mut pending = Vec::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut slicer = interval_at(Instant::now() + timeslice, timeslice);

    loop {
        tokio::select! {
            read = stdout.read(&mut buf) => match read {
                Ok(0) => break,
                Ok(n) => pending.extend_from_slice(&buf[..n]),
                Err(e) => {
                    let _ = events.send(EncoderEvent::Error(e.to_string()));
                    break;
                }
            },
            _ = slicer.tick() => {
                let _ = events.send(EncoderEvent::Chunk(std::mem::take(&mut pending)));
            }
        }
    }

    if !pending.is_empty() {
        let _ = events.send(EncoderEvent::Chunk(pending));
    }

    let status = child.wait().await;
    let _ = stderr_task.await;
    let stopping = stopping.load(Ordering::SeqCst);
    match status {
        Ok(status) if !status.success() && !stopping => {
            let tail = stderr_tail
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            let message = if tail.is_empty() {
                format!("FFmpeg exited with {}", status)
            } else {
                format!("FFmpeg exited with error: {}", tail)
            };
            warn!(%message, "Encoder failed");
            let _ = events.send(EncoderEvent::Error(message));
        }
        Err(e) if !stopping => {
            let _ = events.send(EncoderEvent::Error(format!("FFmpeg failed: {}", e)));
        }
        _ => {}
    }

    let _ = events.send(EncoderEvent::Stopped);
    debug!("Encoder output finished");
}
