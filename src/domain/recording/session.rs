//! Recording session state machine

use std::fmt;

use chrono::{DateTime, Local};

use crate::domain::error::{EmptyRecording, InvalidRecordingTransition};

use super::mime::VideoMimeType;

/// Recording pipeline states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
    Finalizing,
}

impl RecordingState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Finalizing => "finalizing",
        }
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything collected by a session that reached finalization.
#[derive(Debug, Clone)]
pub struct FinishedRecording {
    pub chunks: Vec<Vec<u8>>,
    pub elapsed_seconds: u64,
    pub mime_type: VideoMimeType,
    pub started_at: DateTime<Local>,
}

impl FinishedRecording {
    /// Chunks joined in arrival order
    pub fn into_payload(self) -> Vec<u8> {
        self.chunks.concat()
    }
}

/// Recording session entity.
///
/// State machine:
///   IDLE -> RECORDING (begin)
///   RECORDING -> FINALIZING (begin_finalizing)
///   FINALIZING -> IDLE (finish)
///   RECORDING | FINALIZING -> IDLE (abort)
///
/// Every `begin` opens a new generation. Chunk, tick, abort and finish calls
/// carry the generation they belong to and are ignored once it is stale, so a
/// late encoder event can never touch a newer session.
#[derive(Debug, Default)]
pub struct RecordingSession {
    state: RecordingState,
    generation: u64,
    chunks: Vec<Vec<u8>>,
    elapsed_seconds: u64,
    mime_type: Option<VideoMimeType>,
    started_at: Option<DateTime<Local>>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == RecordingState::Idle
    }

    /// True only while actively capturing; finalizing does not count
    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::Recording
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn mime_type(&self) -> Option<&VideoMimeType> {
        self.mime_type.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime<Local>> {
        self.started_at
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn buffered_bytes(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Transition from IDLE to RECORDING, resetting chunks and elapsed time.
    /// Returns the new generation.
    pub fn begin(
        &mut self,
        mime_type: VideoMimeType,
        started_at: DateTime<Local>,
    ) -> Result<u64, InvalidRecordingTransition> {
        if self.state != RecordingState::Idle {
            return Err(InvalidRecordingTransition {
                current_state: self.state,
                action: "start recording",
            });
        }
        self.generation += 1;
        self.state = RecordingState::Recording;
        self.chunks.clear();
        self.elapsed_seconds = 0;
        self.mime_type = Some(mime_type);
        self.started_at = Some(started_at);
        Ok(self.generation)
    }

    /// Append a chunk. Empty chunks and chunks for another generation are
    /// dropped. Chunks still land while finalizing, since the encoder flushes
    /// its tail after the stop request.
    pub fn push_chunk(&mut self, generation: u64, chunk: Vec<u8>) -> bool {
        if generation != self.generation || self.is_idle() || chunk.is_empty() {
            return false;
        }
        self.chunks.push(chunk);
        true
    }

    /// Advance the elapsed counter by one second while recording
    pub fn tick(&mut self, generation: u64) -> Option<u64> {
        if generation != self.generation || !self.is_recording() {
            return None;
        }
        self.elapsed_seconds += 1;
        Some(self.elapsed_seconds)
    }

    /// Transition from RECORDING to FINALIZING, freezing elapsed time.
    /// Returns `(generation, frozen elapsed seconds)`.
    pub fn begin_finalizing(&mut self) -> Result<(u64, u64), InvalidRecordingTransition> {
        if self.state != RecordingState::Recording {
            return Err(InvalidRecordingTransition {
                current_state: self.state,
                action: "stop recording",
            });
        }
        self.state = RecordingState::Finalizing;
        Ok((self.generation, self.elapsed_seconds))
    }

    /// Drop the session and return to IDLE
    pub fn abort(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.is_idle() {
            return false;
        }
        self.reset();
        true
    }

    /// Transition from FINALIZING to IDLE, handing over the collected data.
    ///
    /// `None` when this generation is not finalizing. Zero chunks yields
    /// [`EmptyRecording`]; the session is discarded either way.
    pub fn finish(&mut self, generation: u64) -> Option<Result<FinishedRecording, EmptyRecording>> {
        if generation != self.generation || self.state != RecordingState::Finalizing {
            return None;
        }

        let chunks = std::mem::take(&mut self.chunks);
        let elapsed_seconds = self.elapsed_seconds;
        let mime_type = self.mime_type.take();
        let started_at = self.started_at.take();
        self.reset();

        match (mime_type, started_at) {
            (Some(mime_type), Some(started_at)) if !chunks.is_empty() => {
                Some(Ok(FinishedRecording {
                    chunks,
                    elapsed_seconds,
                    mime_type,
                    started_at,
                }))
            }
            _ => Some(Err(EmptyRecording)),
        }
    }

    fn reset(&mut self) {
        self.state = RecordingState::Idle;
        self.chunks.clear();
        self.mime_type = None;
        self.started_at = None;
    }
}
