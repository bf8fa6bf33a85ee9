use std::fmt;
use std::sync::Arc;

/// Decoded audio data stored entirely in memory.
///
/// Treated as immutable once produced by the decoder; the engine and the
/// peaks bar share it behind an `Arc`.
#[derive(Clone, Debug)]
pub struct AudioData {
    /// Interleaved samples normalized to [-1.0, 1.0].
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Duration in seconds.
    pub duration: f64,
}

impl AudioData {
    /// Total number of frames (samples per channel).
    pub fn num_frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Sample for `channel` at frame `frame`. Out-of-range channels fall
    /// back to channel 0, so a mono source feeds both sides of a stereo
    /// display.
    pub fn sample(&self, channel: u16, frame: usize) -> f32 {
        let ch = self.channels.max(1) as usize;
        let c = if (channel as usize) < ch { channel as usize } else { 0 };
        self.samples[frame * ch + c]
    }
}

/// What went wrong while bringing audio into the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaErrorKind {
    /// Fetching the bytes failed (bad response, network failure).
    Transport,
    /// Bytes arrived but could not be decoded as audio.
    Decode,
}

/// Error surfaced through `PlaybackStatus::Error`. The message is kept
/// verbatim for display; aborted loads never produce one of these.
#[derive(Clone, Debug, PartialEq)]
pub struct MediaError {
    pub kind: MediaErrorKind,
    pub message: String,
}

impl MediaError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self { kind: MediaErrorKind::Transport, message: message.into() }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self { kind: MediaErrorKind::Decode, message: message.into() }
    }
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            MediaErrorKind::Transport => write!(f, "failed to load audio: {}", self.message),
            MediaErrorKind::Decode => write!(f, "failed to decode audio: {}", self.message),
        }
    }
}

impl std::error::Error for MediaError {}

/// Commands sent from the UI thread to the audio callback.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    SetAudio(Arc<AudioData>),
    Play,
    Pause,
    /// Target position in seconds; clamped to the loaded audio.
    Seek(f64),
    ClearAudio,
}
