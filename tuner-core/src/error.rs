//! # Error Module
//!
//! Typed errors for the tuner pipeline. Audio source failures carry a
//! numeric code so the front end can report them the way the operator
//! expects ("Error number" / "Error message").

use thiserror::Error;

/// Failures raised by an [`AudioSource`](crate::audio::AudioSource).
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no input device available")]
    NoInputDevice,

    #[error("input device does not support {sample_rate} Hz f32 capture")]
    UnsupportedConfig { sample_rate: u32 },

    #[error("failed to open input stream: {reason}")]
    StreamOpenFailed { reason: String },

    #[error("input stream failed: {reason}")]
    StreamFailure { reason: String },

    #[error("input stream disconnected")]
    Disconnected,
}

impl AudioError {
    /// Numeric code reported alongside the message.
    pub fn code(&self) -> i32 {
        match self {
            AudioError::NoInputDevice => 1001,
            AudioError::UnsupportedConfig { .. } => 1002,
            AudioError::StreamOpenFailed { .. } => 1003,
            AudioError::StreamFailure { .. } => 1004,
            AudioError::Disconnected => 1005,
        }
    }
}

/// Errors produced by the tuner core.
#[derive(Debug, Error)]
pub enum TunerError {
    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("no semitone maps onto a bin at {sample_rate} Hz with {fft_size} bins")]
    EmptyNoteMap { sample_rate: u32, fft_size: usize },

    #[error("no mapped note reachable from peak bin {peak_bin}")]
    UnresolvedPeak { peak_bin: usize },

    #[error("frame has {actual} samples, expected {expected}")]
    FrameLength { expected: usize, actual: usize },
}

impl TunerError {
    /// Numeric code for the operator. Audio failures keep their own code;
    /// everything else is a pipeline or configuration error.
    pub fn code(&self) -> i32 {
        match self {
            TunerError::Audio(err) => err.code(),
            TunerError::InvalidConfig(_)
            | TunerError::ConfigRead { .. }
            | TunerError::ConfigParse { .. } => 2001,
            TunerError::EmptyNoteMap { .. }
            | TunerError::UnresolvedPeak { .. }
            | TunerError::FrameLength { .. } => 3001,
        }
    }
}

pub type Result<T> = std::result::Result<T, TunerError>;
