// tuner-core/src/lib.rs

//! The core logic for the chromatic practice tuner.
//! This crate is responsible for filtering, spectral analysis, note
//! resolution and practice scoring. It is completely headless and
//! contains no terminal or display code.

pub mod accuracy;
pub mod audio;
pub mod config;
pub mod error;
pub mod fft;
pub mod filter;
pub mod pitch;
pub mod report;
pub mod session;
pub mod tuning;

pub use accuracy::{AccuracyState, Accumulator};
pub use audio::{AudioSource, BufferedSource, CpalSource};
pub use config::TunerConfig;
pub use error::{AudioError, TunerError};
pub use pitch::{FrameAnalyzer, FrameBuffer, FrameResult};
pub use report::{SessionReport, SessionSummary};
pub use session::{Session, ShutdownToken, StopReason};
