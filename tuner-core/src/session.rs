//! # Session Module
//!
//! The processing loop: read a frame, analyze it, score it, hand the result
//! to the caller, repeat until shut down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::accuracy::{AccuracyState, Accumulator};
use crate::audio::AudioSource;
use crate::config::TunerConfig;
use crate::error::{Result, TunerError};
use crate::fft::{RustFftTransform, SpectrumTransform};
use crate::pitch::{FrameAnalyzer, FrameBuffer, FrameResult};
use crate::report::SessionReport;

/// Cooperative stop flag shared with whatever decides the session is over.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken(Arc<AtomicBool>);

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why [`Session::run`] returned normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    FrameLimit,
}

/// Owns the per-session state: analyzer (with filter history), frame
/// buffer and accumulator.
#[derive(Debug)]
pub struct Session<T: SpectrumTransform = RustFftTransform> {
    analyzer: FrameAnalyzer<T>,
    accumulator: Accumulator,
    frame: FrameBuffer,
    miss_rate_threshold: f32,
    max_frames: Option<u32>,
}

impl Session<RustFftTransform> {
    pub fn from_config(config: &TunerConfig) -> Result<Self> {
        let analyzer = FrameAnalyzer::from_config(config)?;
        Ok(Self::new(
            analyzer,
            Accumulator::new(config.accuracy_threshold_cents),
            config.miss_rate_threshold,
        ))
    }
}

impl<T: SpectrumTransform> Session<T> {
    pub fn new(analyzer: FrameAnalyzer<T>, accumulator: Accumulator, miss_rate_threshold: f32) -> Self {
        let frame = FrameBuffer::new(analyzer.frame_len());
        Self {
            analyzer,
            accumulator,
            frame,
            miss_rate_threshold,
            max_frames: None,
        }
    }

    /// Stops the loop after `limit` frames.
    pub fn with_max_frames(mut self, limit: Option<u32>) -> Self {
        self.max_frames = limit;
        self
    }

    /// Reads, analyzes and scores a single frame.
    pub fn step<S: AudioSource>(&mut self, source: &mut S) -> Result<(FrameResult, bool)> {
        source.read(self.frame.samples_mut())?;
        let result = self.analyzer.analyze(&mut self.frame)?;
        let accurate = self.accumulator.record(result.pitch_class, result.cents);
        Ok((result, accurate))
    }

    /// Processes frames until `shutdown` is triggered or the frame limit is
    /// reached. The token is checked between frames only.
    ///
    /// The source is started first, so audio captured before this call is
    /// never scored, and stopped before returning, on success and on error.
    ///
    /// # Arguments
    /// * `source` - Audio source at the analyzer's sample rate
    /// * `shutdown` - Cooperative stop flag
    /// * `on_frame` - Called with every frame result and whether it was accurate
    ///
    /// # Returns
    /// * `Ok(reason)` - Why the loop ended normally
    /// * `Err(e)` - Sample rate mismatch, a failed read, or an analysis error
    pub fn run<S, F>(&mut self, source: &mut S, shutdown: &ShutdownToken, mut on_frame: F) -> Result<StopReason>
    where
        S: AudioSource,
        F: FnMut(&FrameResult, bool),
    {
        let outcome = self.run_frames(source, shutdown, &mut on_frame);
        if let Err(err) = source.stop() {
            log::warn!("Failed to stop audio source: {err}");
        }
        match &outcome {
            Ok(reason) => log::info!(
                "Session ended ({reason:?}) after {} frames",
                self.frames()
            ),
            Err(err) => log::error!("Session aborted after {} frames: {err}", self.frames()),
        }
        outcome
    }

    fn run_frames<S, F>(&mut self, source: &mut S, shutdown: &ShutdownToken, on_frame: &mut F) -> Result<StopReason>
    where
        S: AudioSource,
        F: FnMut(&FrameResult, bool),
    {
        let expected = self.analyzer.note_map().sample_rate();
        if source.sample_rate() != expected {
            return Err(TunerError::InvalidConfig(format!(
                "audio source runs at {} Hz, analyzer expects {expected} Hz",
                source.sample_rate()
            )));
        }

        source.start()?;
        log::info!("Session started: {} samples per frame", self.frame.len());
        loop {
            if shutdown.is_triggered() {
                return Ok(StopReason::Shutdown);
            }
            if self.max_frames.is_some_and(|limit| self.frames() >= limit) {
                return Ok(StopReason::FrameLimit);
            }

            let (result, accurate) = self.step(source)?;
            log::debug!(
                "Frame {}: {} ({:+.2} cents, delta {})",
                self.frames(),
                result.note_name,
                result.cents,
                result.nearest_note_delta
            );
            on_frame(&result, accurate);
        }
    }

    /// Frames analyzed so far.
    pub fn frames(&self) -> u32 {
        self.accumulator.state().total_frames
    }

    pub fn state(&self) -> &AccuracyState {
        self.accumulator.state()
    }

    pub fn analyzer(&self) -> &FrameAnalyzer<T> {
        &self.analyzer
    }

    pub fn report(&self) -> SessionReport {
        SessionReport::build(self.state(), self.miss_rate_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_clones_share_state() {
        let token = ShutdownToken::new();
        let handle = token.clone();
        assert!(!token.is_triggered());
        handle.trigger();
        assert!(token.is_triggered());
    }
}
