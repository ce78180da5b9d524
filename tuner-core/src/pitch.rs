//! # Pitch Detection Module
//!
//! Turns one frame of raw samples into the nearest note and its cent
//! deviation: low-pass, Hann window, forward FFT, strongest bin in the
//! non-redundant half of the spectrum, then the nearest mapped note.

use serde::Serialize;

use crate::config::TunerConfig;
use crate::error::{Result, TunerError};
use crate::fft::{HannWindow, RustFftTransform, SpectrumTransform};
use crate::filter::{FilterCoefficients, LowPassCascade};
use crate::tuning::{calculate_cents_deviation, NoteFrequencyMap};

/// Sample storage reused for every frame of a session.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    samples: Vec<f32>,
    imaginary: Vec<f32>,
}

impl FrameBuffer {
    pub fn new(len: usize) -> Self {
        Self {
            samples: vec![0.0; len],
            imaginary: vec![0.0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Destination for the next frame read from the audio source.
    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    pub fn imaginary(&self) -> &[f32] {
        &self.imaginary
    }
}

/// Outcome of analyzing one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameResult {
    pub note_name: &'static str,
    /// 0 = C … 11 = B.
    pub pitch_class: usize,
    /// Strongest bin in the lower half of the spectrum.
    pub peak_bin: usize,
    /// Signed offset from `peak_bin` to the bin of the resolved note.
    pub nearest_note_delta: isize,
    /// Centre frequency of `peak_bin` in Hz.
    pub detected_frequency: f32,
    /// Exact pitch of the resolved note in Hz.
    pub note_pitch: f32,
    /// Positive = sharp, negative = flat.
    pub cents: f32,
}

/// Runs the per-frame pipeline. The filter history carries across frames;
/// everything else is recomputed each call.
#[derive(Debug)]
pub struct FrameAnalyzer<T: SpectrumTransform = RustFftTransform> {
    cascade: LowPassCascade,
    window: HannWindow,
    transform: T,
    note_map: NoteFrequencyMap,
}

impl FrameAnalyzer<RustFftTransform> {
    /// Builds the filter, window, FFT plan and note map for `config`.
    pub fn from_config(config: &TunerConfig) -> Result<Self> {
        config.validate()?;
        let coeffs = FilterCoefficients::low_pass(config.sample_rate as f32, config.cutoff_hz);
        Self::new(
            LowPassCascade::new(coeffs),
            HannWindow::new(config.fft_size),
            RustFftTransform::new(config.fft_size),
            NoteFrequencyMap::new(config.sample_rate, config.fft_size)?,
        )
    }
}

impl<T: SpectrumTransform> FrameAnalyzer<T> {
    pub fn new(
        cascade: LowPassCascade,
        window: HannWindow,
        transform: T,
        note_map: NoteFrequencyMap,
    ) -> Result<Self> {
        let expected = note_map.len();
        for actual in [window.len(), transform.len()] {
            if actual != expected {
                return Err(TunerError::FrameLength { expected, actual });
            }
        }
        Ok(Self {
            cascade,
            window,
            transform,
            note_map,
        })
    }

    /// Transform length, which is also the frame length.
    pub fn frame_len(&self) -> usize {
        self.note_map.len()
    }

    pub fn note_map(&self) -> &NoteFrequencyMap {
        &self.note_map
    }

    /// Analyzes the samples currently in `frame`. The buffer is overwritten
    /// with the real part of the spectrum.
    ///
    /// # Arguments
    ///
    /// * `frame` - One frame of raw samples, exactly [`Self::frame_len`] long.
    ///
    /// # Returns
    ///
    /// The detected note and deviation, or [`TunerError::FrameLength`] when
    /// the buffer has the wrong length.
    pub fn analyze(&mut self, frame: &mut FrameBuffer) -> Result<FrameResult> {
        if frame.len() != self.frame_len() {
            return Err(TunerError::FrameLength {
                expected: self.frame_len(),
                actual: frame.len(),
            });
        }

        self.cascade.process_frame(&mut frame.samples);
        self.window.apply(&mut frame.samples);

        frame.imaginary.fill(0.0);
        self.transform.forward(&mut frame.samples, &mut frame.imaginary);

        let peak_bin = find_peak_bin(&frame.samples, &frame.imaginary);
        resolve_peak(&self.note_map, peak_bin)
    }
}

/// Index of the largest squared magnitude among bins `0..N/2`.
/// The first maximum wins.
pub fn find_peak_bin(real: &[f32], imaginary: &[f32]) -> usize {
    let half = real.len().min(imaginary.len()) / 2;
    let mut max_val = -1.0_f32;
    let mut max_index = 0;
    for (j, (re, im)) in real[..half].iter().zip(&imaginary[..half]).enumerate() {
        let v = re * re + im * im;
        if v > max_val {
            max_val = v;
            max_index = j;
        }
    }
    max_index
}

/// Resolves a peak bin to the nearest mapped note and its cent deviation.
///
/// The deviation is measured from the peak bin's frequency, not from the
/// resolved bin's.
///
/// # Arguments
///
/// * `note_map` - Bin-to-note map for the analyzer's sample rate and length.
/// * `peak_bin` - Strongest bin of the spectrum.
///
/// # Returns
///
/// The resolved frame, or [`TunerError::UnresolvedPeak`] when `peak_bin` is
/// outside the map or no mapped bin can be reached from it.
pub fn resolve_peak(note_map: &NoteFrequencyMap, peak_bin: usize) -> Result<FrameResult> {
    if peak_bin >= note_map.len() {
        return Err(TunerError::UnresolvedPeak { peak_bin });
    }
    let delta = note_map
        .nearest_note_offset(peak_bin)
        .ok_or(TunerError::UnresolvedPeak { peak_bin })?;
    let note_bin = peak_bin.checked_add_signed(delta).ok_or(TunerError::UnresolvedPeak { peak_bin })?;
    let entry = note_map
        .entry(note_bin)
        .ok_or(TunerError::UnresolvedPeak { peak_bin })?;

    let detected_frequency = note_map.bin_frequency(peak_bin);
    Ok(FrameResult {
        note_name: entry.name,
        pitch_class: entry.pitch_class(),
        peak_bin,
        nearest_note_delta: delta,
        detected_frequency,
        note_pitch: entry.pitch,
        cents: calculate_cents_deviation(detected_frequency, entry.pitch),
    })
}
