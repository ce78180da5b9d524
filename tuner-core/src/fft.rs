//! # Fast Fourier Transform (FFT) Module
//!
//! Windowing and the forward transform used by the frame analyzer.
//!
//! ## Features
//! - Precomputed Hann window applied in place
//! - `SpectrumTransform` seam so the analyzer does not depend on a
//!   particular FFT implementation
//! - RustFFT-backed transform with the plan and scratch built once

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// A precomputed Hann (raised-cosine) window.
///
/// The weights reach zero at both ends for frames longer than one sample,
/// which reduces spectral leakage from the frame edges.
#[derive(Debug, Clone)]
pub struct HannWindow {
    weights: Vec<f32>,
}

impl HannWindow {
    /// Builds `size` taper weights.
    ///
    /// A single-sample window is `[1.0]`; the raised-cosine formula has no
    /// value there.
    pub fn new(size: usize) -> Self {
        let weights = match size {
            0 => Vec::new(),
            1 => vec![1.0],
            _ => {
                let n_minus_1 = (size - 1) as f32;
                (0..size)
                    .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / n_minus_1).cos()))
                    .collect()
            }
        };
        Self { weights }
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// Multiplies `frame` by the window, element-wise.
    pub fn apply(&self, frame: &mut [f32]) {
        for (sample, weight) in frame.iter_mut().zip(&self.weights) {
            *sample *= weight;
        }
    }
}

/// A forward discrete Fourier transform over split real/imaginary buffers.
///
/// Implementations release their resources on drop.
pub trait SpectrumTransform {
    /// Transform length N.
    fn len(&self) -> usize;

    /// Transforms `real` + i·`imaginary` in place. Both slices have length N.
    fn forward(&mut self, real: &mut [f32], imaginary: &mut [f32]);
}

/// RustFFT-backed forward transform.
pub struct RustFftTransform {
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl RustFftTransform {
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(len);
        let scratch = vec![Complex::default(); fft.get_inplace_scratch_len()];
        Self {
            fft,
            buffer: vec![Complex::default(); len],
            scratch,
        }
    }
}

impl SpectrumTransform for RustFftTransform {
    fn len(&self) -> usize {
        self.buffer.len()
    }

    fn forward(&mut self, real: &mut [f32], imaginary: &mut [f32]) {
        for ((slot, &re), &im) in self.buffer.iter_mut().zip(real.iter()).zip(imaginary.iter()) {
            *slot = Complex { re, im };
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        for ((c, re), im) in self.buffer.iter().zip(real.iter_mut()).zip(imaginary.iter_mut()) {
            *re = c.re;
            *im = c.im;
        }
    }
}

impl std::fmt::Debug for RustFftTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustFftTransform")
            .field("len", &self.buffer.len())
            .finish()
    }
}
