//! # Low-Pass Filter Module
//!
//! Second-order IIR low-pass used to suppress harmonics above the playing
//! range before the spectrum is taken. Two identical stages are cascaded
//! for a steeper roll-off.

use std::f32::consts::PI;

/// Biquad coefficients, normalized by `1 + alpha`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterCoefficients {
    /// Feedback coefficients.
    pub a: [f32; 2],
    /// Feed-forward coefficients.
    pub b: [f32; 3],
}

impl FilterCoefficients {
    /// Designs a second-order low-pass for `cutoff` Hz at `sample_rate` Hz.
    ///
    /// The damping is widened by √2 relative to a Butterworth Q, trading
    /// passband flatness for stronger harmonic suppression.
    ///
    /// Callers must ensure `0 < cutoff < sample_rate / 2`.
    pub fn low_pass(sample_rate: f32, cutoff: f32) -> Self {
        let w0 = 2.0 * PI * cutoff / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / 2.0 * 2.0_f32.sqrt();
        let a0 = 1.0 + alpha;

        let b0 = ((1.0 - cos_w0) / 2.0) / a0;
        Self {
            a: [(-2.0 * cos_w0) / a0, (1.0 - alpha) / a0],
            b: [b0, (1.0 - cos_w0) / a0, b0],
        }
    }
}

/// History of one filter stage: `[x[n-1], x[n-2], y[n-1], y[n-2]]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FilterState([f32; 4]);

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters one sample. Must be called in temporal order.
    pub fn process(&mut self, x: f32, coeffs: &FilterCoefficients) -> f32 {
        let mem = &mut self.0;
        let y = coeffs.b[0] * x + coeffs.b[1] * mem[0] + coeffs.b[2] * mem[1]
            - coeffs.a[0] * mem[2]
            - coeffs.a[1] * mem[3];

        mem[1] = mem[0];
        mem[0] = x;
        mem[3] = mem[2];
        mem[2] = y;

        y
    }

    pub fn history(&self) -> [f32; 4] {
        self.0
    }
}

/// Two cascaded stages sharing one coefficient set.
#[derive(Debug, Clone)]
pub struct LowPassCascade {
    coeffs: FilterCoefficients,
    stages: [FilterState; 2],
}

impl LowPassCascade {
    pub fn new(coeffs: FilterCoefficients) -> Self {
        Self {
            coeffs,
            stages: [FilterState::new(); 2],
        }
    }

    pub fn coefficients(&self) -> &FilterCoefficients {
        &self.coeffs
    }

    pub fn process_sample(&mut self, x: f32) -> f32 {
        let y = self.stages[0].process(x, &self.coeffs);
        self.stages[1].process(y, &self.coeffs)
    }

    /// Filters a frame in place. State carries over into the next frame.
    pub fn process_frame(&mut self, frame: &mut [f32]) {
        for sample in frame.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }
}
