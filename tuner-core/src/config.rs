//! # Configuration Module
//!
//! Tuner settings with the reference constants as defaults. A TOML file may
//! override any of them; the reference pitch is not configurable.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, TunerError};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Capture rate in Hz.
    pub sample_rate: u32,
    /// Transform length, also the number of samples per frame.
    pub fft_size: usize,
    /// Low-pass cutoff in Hz.
    pub cutoff_hz: f32,
    /// A frame is accurate when `|cents|` is strictly below this.
    pub accuracy_threshold_cents: f32,
    /// Notes and intervals missed more often than this ratio are flagged.
    pub miss_rate_threshold: f32,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 8000,
            fft_size: 8192,
            cutoff_hz: 330.0,
            accuracy_threshold_cents: 10.0,
            miss_rate_threshold: 0.5,
        }
    }
}

impl TunerConfig {
    /// Reads and validates a TOML config file. Missing keys keep defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| TunerError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::parse(&contents, &path.display().to_string())?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Self::parse(contents, "<inline>")
    }

    fn parse(contents: &str, origin: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).map_err(|source| TunerError::ConfigParse {
            path: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the input domain the filter designer and note map rely on.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(TunerError::InvalidConfig("sample_rate must be positive".into()));
        }
        if !self.fft_size.is_power_of_two() || self.fft_size < 2 {
            return Err(TunerError::InvalidConfig(format!(
                "fft_size must be a power of two >= 2, got {}",
                self.fft_size
            )));
        }
        let nyquist = self.sample_rate as f32 / 2.0;
        if !(self.cutoff_hz > 0.0 && self.cutoff_hz < nyquist) {
            return Err(TunerError::InvalidConfig(format!(
                "cutoff_hz must be in (0, {nyquist}), got {}",
                self.cutoff_hz
            )));
        }
        if !(self.accuracy_threshold_cents > 0.0) {
            return Err(TunerError::InvalidConfig(
                "accuracy_threshold_cents must be positive".into(),
            ));
        }
        if !(self.miss_rate_threshold >= 0.0 && self.miss_rate_threshold <= 1.0) {
            return Err(TunerError::InvalidConfig(
                "miss_rate_threshold must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }
}
