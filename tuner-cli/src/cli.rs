use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "chromatic-tuner", about = "Chromatic tuner with practice accuracy statistics")]
pub struct Cli {
    /// TOML config file (defaults to ./chromatic-tuner.toml when present)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Capture sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Transform length in samples (power of two); also the frame length
    #[arg(long)]
    pub fft_size: Option<usize>,

    /// Low-pass cutoff in Hz
    #[arg(long)]
    pub cutoff: Option<f32>,

    /// Stop after this many frames
    #[arg(long)]
    pub max_frames: Option<u32>,

    /// Start recording immediately instead of waiting for 'r'
    #[arg(long)]
    pub no_wait: bool,

    /// Print the session report as JSON
    #[arg(long)]
    pub json: bool,
}
