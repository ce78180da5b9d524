//! # Chromatic Tuner - Terminal Front End
//!
//! Opens the default input device, waits for the user to start, then shows
//! the nearest note and its deviation for every frame until interrupted.
//! The practice report is printed when the session ends.
//!
//! ## Architecture
//! - **Main Thread**: session loop (read, analyze, score, draw)
//! - **Audio Thread**: cpal callback feeding a crossbeam channel
//! - **Signal Thread**: tokio runtime flipping the shutdown token

mod cli;
mod display;
mod signals;

use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tuner_core::{CpalSource, Session, SessionReport, ShutdownToken, TunerConfig, TunerError};

use cli::Cli;

const DEFAULT_CONFIG_FILE: &str = "chromatic-tuner.toml";

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    log::info!(
        "Tuning at {} Hz, {} samples per frame, low-pass at {} Hz",
        config.sample_rate,
        config.fft_size,
        config.cutoff_hz
    );

    // tables and FFT plan are built before the device is opened
    let mut session = Session::from_config(&config)
        .context("failed to build the analysis pipeline")?
        .with_max_frames(cli.max_frames);

    let mut source = CpalSource::open(config.sample_rate).map_err(TunerError::from)?;
    println!("Opening {}", source.device_name());

    if !cli.no_wait && !wait_for_start(io::stdin().lock())? {
        log::info!("Input closed before start, nothing recorded");
        return Ok(());
    }

    let shutdown = ShutdownToken::new();
    signals::spawn_signal_listener(shutdown.clone())?;

    let mut stdout = io::stdout();
    session.run(&mut source, &shutdown, |result, _accurate| {
        let _ = stdout.write_all(display::render_frame(result).as_bytes());
        let _ = stdout.flush();
    })?;

    print_report(&session.report(), cli.json)
}

/// Loads the config file (explicit path or the default file when present)
/// and applies command line overrides.
fn resolve_config(cli: &Cli) -> Result<TunerConfig> {
    let path = cli.config.clone().or_else(|| {
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        local.exists().then_some(local)
    });

    let mut config = match path {
        Some(path) => TunerConfig::load(&path)?,
        None => TunerConfig::default(),
    };

    if let Some(sample_rate) = cli.sample_rate {
        config.sample_rate = sample_rate;
    }
    if let Some(fft_size) = cli.fft_size {
        config.fft_size = fft_size;
    }
    if let Some(cutoff) = cli.cutoff {
        config.cutoff_hz = cutoff;
    }
    config.validate()?;
    Ok(config)
}

/// Blocks until an `r` is read. Returns `false` if input ends first.
fn wait_for_start(input: impl BufRead) -> Result<bool> {
    println!("Enter 'r' to start recording.");
    for byte in input.bytes() {
        if byte.context("failed to read from stdin")? == b'r' {
            return Ok(true);
        }
    }
    Ok(false)
}

fn print_report(report: &SessionReport, json: bool) -> Result<()> {
    if json {
        let text = serde_json::to_string_pretty(report).context("failed to serialize report")?;
        println!("{text}");
    } else {
        print!("{}", display::render_report(report));
    }
    Ok(())
}

fn report_error(err: &anyhow::Error) {
    match err.downcast_ref::<TunerError>() {
        Some(tuner_err) if matches!(tuner_err, TunerError::Audio(_)) => {
            eprintln!("An error occurred while using the audio stream");
            eprintln!("Error number: {}", tuner_err.code());
            eprintln!("Error message: {tuner_err}");
        }
        Some(tuner_err) => {
            eprintln!("Error number: {}", tuner_err.code());
            eprintln!("Error message: {err:#}");
        }
        None => eprintln!("Error: {err:#}"),
    }
}
