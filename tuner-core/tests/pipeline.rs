use std::f64::consts::PI;

use tuner_core::accuracy::Accumulator;
use tuner_core::fft::{HannWindow, RustFftTransform, SpectrumTransform};
use tuner_core::filter::{FilterCoefficients, LowPassCascade};
use tuner_core::tuning::NoteFrequencyMap;
use tuner_core::{
    AudioError, BufferedSource, FrameAnalyzer, FrameBuffer, Session, SessionReport, ShutdownToken,
    StopReason, TunerConfig, TunerError,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sine(freq: f64, sample_rate: u32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|n| (2.0 * PI * freq * n as f64 / sample_rate as f64).sin() as f32 * 0.5)
        .collect()
}

fn config(sample_rate: u32) -> TunerConfig {
    TunerConfig {
        sample_rate,
        ..TunerConfig::default()
    }
}

#[test]
fn a4_on_a_bin_centre_is_exactly_in_tune() {
    init_logger();
    let config = config(8192);
    let mut analyzer = FrameAnalyzer::from_config(&config).unwrap();
    let mut frame = FrameBuffer::new(config.fft_size);
    frame.samples_mut().copy_from_slice(&sine(440.0, 8192, 8192));

    let result = analyzer.analyze(&mut frame).unwrap();
    assert_eq!(result.peak_bin, 440);
    assert_eq!(result.note_name, "A");
    assert_eq!(result.nearest_note_delta, 0);
    assert_eq!(result.cents, 0.0);
}

#[test]
fn a4_at_reference_rate_resolves_to_a() {
    init_logger();
    let config = TunerConfig::default();
    let mut analyzer = FrameAnalyzer::from_config(&config).unwrap();
    let mut frame = FrameBuffer::new(config.fft_size);
    frame.samples_mut().copy_from_slice(&sine(440.0, 8000, 8192));

    let result = analyzer.analyze(&mut frame).unwrap();
    assert_eq!(result.note_name, "A");
    assert_eq!(result.pitch_class, 9);
    assert_eq!(result.nearest_note_delta, 0);
    // bins are 0.977 Hz wide, so 440 Hz lands 1.7 cents sharp
    assert!(result.cents > 0.0 && result.cents < 2.0, "cents = {}", result.cents);
}

#[test]
fn low_e_string_resolves_to_e() {
    let config = TunerConfig::default();
    let mut analyzer = FrameAnalyzer::from_config(&config).unwrap();
    let mut frame = FrameBuffer::new(config.fft_size);
    frame.samples_mut().copy_from_slice(&sine(82.41, 8000, 8192));

    let result = analyzer.analyze(&mut frame).unwrap();
    assert_eq!(result.note_name, "E");
    assert!(result.cents.abs() < 25.0);
}

#[test]
fn session_stops_at_frame_limit() {
    init_logger();
    let config = TunerConfig::default();
    let mut source = BufferedSource::new(8000, sine(440.0, 8000, 8192 * 4));
    let mut session = Session::from_config(&config).unwrap().with_max_frames(Some(3));
    let mut notes = Vec::new();

    let reason = session
        .run(&mut source, &ShutdownToken::new(), |result, accurate| {
            notes.push((result.note_name, accurate));
        })
        .unwrap();

    assert_eq!(reason, StopReason::FrameLimit);
    assert_eq!(notes, vec![("A", true); 3]);
    assert!(source.is_stopped());

    let report = session.report();
    let summary = report.summary().unwrap();
    assert_eq!(summary.total_frames, 3);
    assert_eq!(summary.percent_accurate_whole(), 100);
    assert!(summary.notes_perfect() && summary.intervals_perfect());
}

#[test]
fn session_honours_shutdown_between_frames() {
    let config = TunerConfig::default();
    let mut source = BufferedSource::new(8000, sine(440.0, 8000, 8192 * 5));
    let mut session = Session::from_config(&config).unwrap();
    let shutdown = ShutdownToken::new();
    let trigger = shutdown.clone();
    let mut seen = 0;

    let reason = session
        .run(&mut source, &shutdown, |_, _| {
            seen += 1;
            if seen == 2 {
                trigger.trigger();
            }
        })
        .unwrap();

    assert_eq!(reason, StopReason::Shutdown);
    assert_eq!(session.frames(), 2);
    assert_eq!(source.remaining(), 8192 * 3);
}

#[test]
fn shutdown_before_first_frame_reports_no_inputs() {
    let config = TunerConfig::default();
    let mut source = BufferedSource::new(8000, sine(440.0, 8000, 8192));
    let mut session = Session::from_config(&config).unwrap();
    let shutdown = ShutdownToken::new();
    shutdown.trigger();

    let reason = session.run(&mut source, &shutdown, |_, _| panic!("no frame expected")).unwrap();
    assert_eq!(reason, StopReason::Shutdown);
    assert_eq!(session.report(), SessionReport::NoInputs);
}

#[test]
fn read_failure_ends_the_session_with_an_audio_error() {
    let config = TunerConfig::default();
    let mut source = BufferedSource::new(8000, sine(440.0, 8000, 8192 + 4096));
    let mut session = Session::from_config(&config).unwrap();

    let err = session.run(&mut source, &ShutdownToken::new(), |_, _| {}).unwrap_err();
    assert!(matches!(err, TunerError::Audio(AudioError::Disconnected)));
    assert_eq!(err.code(), 1005);
    assert_eq!(session.frames(), 1);
    assert!(source.is_stopped());
}

#[test]
fn audio_captured_before_start_is_not_scored() {
    init_logger();
    let config = TunerConfig::default();
    // two frames of E4 arrive while the user is still at the start prompt
    let mut source =
        BufferedSource::new(8000, sine(440.0, 8000, 8192 * 2)).with_pre_start(sine(329.63, 8000, 8192 * 2));
    let mut session = Session::from_config(&config).unwrap().with_max_frames(Some(2));
    let mut notes = Vec::new();

    let reason = session
        .run(&mut source, &ShutdownToken::new(), |result, _| notes.push(result.note_name))
        .unwrap();

    assert_eq!(reason, StopReason::FrameLimit);
    assert!(source.is_started());
    assert_eq!(notes, vec!["A", "A"]);
    assert_eq!(source.remaining(), 0);
    let state = session.state();
    assert_eq!(state.total_frames, 2);
    assert_eq!(state.played_notes[4], 0);
}

#[test]
fn zero_hz_frame_is_scored_as_a_miss_with_undefined_average() {
    let config = TunerConfig::default();
    let mut samples = sine(440.0, 8000, 8192);
    samples.extend(std::iter::repeat_n(0.001f32, 8192));
    samples.extend(sine(440.0, 8000, 8192));
    let mut source = BufferedSource::new(8000, samples);
    let mut session = Session::from_config(&config).unwrap().with_max_frames(Some(3));
    let mut frames = Vec::new();

    session
        .run(&mut source, &ShutdownToken::new(), |result, accurate| {
            frames.push((result.peak_bin, result.cents, accurate));
        })
        .unwrap();

    assert_eq!(frames.len(), 3);
    assert_eq!(frames[1].0, 0);
    assert_eq!(frames[1].1, f32::NEG_INFINITY);
    assert!(!frames[1].2);
    assert!(frames[0].2 && frames[2].2);

    let report = session.report();
    let summary = report.summary().unwrap();
    assert_eq!(summary.total_frames, 3);
    assert_eq!(summary.percent_accurate_whole(), 66);
    assert_eq!(summary.average_precision_whole(), None);
    let json = serde_json::to_value(&report).unwrap();
    assert!(json["average_precision"].is_null());
}

#[test]
fn mismatched_source_rate_is_rejected() {
    let config = TunerConfig::default();
    let mut source = BufferedSource::new(44100, vec![0.0; 8192]);
    let mut session = Session::from_config(&config).unwrap();
    let err = session.run(&mut source, &ShutdownToken::new(), |_, _| {}).unwrap_err();
    assert!(matches!(err, TunerError::InvalidConfig(_)));
}

#[test]
fn problem_notes_flag_above_half_misses() {
    let mut acc = Accumulator::new(10.0);
    // C: 10 plays, 6 misses; D: 10 plays, 4 misses
    for i in 0..10 {
        acc.record(0, if i < 6 { 30.0 } else { 1.0 });
    }
    for i in 0..10 {
        acc.record(2, if i < 4 { -30.0 } else { 1.0 });
    }
    let state = acc.into_state();
    let report = SessionReport::build(&state, 0.5);
    let summary = report.summary().unwrap();
    let flagged: Vec<_> = summary.problem_notes.iter().map(|n| n.name).collect();
    assert_eq!(flagged, vec!["C"]);
    assert_eq!(summary.problem_notes[0].miss_percent, 60);
}

#[test]
fn report_serializes_with_status_tag() {
    let json = serde_json::to_value(SessionReport::NoInputs).unwrap();
    assert_eq!(json["status"], "no_inputs");
}

/// Direct O(N²) DFT, used to check the analyzer against a second transform.
struct NaiveDft {
    len: usize,
}

impl SpectrumTransform for NaiveDft {
    fn len(&self) -> usize {
        self.len
    }

    fn forward(&mut self, real: &mut [f32], imaginary: &mut [f32]) {
        let n = self.len;
        let mut out = vec![(0.0_f64, 0.0_f64); n];
        for (k, slot) in out.iter_mut().enumerate() {
            for t in 0..n {
                let angle = -2.0 * PI * (k * t) as f64 / n as f64;
                let (re, im) = (real[t] as f64, imaginary[t] as f64);
                slot.0 += re * angle.cos() - im * angle.sin();
                slot.1 += re * angle.sin() + im * angle.cos();
            }
        }
        for (k, (re, im)) in out.into_iter().enumerate() {
            real[k] = re as f32;
            imaginary[k] = im as f32;
        }
    }
}

#[test]
fn analyzer_agrees_across_transform_implementations() {
    let (sample_rate, len) = (8000, 1024);
    let mut naive = FrameAnalyzer::new(
        LowPassCascade::new(FilterCoefficients::low_pass(sample_rate as f32, 330.0)),
        HannWindow::new(len),
        NaiveDft { len },
        NoteFrequencyMap::new(sample_rate, len).unwrap(),
    )
    .unwrap();
    let mut fast = FrameAnalyzer::new(
        LowPassCascade::new(FilterCoefficients::low_pass(sample_rate as f32, 330.0)),
        HannWindow::new(len),
        RustFftTransform::new(len),
        NoteFrequencyMap::new(sample_rate, len).unwrap(),
    )
    .unwrap();

    let samples = sine(196.0, sample_rate, len);
    let mut a = FrameBuffer::new(len);
    let mut b = FrameBuffer::new(len);
    a.samples_mut().copy_from_slice(&samples);
    b.samples_mut().copy_from_slice(&samples);

    let slow = naive.analyze(&mut a).unwrap();
    let quick = fast.analyze(&mut b).unwrap();
    assert_eq!(slow.peak_bin, quick.peak_bin);
    assert_eq!(slow.note_name, quick.note_name);
    assert_eq!(quick.note_name, "G");
}
