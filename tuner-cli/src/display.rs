//! # Terminal Display
//!
//! Live per-frame readout and the end-of-session report.

use std::fmt::Write;

use tuner_core::{FrameResult, SessionReport};

/// Width of each half of the deviation bar, in columns.
/// One column per cent, so the bar saturates at ±30 cents.
const BAR_WIDTH: usize = 30;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[1;1H";

/// Renders one frame, including the escape sequence that clears the
/// previous render.
pub fn render_frame(result: &FrameResult) -> String {
    let mut out = String::from(CLEAR_SCREEN);
    let _ = writeln!(out, "Nearest Note: {}", result.note_name);

    let off_note = result.nearest_note_delta != 0;
    if off_note {
        if result.cents > 0.0 {
            let _ = writeln!(out, "{:.6} cents sharp.", result.cents);
        } else if result.cents < 0.0 {
            let _ = writeln!(out, "{:.6} cents flat.", -result.cents);
        }
    } else {
        out.push_str("in tune!\n");
    }
    out.push('\n');
    out.push_str(&render_bar(result.note_name, off_note, result.cents));
    out.push('\n');
    out
}

/// `=` fills to the left of the note name when flat and to the right when
/// sharp. A frame whose peak bin is itself a note shows an empty bar.
pub fn render_bar(note_name: &str, off_note: bool, cents: f32) -> String {
    let flat = if off_note && cents < 0.0 { bar_len(-cents) } else { 0 };
    let sharp = if off_note && cents > 0.0 { bar_len(cents) } else { 0 };

    let mut bar = String::with_capacity(2 * BAR_WIDTH + 4);
    bar.push_str(&" ".repeat(BAR_WIDTH - flat));
    bar.push_str(&"=".repeat(flat));
    let _ = write!(bar, " {note_name:>2} ");
    bar.push_str(&"=".repeat(sharp));
    bar
}

fn bar_len(cents: f32) -> usize {
    if cents.is_nan() {
        return 0;
    }
    (cents.ceil() as usize).min(BAR_WIDTH)
}

/// Renders the end-of-session summary as text.
pub fn render_report(report: &SessionReport) -> String {
    let Some(summary) = report.summary() else {
        return "No inputs recorded.\n".to_string();
    };

    let mut out = String::new();
    let _ = writeln!(out, "Session summary ({} frames)", summary.total_frames);
    let _ = writeln!(out, "Accurate: {}%", summary.percent_accurate_whole());
    match summary.average_precision_whole() {
        Some(score) => {
            let _ = writeln!(out, "Average precision score: {score}");
        }
        // a 0 Hz peak is -inf cents away from every note
        None => {
            let _ = writeln!(
                out,
                "Average precision score: {} (a frame had no pitch)",
                summary.average_precision
            );
        }
    }
    out.push('\n');

    if summary.notes_perfect() {
        out.push_str("Notes: perfect!\n");
    } else {
        out.push_str("Notes to practice:\n");
        for note in &summary.problem_notes {
            let _ = writeln!(
                out,
                "  {:<2}  missed {} of {} ({}%)",
                note.name, note.missed, note.played, note.miss_percent
            );
        }
    }

    if summary.intervals_perfect() {
        out.push_str("Intervals: perfect!\n");
    } else {
        out.push_str("Intervals to practice:\n");
        for interval in &summary.problem_intervals {
            let _ = writeln!(
                out,
                "  {:<2} -> {:<2}  missed {} of {} ({}%)",
                interval.from, interval.to, interval.missed, interval.played, interval.miss_percent
            );
        }
    }
    out
}
