//! # Accuracy Module
//!
//! Per-note and per-interval practice statistics accumulated over a session.

use serde::Serialize;

/// Number of pitch classes.
pub const PITCH_CLASSES: usize = 12;

/// Counters gathered over a session. Intervals are indexed
/// `[previous][current]` by pitch class.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccuracyState {
    pub played_notes: [u32; PITCH_CLASSES],
    pub missed_notes: [u32; PITCH_CLASSES],
    pub played_intervals: [[u32; PITCH_CLASSES]; PITCH_CLASSES],
    pub missed_intervals: [[u32; PITCH_CLASSES]; PITCH_CLASSES],
    /// Sum of `100 - |cents|` over all frames. Not clamped.
    pub score: f32,
    pub accurate_frames: u32,
    pub total_frames: u32,
}

/// Updates an [`AccuracyState`] once per analyzed frame.
#[derive(Debug, Clone)]
pub struct Accumulator {
    state: AccuracyState,
    previous: Option<usize>,
    threshold_cents: f32,
}

impl Accumulator {
    pub fn new(threshold_cents: f32) -> Self {
        Self {
            state: AccuracyState::default(),
            previous: None,
            threshold_cents,
        }
    }

    /// Records one frame and returns whether it was accurate.
    ///
    /// `pitch_class` must be below [`PITCH_CLASSES`]. An interval is counted
    /// only when the previous frame had a different pitch class.
    pub fn record(&mut self, pitch_class: usize, cents: f32) -> bool {
        let note = pitch_class % PITCH_CLASSES;
        let interval = self.previous.filter(|&prev| prev != note);
        let state = &mut self.state;

        state.total_frames += 1;
        state.played_notes[note] += 1;
        if let Some(prev) = interval {
            state.played_intervals[prev][note] += 1;
        }

        let deviation = cents.abs();
        let accurate = deviation < self.threshold_cents;
        if accurate {
            state.accurate_frames += 1;
        } else {
            state.missed_notes[note] += 1;
            if let Some(prev) = interval {
                state.missed_intervals[prev][note] += 1;
            }
        }

        state.score += 100.0 - deviation;
        self.previous = Some(note);
        accurate
    }

    pub fn previous(&self) -> Option<usize> {
        self.previous
    }

    pub fn state(&self) -> &AccuracyState {
        &self.state
    }

    pub fn into_state(self) -> AccuracyState {
        self.state
    }
}
