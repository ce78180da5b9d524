//! # Session Report Module
//!
//! Summarizes an [`AccuracyState`] at the end of a session: overall
//! accuracy, average precision, and the notes and intervals missed more
//! often than the configured ratio.

use serde::Serialize;

use crate::accuracy::{AccuracyState, PITCH_CLASSES};
use crate::tuning::NOTE_NAMES;

/// A note missed more often than the threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProblemNote {
    pub name: &'static str,
    pub played: u32,
    pub missed: u32,
    /// `100 * missed / played`, truncated.
    pub miss_percent: u32,
}

/// An ordered note pair missed more often than the threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProblemInterval {
    pub from: &'static str,
    pub to: &'static str,
    pub played: u32,
    pub missed: u32,
    pub miss_percent: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub total_frames: u32,
    pub percent_accurate: f32,
    /// Serialized as `null` in JSON when not finite.
    pub average_precision: f32,
    /// Empty when every note was played cleanly enough.
    pub problem_notes: Vec<ProblemNote>,
    pub problem_intervals: Vec<ProblemInterval>,
}

impl SessionSummary {
    /// Percent accurate, truncated toward zero.
    pub fn percent_accurate_whole(&self) -> i64 {
        self.percent_accurate as i64
    }

    /// Average precision score, truncated toward zero.
    ///
    /// # Returns
    /// * `Some(score)` - The truncated average
    /// * `None` - The average is not finite, which happens once any frame
    ///   peaked at 0 Hz (−∞ cents)
    pub fn average_precision_whole(&self) -> Option<i64> {
        self.average_precision
            .is_finite()
            .then_some(self.average_precision as i64)
    }

    pub fn notes_perfect(&self) -> bool {
        self.problem_notes.is_empty()
    }

    pub fn intervals_perfect(&self) -> bool {
        self.problem_intervals.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionReport {
    /// No frame was analyzed; there is nothing to average.
    NoInputs,
    Recorded(SessionSummary),
}

impl SessionReport {
    /// Summarizes a session.
    ///
    /// # Arguments
    /// * `state` - Final accumulator counters; `state.total_frames` is the
    ///   number of analyzed frames
    /// * `miss_rate_threshold` - Miss ratio above which a note or interval
    ///   is flagged
    ///
    /// # Returns
    /// * `NoInputs` - No frame was analyzed
    /// * `Recorded(summary)` - Percentages, average precision and the
    ///   flagged notes and intervals
    pub fn build(state: &AccuracyState, miss_rate_threshold: f32) -> Self {
        let total_frames = state.total_frames;
        if total_frames == 0 {
            return SessionReport::NoInputs;
        }

        let frames = total_frames as f32;
        let problem_notes = (0..PITCH_CLASSES)
            .filter(|&n| exceeds(state.missed_notes[n], state.played_notes[n], miss_rate_threshold))
            .map(|n| ProblemNote {
                name: NOTE_NAMES[n],
                played: state.played_notes[n],
                missed: state.missed_notes[n],
                miss_percent: miss_percent(state.missed_notes[n], state.played_notes[n]),
            })
            .collect();

        let mut problem_intervals = Vec::new();
        for from in 0..PITCH_CLASSES {
            for to in 0..PITCH_CLASSES {
                let played = state.played_intervals[from][to];
                let missed = state.missed_intervals[from][to];
                if exceeds(missed, played, miss_rate_threshold) {
                    problem_intervals.push(ProblemInterval {
                        from: NOTE_NAMES[from],
                        to: NOTE_NAMES[to],
                        played,
                        missed,
                        miss_percent: miss_percent(missed, played),
                    });
                }
            }
        }

        SessionReport::Recorded(SessionSummary {
            total_frames,
            percent_accurate: 100.0 * state.accurate_frames as f32 / frames,
            average_precision: state.score / frames,
            problem_notes,
            problem_intervals,
        })
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        match self {
            SessionReport::NoInputs => None,
            SessionReport::Recorded(summary) => Some(summary),
        }
    }
}

fn exceeds(missed: u32, played: u32, threshold: f32) -> bool {
    played > 0 && missed as f32 / played as f32 > threshold
}

fn miss_percent(missed: u32, played: u32) -> u32 {
    (100 * missed as u64 / played.max(1) as u64) as u32
}
