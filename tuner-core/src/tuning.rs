//! # Musical Tuning Module
//!
//! Equal-temperament note tables and the bin→note map used to resolve a
//! spectral peak to the nearest note.
//!
//! ## Features
//! - 127 chromatic semitones starting at C (≈8.18 Hz), A4 = 440 Hz fixed
//! - Sparse bin→note map built once per sample rate / transform length
//! - Cent deviation calculations

use once_cell::sync::Lazy;

use crate::error::{Result, TunerError};

/// Pitch-class names, indexed by `semitone % 12`.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Number of chromatic semitones considered when building the note map.
pub const SEMITONE_COUNT: usize = 127;

/// Concert pitch of A4 in Hz.
pub const REFERENCE_PITCH: f32 = 440.0;

/// Exact equal-temperament pitches of semitones `0..SEMITONE_COUNT`.
///
/// Semitone 9 is A at `REFERENCE_PITCH / 32`, so semitone 69 is A4.
static SEMITONE_PITCHES: Lazy<[f32; SEMITONE_COUNT]> = Lazy::new(|| {
    let mut pitches = [0.0; SEMITONE_COUNT];
    for (s, pitch) in pitches.iter_mut().enumerate() {
        *pitch = ((REFERENCE_PITCH as f64 / 32.0) * 2.0_f64.powf((s as f64 - 9.0) / 12.0)) as f32;
    }
    pitches
});

/// Exact pitch of a semitone in Hz. Panics if `semitone >= SEMITONE_COUNT`.
pub fn semitone_pitch(semitone: usize) -> f32 {
    SEMITONE_PITCHES[semitone]
}

/// Calculates the deviation from a target frequency in cents.
///
/// Positive values are sharp, negative values flat. 100 cents is one
/// equal-tempered semitone.
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// The note assigned to one frequency bin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEntry {
    /// Chromatic semitone index, 0..127.
    pub semitone: u8,
    pub name: &'static str,
    /// Exact equal-temperament pitch in Hz.
    pub pitch: f32,
}

impl NoteEntry {
    pub fn pitch_class(&self) -> usize {
        self.semitone as usize % 12
    }
}

/// Maps each transform bin to the nearest equal-tempered note, if any.
///
/// Every semitone at or below Nyquist is assigned to the bin whose centre
/// frequency is closest to it. When two semitones land on the same bin the
/// higher one wins.
#[derive(Debug, Clone, PartialEq)]
pub struct NoteFrequencyMap {
    sample_rate: u32,
    bin_frequencies: Vec<f32>,
    entries: Vec<Option<NoteEntry>>,
}

impl NoteFrequencyMap {
    pub fn new(sample_rate: u32, fft_size: usize) -> Result<Self> {
        let bin_frequencies: Vec<f32> = (0..fft_size)
            .map(|i| (sample_rate as f32 * i as f32) / fft_size as f32)
            .collect();
        let mut entries = vec![None; fft_size];
        let nyquist = sample_rate as f32 / 2.0;

        for semitone in 0..SEMITONE_COUNT {
            let pitch = semitone_pitch(semitone);
            if pitch > nyquist {
                break;
            }

            let Some(index) = closest_bin(&bin_frequencies, pitch) else {
                break;
            };
            entries[index] = Some(NoteEntry {
                semitone: semitone as u8,
                name: NOTE_NAMES[semitone % 12],
                pitch,
            });
        }

        if entries.iter().all(Option::is_none) {
            return Err(TunerError::EmptyNoteMap {
                sample_rate,
                fft_size,
            });
        }

        let mapped = entries.iter().filter(|e| e.is_some()).count();
        log::debug!("Note map: {mapped} of {fft_size} bins mapped at {sample_rate} Hz");

        Ok(Self {
            sample_rate,
            bin_frequencies,
            entries,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Transform length N.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Centre frequency of `bin` in Hz.
    pub fn bin_frequency(&self, bin: usize) -> f32 {
        self.bin_frequencies[bin]
    }

    pub fn entry(&self, bin: usize) -> Option<&NoteEntry> {
        self.entries.get(bin).and_then(Option::as_ref)
    }

    /// Iterates over `(bin, entry)` for every mapped bin, lowest first.
    pub fn mapped(&self) -> impl Iterator<Item = (usize, &NoteEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(bin, entry)| entry.as_ref().map(|e| (bin, e)))
    }

    /// Finds the mapped bin nearest to `peak`, returned as a signed offset.
    ///
    /// At each distance the bin below the peak is tried before the bin
    /// above, so equidistant candidates resolve downward. Offset 0 means the
    /// peak bin itself is mapped. Returns `None` when the map has no notes
    /// or `peak` lies outside the transform.
    pub fn nearest_note_offset(&self, peak: usize) -> Option<isize> {
        let len = self.entries.len();
        if peak >= len {
            return None;
        }
        for delta in 0..len {
            if delta < peak && self.entries[peak - delta].is_some() {
                return Some(-(delta as isize));
            }
            if peak + delta < len && self.entries[peak + delta].is_some() {
                return Some(delta as isize);
            }
        }
        None
    }
}

/// Brute-force search for the bin closest to `pitch`; first minimum wins.
fn closest_bin(bin_frequencies: &[f32], pitch: f32) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &freq) in bin_frequencies.iter().enumerate() {
        let diff = (freq - pitch).abs();
        if best.is_none_or(|(_, min)| diff < min) {
            best = Some((index, diff));
        }
    }
    best.map(|(index, _)| index)
}
