//! Note ranges and frequency-to-note classification.
//!
//! A note here is just a configured label over a frequency interval.
//! Classification scans the table in configuration order and returns
//! the first match; because overlapping ranges are rejected when the
//! table is built, the order can never change the answer.

use serde::Deserialize;

use crate::error::{Error, Result};

/// A named half-open frequency interval [low, high) in Hz.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NoteRange {
    pub note: String,
    pub low_hz: f64,
    pub high_hz: f64,
}

impl NoteRange {
    pub fn new(note: &str, low_hz: f64, high_hz: f64) -> Self {
        Self {
            note: note.to_string(),
            low_hz,
            high_hz,
        }
    }

    fn contains(&self, hz: f64) -> bool {
        self.low_hz <= hz && hz < self.high_hz
    }

    fn overlaps(&self, other: &NoteRange) -> bool {
        self.low_hz < other.high_hz && other.low_hz < self.high_hz
    }
}

/// Ordered, validated classification table.
#[derive(Debug, Clone)]
pub struct NoteTable {
    ranges: Vec<NoteRange>,
}

impl NoteTable {
    /// Build a table, rejecting empty labels, inverted intervals, and
    /// any pairwise overlap.
    pub fn new(ranges: Vec<NoteRange>) -> Result<Self> {
        for range in &ranges {
            if range.note.is_empty() {
                return Err(Error::Config(format!(
                    "unnamed note range [{}, {})",
                    range.low_hz, range.high_hz
                )));
            }
            if !(range.low_hz < range.high_hz) {
                return Err(Error::Config(format!(
                    "note {:?} has inverted interval [{}, {})",
                    range.note, range.low_hz, range.high_hz
                )));
            }
        }
        for (i, a) in ranges.iter().enumerate() {
            for b in &ranges[i + 1..] {
                if a.overlaps(b) {
                    return Err(Error::Config(format!(
                        "note ranges {:?} and {:?} overlap",
                        a.note, b.note
                    )));
                }
            }
        }
        Ok(Self { ranges })
    }

    /// Map a frequency estimate to its note label, if any.
    ///
    /// Absent estimates and frequencies outside every range classify to
    /// `None`. Pure: no state, same answer for the same input.
    pub fn classify(&self, freq: Option<f64>) -> Option<&str> {
        let hz = freq?;
        self.ranges
            .iter()
            .find(|r| r.contains(hz))
            .map(|r| r.note.as_str())
    }

    pub fn ranges(&self) -> &[NoteRange] {
        &self.ranges
    }
}
