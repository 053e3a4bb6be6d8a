/*!
 * Caption-to-transcript alignment.
 *
 * - `matcher`: token normalization and the word-matching heuristic
 * - `aligner`: sequential section alignment over a word cursor
 * - `normalizer`: rebasing, contiguity and drift correction
 */

use serde::{Deserialize, Serialize};

pub use self::aligner::{AlignmentReport, SequentialAligner};
pub use self::normalizer::{TimingNormalizer, MIN_SECTION_SECS};

pub mod aligner;
pub mod matcher;
pub mod normalizer;

/// Start, end and duration of one section, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectionTiming {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
}

impl SectionTiming {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            duration: end - start,
        }
    }
}

/// Split `total` seconds across sections in proportion to caption length.
///
/// Used when no transcript is available. Empty captions weigh as one
/// character so every section gets some time.
pub fn proportional_timings<S: AsRef<str>>(captions: &[S], total: f64) -> Vec<SectionTiming> {
    let weights: Vec<f64> = captions
        .iter()
        .map(|c| matcher::caption_tokens(c.as_ref()).join(" ").chars().count().max(1) as f64)
        .collect();
    let sum: f64 = weights.iter().sum();

    let mut cursor = 0.0;
    weights
        .iter()
        .map(|w| {
            let duration = total * w / sum;
            let timing = SectionTiming::new(cursor, cursor + duration);
            cursor += duration;
            timing
        })
        .collect()
}

/// Lay measured durations end to end, starting at zero
pub fn sequential_timings(durations: &[f64]) -> Vec<SectionTiming> {
    let mut cursor = 0.0;
    durations
        .iter()
        .map(|d| {
            let timing = SectionTiming::new(cursor, cursor + d);
            cursor += d;
            timing
        })
        .collect()
}
