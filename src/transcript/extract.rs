use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::model::EngineSegment;

// @module: Flattening of engine segments into timestamped words

// @const: Bracketed or parenthesized non-speech markers, e.g. [*], (music), [BLANK_AUDIO]
static PLACEHOLDER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\[[^\]]*\]|\([^)]*\)|<\|[^|]*\|>)$").unwrap()
});

/// A spoken token with engine timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedWord {
    /// Token text, trimmed
    pub text: String,

    /// Start in seconds
    pub start_sec: f64,

    /// End in seconds, never before `start_sec`
    pub end_sec: f64,

    /// Index of the segment the word came from
    pub segment_index: usize,
}

impl TimedWord {
    /// Create a word; used by tests and callers that build transcripts by hand
    pub fn new(text: impl Into<String>, start_sec: f64, end_sec: f64) -> Self {
        Self {
            text: text.into(),
            start_sec,
            end_sec: end_sec.max(start_sec),
            segment_index: 0,
        }
    }
}

/// Whether a token is a disfluency or non-speech placeholder rather than a word
pub fn is_placeholder_token(token: &str) -> bool {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return true;
    }

    if PLACEHOLDER_REGEX.is_match(trimmed) {
        return true;
    }

    // Tokens with nothing pronounceable: "...", "-", "♪"
    !trimmed.chars().any(|c| c.is_alphanumeric())
}

/// Flatten segments into one ordered word list.
///
/// Segment order is trusted to be chronological, nothing is re-sorted.
pub fn extract_words(segments: &[EngineSegment]) -> Vec<TimedWord> {
    let mut words = Vec::new();
    let mut dropped = 0usize;

    for (segment_index, segment) in segments.iter().enumerate() {
        if segment.words.is_empty() {
            debug!("Segment {} has no word timestamps", segment_index);
            continue;
        }

        for word in &segment.words {
            if is_placeholder_token(&word.word) {
                dropped += 1;
                continue;
            }

            words.push(TimedWord {
                text: word.word.trim().to_string(),
                start_sec: word.start,
                end_sec: word.end.max(word.start),
                segment_index,
            });
        }
    }

    if dropped > 0 {
        debug!("Dropped {} placeholder tokens from transcript", dropped);
    }

    words
}
