use log::{debug, warn};

use crate::app_config::AlignmentConfig;
use crate::transcript::TimedWord;

use super::matcher::{caption_tokens, words_match};
use super::SectionTiming;

/// Outcome of aligning all captions against one transcript
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentReport {
    /// Raw timings, one per caption, in caption order
    pub timings: Vec<SectionTiming>,

    /// Indices of sections that got the fixed-duration fallback
    pub fallback_sections: Vec<usize>,

    /// Inclusive word span consumed by each section, `None` for fallbacks
    pub spans: Vec<Option<(usize, usize)>>,

    // Consumption ledger: owner[i] is the section that consumed word i
    owner: Vec<Option<usize>>,
}

impl AlignmentReport {
    /// Section that consumed each word, indexed like the input words
    pub fn owners(&self) -> &[Option<usize>] {
        &self.owner
    }

    /// Whether every section was matched against the transcript
    pub fn fully_aligned(&self) -> bool {
        self.fallback_sections.is_empty()
    }

    /// Number of words consumed by any section
    pub fn consumed_count(&self) -> usize {
        self.owner.iter().filter(|o| o.is_some()).count()
    }
}

/// Sequential caption-to-transcript aligner.
///
/// Sections are matched in order against a cursor over the word slice.
/// The slice itself is never mutated; consumption is tracked in the
/// report's ownership ledger.
#[derive(Debug, Clone)]
pub struct SequentialAligner {
    search_window: usize,
    fallback_duration: f64,
}

impl Default for SequentialAligner {
    fn default() -> Self {
        Self::from_config(&AlignmentConfig::default())
    }
}

impl SequentialAligner {
    pub fn new(search_window: usize, fallback_duration: f64) -> Self {
        Self {
            search_window: search_window.max(1),
            fallback_duration,
        }
    }

    pub fn from_config(config: &AlignmentConfig) -> Self {
        Self::new(config.search_window, config.fallback_duration_secs)
    }

    /// Align every caption, in order, against the transcript words
    pub fn align<S: AsRef<str>>(&self, words: &[TimedWord], captions: &[S]) -> AlignmentReport {
        let mut cursor = 0usize;
        let mut owner: Vec<Option<usize>> = vec![None; words.len()];
        let mut timings = Vec::with_capacity(captions.len());
        let mut spans = Vec::with_capacity(captions.len());
        let mut fallback_sections = Vec::new();

        for (section, caption) in captions.iter().enumerate() {
            let tokens = caption_tokens(caption.as_ref());
            let previous_end = timings.last().map(|t: &SectionTiming| t.end).unwrap_or(0.0);

            let first = if tokens.is_empty() {
                None
            } else if section == 0 {
                self.find_first_word(words, cursor, &tokens)
            } else if cursor < words.len() {
                Some(cursor)
            } else {
                None
            };

            let Some(first) = first else {
                warn!(
                    "Section {} could not be aligned, using {:.1}s fallback",
                    section, self.fallback_duration
                );
                timings.push(SectionTiming::new(previous_end, previous_end + self.fallback_duration));
                spans.push(None);
                fallback_sections.push(section);
                continue;
            };

            let last = find_last_word(words, first, &tokens);
            for slot in owner.iter_mut().take(last + 1).skip(first) {
                *slot = Some(section);
            }
            cursor = last + 1;

            debug!(
                "Section {} aligned to words {}..={} ({:.3}s - {:.3}s)",
                section, first, last, words[first].start_sec, words[last].end_sec
            );

            timings.push(SectionTiming::new(words[first].start_sec, words[last].end_sec));
            spans.push(Some((first, last)));
        }

        AlignmentReport {
            timings,
            fallback_sections,
            spans,
            owner,
        }
    }

    // Earliest word within the window matching any caption token
    fn find_first_word(&self, words: &[TimedWord], cursor: usize, tokens: &[String]) -> Option<usize> {
        let window_end = cursor.saturating_add(self.search_window).min(words.len());

        (cursor..window_end).find(|&i| tokens.iter().any(|token| words_match(&words[i].text, token)))
    }
}

// Latest caption token that matches a word at or after `first`; falls back to `first`
fn find_last_word(words: &[TimedWord], first: usize, tokens: &[String]) -> usize {
    for token in tokens.iter().rev() {
        if let Some(found) = (first..words.len()).find(|&i| words_match(&words[i].text, token)) {
            return found;
        }
    }

    first
}
