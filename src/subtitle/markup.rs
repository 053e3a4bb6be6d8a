use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// @module: Inline caption markup parsing

// @const: Highlight and line-break tags, case-insensitive
static TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<h>|</h>|<br\s*/?>|</br>").unwrap());

/// One run of cue content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Segment {
    /// Text in the style's own colour
    Text(String),
    /// Text in the highlight colour
    Highlight(String),
    /// Forced line break
    LineBreak,
    /// Karaoke syllable lasting `centis` hundredths of a second
    Karaoke {
        centis: u32,
        text: String,
        highlighted: bool,
    },
}

impl Segment {
    fn text(&self) -> Option<&str> {
        match self {
            Self::Text(t) | Self::Highlight(t) => Some(t),
            Self::Karaoke { text, .. } => Some(text),
            Self::LineBreak => None,
        }
    }
}

// Collapse whitespace runs to one space, keeping a boundary space if present
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn push_run(segments: &mut Vec<Segment>, raw: &str, highlighted: bool) {
    let text = collapse_whitespace(raw);
    if text.is_empty() {
        return;
    }

    match (segments.last_mut(), highlighted) {
        (Some(Segment::Text(prev)), false) | (Some(Segment::Highlight(prev)), true) => prev.push_str(&text),
        (_, false) => segments.push(Segment::Text(text)),
        (_, true) => segments.push(Segment::Highlight(text)),
    }
}

fn trim_run(segment: &mut Segment, start: bool, end: bool) {
    if let Segment::Text(t) | Segment::Highlight(t) = segment {
        let mut trimmed: &str = t;
        if start {
            trimmed = trimmed.trim_start();
        }
        if end {
            trimmed = trimmed.trim_end();
        }
        *t = trimmed.to_string();
    }
}

/// Parse caption text into alternating normal and highlight runs.
///
/// `<h>` opens a highlight that runs until `</h>` or the end of the text.
/// A stray `</h>` is ignored. `<br>`, `<br/>` and `</br>` become line breaks.
pub fn parse_markup(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut highlighted = false;
    let mut last = 0;

    for tag in TAG_REGEX.find_iter(text) {
        push_run(&mut segments, &text[last..tag.start()], highlighted);

        match tag.as_str().to_lowercase().as_str() {
            "<h>" => highlighted = true,
            "</h>" => highlighted = false,
            _ => segments.push(Segment::LineBreak),
        }
        last = tag.end();
    }
    push_run(&mut segments, &text[last..], highlighted);

    // Trim at the edges and around breaks, and avoid double spaces between runs
    let count = segments.len();
    let mut previous_ends_with_space = true;
    for i in 0..count {
        let after_break = i == 0 || matches!(segments[i - 1], Segment::LineBreak);
        let before_break = i + 1 == count || matches!(segments[i + 1], Segment::LineBreak);
        trim_run(&mut segments[i], after_break || previous_ends_with_space, before_break);

        previous_ends_with_space = match segments[i].text() {
            Some(t) if !t.is_empty() => t.ends_with(' '),
            Some(_) => previous_ends_with_space,
            None => true,
        };
    }

    segments.retain(|s| s.text().map(|t| !t.is_empty()).unwrap_or(true));
    segments
}

/// Parse headline text, where literal newlines also break lines
pub fn parse_headline(text: &str) -> Vec<Segment> {
    let normalized = text.replace("\r\n", "\n").replace('\n', "<br>");
    parse_markup(&normalized)
}

/// Caption words with their highlight flag, ignoring line breaks
pub fn markup_words(text: &str) -> Vec<(String, bool)> {
    parse_markup(text)
        .iter()
        .flat_map(|segment| {
            let (run, highlighted) = match segment {
                Segment::Text(t) => (t.as_str(), false),
                Segment::Highlight(t) => (t.as_str(), true),
                _ => ("", false),
            };
            run.split_whitespace()
                .map(move |w| (w.to_string(), highlighted))
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Caption text with markup removed and whitespace normalized
pub fn plain_text(text: &str) -> String {
    parse_markup(text)
        .iter()
        .map(|s| s.text().unwrap_or(" "))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
