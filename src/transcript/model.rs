/*!
 * Speech-to-text response shapes.
 *
 * The engine may answer with a verbose transcript (segments with optional
 * word arrays), a `{ "text": ... }` object, or a bare JSON string. Responses
 * are validated here, at the boundary, so the extractor and the aligner only
 * ever see a typed transcript.
 */

use serde::{Deserialize, Serialize};

use crate::errors::TranscriptionError;

/// A single word with engine timestamps, as sent by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineWord {
    /// Token text; whisper calls it `word`, other engines `text`
    #[serde(alias = "text")]
    pub word: String,

    /// Start in seconds
    pub start: f64,

    /// End in seconds
    pub end: f64,
}

/// A transcript segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSegment {
    /// Segment start in seconds
    #[serde(default)]
    pub start: f64,

    /// Segment end in seconds
    #[serde(default)]
    pub end: f64,

    /// Segment text
    #[serde(default)]
    pub text: String,

    /// Word-level timestamps, absent when the engine ran without them
    #[serde(default)]
    pub words: Vec<EngineWord>,
}

/// Full transcript with segment structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerboseTranscript {
    /// Full text
    #[serde(default)]
    pub text: String,

    /// Detected or forced language
    #[serde(default)]
    pub language: Option<String>,

    /// Ordered segments
    pub segments: Vec<EngineSegment>,
}

/// Text-only transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlainTranscript {
    /// Full text
    pub text: String,
}

/// Every response shape the engine is known to produce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TranscriptionResponse {
    /// `{ segments: [...] }`
    Verbose(VerboseTranscript),
    /// `{ text: "..." }`
    Plain(PlainTranscript),
    /// `"..."`
    Bare(String),
}

impl TranscriptionResponse {
    /// Parse a raw engine payload.
    ///
    /// An object carrying `segments` must be a well-formed verbose
    /// transcript; it never degrades to the text-only shape.
    pub fn from_json(raw: &str) -> Result<Self, TranscriptionError> {
        let parse_error = |e: serde_json::Error| TranscriptionError::ParseError(e.to_string());
        let value: serde_json::Value = serde_json::from_str(raw).map_err(parse_error)?;

        if value.get("segments").is_some() {
            return serde_json::from_value::<VerboseTranscript>(value)
                .map(Self::Verbose)
                .map_err(parse_error);
        }
        serde_json::from_value(value).map_err(parse_error)
    }

    /// Full transcript text regardless of shape
    pub fn text(&self) -> String {
        match self {
            Self::Verbose(v) if !v.text.trim().is_empty() => v.text.trim().to_string(),
            Self::Verbose(v) => v
                .segments
                .iter()
                .map(|s| s.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
            Self::Plain(p) => p.text.trim().to_string(),
            Self::Bare(s) => s.trim().to_string(),
        }
    }

    /// Segments with word timestamps, or an error for shapes that carry none
    pub fn segments(&self) -> Result<&[EngineSegment], TranscriptionError> {
        match self {
            Self::Verbose(v) => Ok(&v.segments),
            _ => Err(TranscriptionError::MissingWordTimestamps),
        }
    }
}
