/*!
 * Mock transcriber for testing.
 *
 * - `MockTranscriber::with_words()` - Always answers with the given words in one segment
 * - `MockTranscriber::text_only()` - Answers without word timestamps
 * - `MockTranscriber::failing()` - Always fails with a connection error
 */

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::TranscriptionError;
use crate::providers::{EngineHealth, Transcriber};
use crate::transcript::model::{EngineSegment, EngineWord, PlainTranscript, VerboseTranscript};
use crate::transcript::TranscriptionResponse;

/// Behavior mode for the mock transcriber
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Returns a verbose transcript with these words
    Words(Vec<(String, f64, f64)>),
    /// Returns only plain text
    TextOnly(String),
    /// Always fails
    Failing,
}

/// Scripted transcriber
#[derive(Debug, Clone)]
pub struct MockTranscriber {
    behavior: MockBehavior,
    request_count: Arc<AtomicUsize>,
}

impl MockTranscriber {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_words(words: &[(&str, f64, f64)]) -> Self {
        Self::new(MockBehavior::Words(
            words.iter().map(|(w, s, e)| (w.to_string(), *s, *e)).collect(),
        ))
    }

    pub fn text_only(text: &str) -> Self {
        Self::new(MockBehavior::TextOnly(text.to_string()))
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Number of transcribe calls so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, _audio: &Path, _language: Option<&str>) -> Result<TranscriptionResponse, TranscriptionError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            MockBehavior::Words(words) => {
                let engine_words: Vec<EngineWord> = words
                    .iter()
                    .map(|(w, s, e)| EngineWord { word: w.clone(), start: *s, end: *e })
                    .collect();
                let text = words.iter().map(|(w, _, _)| w.as_str()).collect::<Vec<_>>().join(" ");

                Ok(TranscriptionResponse::Verbose(VerboseTranscript {
                    text: text.clone(),
                    language: None,
                    segments: vec![EngineSegment {
                        start: engine_words.first().map(|w| w.start).unwrap_or(0.0),
                        end: engine_words.last().map(|w| w.end).unwrap_or(0.0),
                        text,
                        words: engine_words,
                    }],
                }))
            }
            MockBehavior::TextOnly(text) => Ok(TranscriptionResponse::Plain(PlainTranscript { text: text.clone() })),
            MockBehavior::Failing => Err(TranscriptionError::ConnectionError("mock engine offline".to_string())),
        }
    }

    async fn test_connection(&self) -> Result<EngineHealth, TranscriptionError> {
        match self.behavior {
            MockBehavior::Failing => Err(TranscriptionError::ConnectionError("mock engine offline".to_string())),
            _ => Ok(EngineHealth {
                status: "healthy".to_string(),
                model_loaded: true,
                model_size: Some("mock".to_string()),
            }),
        }
    }
}
