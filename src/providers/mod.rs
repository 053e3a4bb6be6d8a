/*!
 * Speech-to-text providers.
 *
 * - `whisper`: HTTP client for the whisper worker
 * - `mock`: scripted transcriber for tests and offline runs
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::Path;

use crate::errors::TranscriptionError;
use crate::transcript::TranscriptionResponse;

/// Engine status as reported by its health endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineHealth {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default)]
    pub model_size: Option<String>,
}

/// Common trait for speech-to-text engines
///
/// Implementations return the engine's response as a typed union; turning
/// it into words is left to the transcript module.
#[async_trait]
pub trait Transcriber: Send + Sync + Debug {
    /// Transcribe an audio file with word-level timestamps
    ///
    /// # Arguments
    /// * `audio` - Local audio file
    /// * `language` - Optional ISO 639-1 hint
    async fn transcribe(&self, audio: &Path, language: Option<&str>) -> Result<TranscriptionResponse, TranscriptionError>;

    /// Check that the engine is reachable and has a model loaded
    async fn test_connection(&self) -> Result<EngineHealth, TranscriptionError>;
}

pub mod mock;
pub mod whisper;
