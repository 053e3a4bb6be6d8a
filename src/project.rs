use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app_config::{CaptionMode, SubtitleFormat};
use crate::errors::AppError;

// @module: Render request manifest

/// One user-supplied section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionInput {
    // @field: 1-based position in the final video
    pub order: u32,

    // @field: Caption text, may carry <h> and <br> markup
    #[serde(default, alias = "caption_text")]
    pub caption: String,

    // @field: Image or video, local path or URL
    #[serde(alias = "media_ref")]
    pub media: String,

    // @field: Section's own audio, required when there is no narration
    #[serde(default, alias = "audio_ref")]
    pub audio: Option<String>,
}

/// A complete render request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderRequest {
    // @field: Full narration track
    #[serde(default)]
    pub narration: Option<String>,

    pub sections: Vec<SectionInput>,

    // @field: Optional overlay text, newlines become line breaks
    #[serde(default)]
    pub headline: Option<String>,

    // @field: Overrides the configured caption mode
    #[serde(default)]
    pub caption_mode: Option<CaptionMode>,

    // @field: Overrides the configured subtitle format
    #[serde(default)]
    pub caption_format: Option<SubtitleFormat>,

    // @field: Fail instead of falling back when transcription fails
    #[serde(default)]
    pub captions_required: bool,

    // @field: Transcription language hint, overrides the configured one
    #[serde(default)]
    pub language: Option<String>,

    pub output: PathBuf,

    #[serde(default)]
    pub width: Option<u32>,

    #[serde(default)]
    pub height: Option<u32>,
}

impl RenderRequest {
    /// Load a manifest from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::File(format!("Failed to read manifest {:?}: {}", path, e)))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        serde_json::from_str(raw).map_err(|e| AppError::InvalidRequest(format!("Malformed manifest: {}", e)))
    }

    /// Reject malformed requests and put sections in render order
    pub fn validate(&mut self) -> Result<(), AppError> {
        if self.sections.is_empty() {
            return Err(AppError::InvalidRequest("At least one section is required".to_string()));
        }

        self.sections.sort_by_key(|s| s.order);

        for (i, section) in self.sections.iter().enumerate() {
            let expected = i as u32 + 1;
            if section.order != expected {
                return Err(AppError::InvalidRequest(format!(
                    "Section orders must run 1..{} without gaps, found {} at position {}",
                    self.sections.len(),
                    section.order,
                    expected
                )));
            }
            if section.media.trim().is_empty() {
                return Err(AppError::InvalidRequest(format!("Section {} has no media", section.order)));
            }
            if self.narration.is_none() && section.audio.is_none() {
                return Err(AppError::InvalidRequest(format!(
                    "Section {} has no audio and the request has no narration",
                    section.order
                )));
            }
        }

        for dimension in [self.width, self.height].into_iter().flatten() {
            if dimension == 0 || dimension % 2 != 0 {
                return Err(AppError::InvalidRequest(format!(
                    "Output dimensions must be positive and even, got {}",
                    dimension
                )));
            }
        }

        if let Some(language) = &self.language {
            crate::language_utils::validate_language_code(language)
                .map_err(|e| AppError::InvalidRequest(e.to_string()))?;
        }

        Ok(())
    }

    /// Caption texts in section order
    pub fn captions(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.caption.as_str()).collect()
    }

    pub fn has_narration(&self) -> bool {
        self.narration.is_some()
    }
}
