use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};

use crate::app_config::TranscriptionConfig;
use crate::errors::TranscriptionError;
use crate::providers::{EngineHealth, Transcriber};
use crate::transcript::TranscriptionResponse;

/// Upload extensions the worker accepts
pub const ALLOWED_EXTENSIONS: &[&str] = &["mp3", "wav", "webm", "ogg", "flac", "m4a", "mp4"];

/// Check an audio path against the worker's accepted extensions
pub fn check_audio_extension(path: &Path) -> Result<&'static str, TranscriptionError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    ALLOWED_EXTENSIONS
        .iter()
        .find(|allowed| **allowed == extension)
        .copied()
        .ok_or_else(|| TranscriptionError::UnsupportedFormat {
            extension: if extension.is_empty() { "(none)".to_string() } else { format!(".{}", extension) },
            allowed: ALLOWED_EXTENSIONS.iter().map(|e| format!(".{}", e)).collect::<Vec<_>>().join(", "),
        })
}

fn mime_for(extension: &str) -> &'static str {
    match extension {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "webm" => "audio/webm",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" => "audio/mp4",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// Client for the whisper worker's `/transcribe` and `/health` endpoints
#[derive(Debug, Clone)]
pub struct WhisperClient {
    base_url: String,
    client: Client,
}

impl WhisperClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::builder().timeout(timeout).build().unwrap_or_default(),
        }
    }

    pub fn from_config(config: &TranscriptionConfig) -> Self {
        Self::new(config.endpoint.clone(), Duration::from_secs(config.timeout_secs))
    }

    fn map_send_error(e: reqwest::Error) -> TranscriptionError {
        if e.is_connect() {
            TranscriptionError::ConnectionError(e.to_string())
        } else {
            TranscriptionError::RequestFailed(e.to_string())
        }
    }

    async fn error_from_response(response: reqwest::Response) -> TranscriptionError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        // FastAPI errors arrive as {"detail": "..."}
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
            .unwrap_or(body);

        let message = if status == StatusCode::SERVICE_UNAVAILABLE {
            format!("model not loaded: {}", detail)
        } else {
            detail
        };

        TranscriptionError::ApiError {
            status_code: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl Transcriber for WhisperClient {
    async fn transcribe(&self, audio: &Path, language: Option<&str>) -> Result<TranscriptionResponse, TranscriptionError> {
        let extension = check_audio_extension(audio)?;

        let bytes = tokio::fs::read(audio)
            .await
            .map_err(|e| TranscriptionError::RequestFailed(format!("cannot read {}: {}", audio.display(), e)))?;

        let file_name = audio
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio")
            .to_string();

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_for(extension))
            .map_err(|e| TranscriptionError::RequestFailed(e.to_string()))?;

        let mut form = Form::new()
            .part("file", part)
            .text("response_format", "verbose_json");
        if let Some(language) = language {
            form = form.text("language", language.to_string());
        }

        let url = format!("{}/transcribe", self.base_url);
        debug!("Uploading {} to {}", audio.display(), url);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            let err = Self::error_from_response(response).await;
            error!("Transcription failed: {}", err);
            return Err(err);
        }

        let body = response
            .text()
            .await
            .map_err(|e| TranscriptionError::RequestFailed(e.to_string()))?;

        TranscriptionResponse::from_json(&body)
    }

    async fn test_connection(&self) -> Result<EngineHealth, TranscriptionError> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await.map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let health: EngineHealth = response
            .json()
            .await
            .map_err(|e| TranscriptionError::ParseError(e.to_string()))?;

        if !health.model_loaded {
            return Err(TranscriptionError::ApiError {
                status_code: StatusCode::SERVICE_UNAVAILABLE.as_u16(),
                message: "model not loaded".to_string(),
            });
        }

        Ok(health)
    }
}
