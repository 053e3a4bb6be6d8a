/*!
 * Error types for the capsync application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when talking to the speech-to-text engine
#[derive(Error, Debug)]
pub enum TranscriptionError {
    /// Error when making an API request fails
    #[error("Transcription request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an engine response fails
    #[error("Failed to parse transcription response: {0}")]
    ParseError(String),

    /// Error returned by the engine itself
    #[error("Transcription engine responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the engine
        message: String
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The audio file type is not accepted by the engine
    #[error("Unsupported audio format '{extension}', allowed: {allowed}")]
    UnsupportedFormat {
        /// Offending file extension
        extension: String,
        /// Comma separated list of accepted extensions
        allowed: String,
    },

    /// The response was well-formed JSON but carried no word-level timestamps
    #[error("Transcription has no word-level timestamps")]
    MissingWordTimestamps,
}

/// Errors raised while turning a media reference into a local file
#[derive(Error, Debug)]
pub enum ResolveError {
    /// A local path does not exist
    #[error("Media file does not exist: {0}")]
    NotFound(PathBuf),

    /// The reference is neither a path nor an http(s) URL
    #[error("Invalid media reference: {0}")]
    InvalidReference(String),

    /// Downloading a remote reference failed
    #[error("Failed to download {url}: {message}")]
    DownloadFailed {
        /// Remote URL
        url: String,
        /// Failure description
        message: String,
    },

    /// Local filesystem failure while storing a download
    #[error("I/O error while resolving media: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the render pipeline
#[derive(Error, Debug)]
pub enum RenderError {
    /// A transcoder invocation exited unsuccessfully
    #[error("Render stage '{stage}' failed: {message}")]
    StageFailed {
        /// Stage label
        stage: String,
        /// Filtered transcoder stderr
        message: String,
    },

    /// The transcoder binary could not be started
    #[error("Failed to launch {program}: {message}")]
    Spawn {
        /// Binary that failed to start
        program: String,
        /// OS error text
        message: String,
    },

    /// A transcoder invocation exceeded its time budget
    #[error("{program} timed out after {secs} seconds")]
    Timeout {
        /// Binary that timed out
        program: String,
        /// Timeout that was applied
        secs: u64,
    },

    /// The duration of a file could not be measured
    #[error("Failed to probe duration of {path}: {message}")]
    Probe {
        /// Probed file
        path: PathBuf,
        /// Failure description
        message: String,
    },

    /// Output duration still deviates from the target after reconciliation
    #[error("Output duration {actual:.3}s deviates from expected {expected:.3}s")]
    DurationDrift {
        /// Narration duration in seconds
        expected: f64,
        /// Measured output duration in seconds
        actual: f64,
    },

    /// Local filesystem failure inside the working directory
    #[error("I/O error during render: {0}")]
    Io(#[from] std::io::Error),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// The render request itself is malformed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error resolving referenced media
    #[error("Resource error: {0}")]
    Resolve(#[from] ResolveError),

    /// Error from the speech-to-text engine
    #[error("Transcription error: {0}")]
    Transcription(#[from] TranscriptionError),

    /// Error from the render pipeline
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl AppError {
    /// Whether the failure was caused by the caller's input rather than the system
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRequest(_) | Self::Resolve(_))
    }
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
