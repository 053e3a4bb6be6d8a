/*!
 * # capsync - narrated video captioning
 *
 * Turns a list of sections (image or video, caption text, narration audio)
 * into one narrated video with burned-in captions and an optional headline.
 *
 * ## Features
 *
 * - Word-level transcript extraction from a whisper worker
 * - Sequential alignment of caption text to transcript words
 * - Timing normalization against the measured audio duration
 * - Plain and karaoke captions with `<h>` highlights and `<br>` breaks
 * - ASS, SRT and VTT output
 * - A staged ffmpeg render pipeline with bounded clip concurrency
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `transcript`: engine response model and word extraction
 * - `alignment`: caption-to-word alignment and timing normalization
 * - `subtitle`: caption and headline document synthesis
 * - `media`: caches, media resolution, ffmpeg runner and filter graphs
 * - `render`: the render stage machine, clip batcher and cleanup
 * - `providers`: speech-to-text clients
 * - `project`: render request manifest
 * - `jobs`: fire-and-forget job table
 * - `app_controller`: end-to-end orchestration
 * - `app_config`: configuration management
 * - `file_utils`: file system operations
 * - `language_utils`: ISO language code utilities
 * - `errors`: custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod alignment;
pub mod app_config;
pub mod app_controller;
pub mod errors;
pub mod file_utils;
pub mod jobs;
pub mod language_utils;
pub mod media;
pub mod project;
pub mod providers;
pub mod render;
pub mod subtitle;
pub mod transcript;

// Re-exports for convenience
pub use alignment::{SectionTiming, SequentialAligner, TimingNormalizer};
pub use app_config::Config;
pub use app_controller::{Controller, TimingPlan};
pub use errors::{AppError, RenderError, ResolveError, TranscriptionError};
pub use project::{RenderRequest, SectionInput};
pub use render::{RenderOutcome, RenderPipeline, RenderStage};
pub use subtitle::{SubtitleDocument, SubtitleSynthesizer};
pub use transcript::{extract_words, TimedWord, TranscriptionResponse};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
