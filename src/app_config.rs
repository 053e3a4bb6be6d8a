use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::PathBuf;
use url::Url;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Speech-to-text settings
    #[serde(default)]
    pub transcription: TranscriptionConfig,

    /// Transcoder and pipeline settings
    #[serde(default)]
    pub render: RenderConfig,

    /// Caption and headline styling
    #[serde(default)]
    pub captions: CaptionConfig,

    /// Cache policies
    #[serde(default)]
    pub cache: CacheConfig,

    /// Word alignment tuning
    #[serde(default)]
    pub alignment: AlignmentConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Speech-to-text engine configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranscriptionConfig {
    // @field: Whisper worker base URL
    #[serde(default = "default_transcription_endpoint")]
    pub endpoint: String,

    // @field: Language hint passed to the engine (ISO 639)
    #[serde(default)]
    pub language: Option<String>,

    // @field: Request timeout seconds
    #[serde(default = "default_long_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_transcription_endpoint(),
            language: None,
            timeout_secs: default_long_timeout_secs(),
        }
    }
}

/// Render pipeline configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RenderConfig {
    /// ffmpeg binary
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// ffprobe binary
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,

    /// Output width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Output height in pixels
    #[serde(default = "default_height")]
    pub height: u32,

    /// Output frame rate
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Maximum number of clip renders running at the same time.
    ///
    /// Each ffmpeg process rendering a zoompan graph needs several gigabytes,
    /// so this stays low.
    #[serde(default = "default_max_concurrent_clips")]
    pub max_concurrent_clips: usize,

    /// Video encoder
    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    /// Encoder preset
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant rate factor
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Audio encoder
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate passed to the encoder
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Timeout for a single ffmpeg invocation
    #[serde(default = "default_ffmpeg_timeout_secs")]
    pub ffmpeg_timeout_secs: u64,

    /// Timeout for a single ffprobe invocation
    #[serde(default = "default_ffprobe_timeout_secs")]
    pub ffprobe_timeout_secs: u64,

    /// Allowed deviation between output and narration before a correction pass
    #[serde(default = "default_drift_tolerance_ms")]
    pub drift_tolerance_ms: u64,

    /// Root directory for per-run working directories
    #[serde(default)]
    pub work_dir: Option<PathBuf>,

    /// How long failed-run artifacts are kept for debugging
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    /// Delete intermediates as soon as a run succeeds
    #[serde(default = "default_true")]
    pub eager_cleanup: bool,

    /// Maximum zoom factor reached by the Ken-Burns foreground
    #[serde(default = "default_zoom_peak")]
    pub zoom_peak: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            max_concurrent_clips: default_max_concurrent_clips(),
            video_codec: default_video_codec(),
            preset: default_preset(),
            crf: default_crf(),
            audio_codec: default_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            ffmpeg_timeout_secs: default_ffmpeg_timeout_secs(),
            ffprobe_timeout_secs: default_ffprobe_timeout_secs(),
            drift_tolerance_ms: default_drift_tolerance_ms(),
            work_dir: None,
            retention_secs: default_retention_secs(),
            eager_cleanup: true,
            zoom_peak: default_zoom_peak(),
        }
    }
}

impl RenderConfig {
    /// Resolve the working root, falling back to the user cache directory
    pub fn work_root(&self) -> PathBuf {
        if let Some(dir) = &self.work_dir {
            return dir.clone();
        }

        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("capsync")
    }
}

/// Caption style selection
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptionMode {
    /// No caption burn
    None,
    /// One boxed cue per section
    #[default]
    Plain,
    /// Word-by-word highlight in chunks of three
    Karaoke,
}

impl std::fmt::Display for CaptionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Plain => "plain",
            Self::Karaoke => "karaoke",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for CaptionMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "plain" => Ok(Self::Plain),
            "karaoke" => Ok(Self::Karaoke),
            _ => Err(anyhow!("Invalid caption mode: {}", s)),
        }
    }
}

/// Subtitle file family used for the caption burn
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    /// Advanced SubStation Alpha
    #[default]
    Ass,
    /// SubRip
    Srt,
    /// WebVTT
    Vtt,
}

impl SubtitleFormat {
    /// File extension for this family
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Ass => "ass",
            Self::Srt => "srt",
            Self::Vtt => "vtt",
        }
    }
}

impl std::str::FromStr for SubtitleFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ass" => Ok(Self::Ass),
            "srt" => Ok(Self::Srt),
            "vtt" => Ok(Self::Vtt),
            _ => Err(anyhow!("Invalid subtitle format: {}", s)),
        }
    }
}

/// Headline anchor
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HeadlinePosition {
    #[default]
    Top,
    Bottom,
}

/// Caption and headline styling
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CaptionConfig {
    /// Default caption mode when the request does not choose one
    #[serde(default)]
    pub mode: CaptionMode,

    /// Subtitle family written for the caption burn
    #[serde(default)]
    pub format: SubtitleFormat,

    /// Font family (must cover Hangul for Korean narration)
    #[serde(default = "default_font_name")]
    pub font_name: String,

    /// Caption font size in script pixels
    #[serde(default = "default_font_size")]
    pub font_size: u32,

    /// Caption text colour, `#rrggbb`
    #[serde(default = "default_text_colour")]
    pub text_colour: String,

    /// Colour used for `<h>` spans and karaoke highlights, `#rrggbb`
    #[serde(default = "default_highlight_colour")]
    pub highlight_colour: String,

    /// Outline colour, `#rrggbb`
    #[serde(default = "default_outline_colour")]
    pub outline_colour: String,

    /// Opacity of the plain-mode caption box, 0..=255
    #[serde(default = "default_box_opacity")]
    pub box_opacity: u8,

    /// Outline width
    #[serde(default = "default_outline_width")]
    pub outline_width: u32,

    /// Headline font size in script pixels
    #[serde(default = "default_headline_font_size")]
    pub headline_font_size: u32,

    /// Headline anchor
    #[serde(default)]
    pub headline_position: HeadlinePosition,

    /// Headline vertical margin
    #[serde(default = "default_headline_margin_v")]
    pub headline_margin_v: u32,

    /// Words per karaoke cue
    #[serde(default = "default_karaoke_chunk")]
    pub karaoke_chunk_size: usize,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            mode: CaptionMode::default(),
            format: SubtitleFormat::default(),
            font_name: default_font_name(),
            font_size: default_font_size(),
            text_colour: default_text_colour(),
            highlight_colour: default_highlight_colour(),
            outline_colour: default_outline_colour(),
            box_opacity: default_box_opacity(),
            outline_width: default_outline_width(),
            headline_font_size: default_headline_font_size(),
            headline_position: HeadlinePosition::default(),
            headline_margin_v: default_headline_margin_v(),
            karaoke_chunk_size: default_karaoke_chunk(),
        }
    }
}

/// Cache policies for resolved paths and measured durations
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheConfig {
    /// Lifetime of a downloaded-path entry
    #[serde(default = "default_cache_ttl_secs")]
    pub path_ttl_secs: u64,

    /// Maximum number of path entries before LRU eviction
    #[serde(default = "default_path_max_entries")]
    pub path_max_entries: usize,

    /// Lifetime of a measured-duration entry
    #[serde(default = "default_cache_ttl_secs")]
    pub duration_ttl_secs: u64,

    /// Timeout applied to remote downloads
    #[serde(default = "default_long_timeout_secs")]
    pub download_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path_ttl_secs: default_cache_ttl_secs(),
            path_max_entries: default_path_max_entries(),
            duration_ttl_secs: default_cache_ttl_secs(),
            download_timeout_secs: default_long_timeout_secs(),
        }
    }
}

/// Word alignment tuning
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AlignmentConfig {
    /// Candidates inspected when searching the first word of the first section
    #[serde(default = "default_search_window")]
    pub search_window: usize,

    /// Duration assigned to a section whose words cannot be found
    #[serde(default = "default_fallback_duration")]
    pub fallback_duration_secs: f64,

    /// Differences below this are not corrected by the normalizer
    #[serde(default = "default_normalize_tolerance_ms")]
    pub tolerance_ms: u64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            search_window: default_search_window(),
            fallback_duration_secs: default_fallback_duration(),
            tolerance_ms: default_normalize_tolerance_ms(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_transcription_endpoint() -> String {
    "http://localhost:8000".to_string()
}

fn default_long_timeout_secs() -> u64 {
    1800 // 30 minutes, long narrations on CPU whisper are slow
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

fn default_width() -> u32 {
    1080
}

fn default_height() -> u32 {
    1920
}

fn default_fps() -> u32 {
    30
}

fn default_max_concurrent_clips() -> usize {
    2
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_preset() -> String {
    "veryfast".to_string()
}

fn default_crf() -> u8 {
    20
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

fn default_ffmpeg_timeout_secs() -> u64 {
    3600
}

fn default_ffprobe_timeout_secs() -> u64 {
    60
}

fn default_drift_tolerance_ms() -> u64 {
    100
}

fn default_retention_secs() -> u64 {
    600
}

fn default_zoom_peak() -> f64 {
    1.15
}

fn default_true() -> bool {
    true
}

fn default_font_name() -> String {
    "Noto Sans KR".to_string()
}

fn default_font_size() -> u32 {
    64
}

fn default_text_colour() -> String {
    "#FFFFFF".to_string()
}

fn default_highlight_colour() -> String {
    "#FFD400".to_string()
}

fn default_outline_colour() -> String {
    "#000000".to_string()
}

fn default_box_opacity() -> u8 {
    0x80
}

fn default_outline_width() -> u32 {
    3
}

fn default_headline_font_size() -> u32 {
    96
}

fn default_headline_margin_v() -> u32 {
    160
}

fn default_karaoke_chunk() -> usize {
    3
}

fn default_cache_ttl_secs() -> u64 {
    1800
}

fn default_path_max_entries() -> usize {
    100
}

fn default_search_window() -> usize {
    100
}

fn default_fallback_duration() -> f64 {
    5.0
}

fn default_normalize_tolerance_ms() -> u64 {
    10
}

/// Parse a `#rrggbb` colour into its components
pub fn parse_hex_colour(value: &str) -> Result<(u8, u8, u8)> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(anyhow!("Invalid colour '{}', expected #rrggbb", value));
    }

    let r = u8::from_str_radix(&hex[0..2], 16)?;
    let g = u8::from_str_radix(&hex[2..4], 16)?;
    let b = u8::from_str_radix(&hex[4..6], 16)?;
    Ok((r, g, b))
}

impl Config {

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        // Validate the language hint if one is set
        if let Some(language) = &self.transcription.language {
            crate::language_utils::validate_language_code(language)?;
        }

        let endpoint = Url::parse(&self.transcription.endpoint)
            .map_err(|e| anyhow!("Invalid transcription endpoint '{}': {}", self.transcription.endpoint, e))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(anyhow!("Transcription endpoint must be http(s): {}", endpoint));
        }

        let render = &self.render;
        if render.width == 0 || render.height == 0 {
            return Err(anyhow!("Output resolution must be non-zero"));
        }
        // yuv420p needs even dimensions
        if render.width % 2 != 0 || render.height % 2 != 0 {
            return Err(anyhow!("Output resolution must be even, got {}x{}", render.width, render.height));
        }
        if render.fps == 0 {
            return Err(anyhow!("Frame rate must be positive"));
        }
        if render.max_concurrent_clips == 0 {
            return Err(anyhow!("max_concurrent_clips must be at least 1"));
        }
        if render.zoom_peak < 1.0 {
            return Err(anyhow!("zoom_peak must be >= 1.0"));
        }

        let captions = &self.captions;
        parse_hex_colour(&captions.text_colour)?;
        parse_hex_colour(&captions.highlight_colour)?;
        parse_hex_colour(&captions.outline_colour)?;
        if captions.karaoke_chunk_size == 0 {
            return Err(anyhow!("karaoke_chunk_size must be at least 1"));
        }

        if self.cache.path_max_entries == 0 {
            return Err(anyhow!("path_max_entries must be at least 1"));
        }

        if self.alignment.search_window == 0 {
            return Err(anyhow!("search_window must be at least 1"));
        }
        if !(self.alignment.fallback_duration_secs > 0.0) {
            return Err(anyhow!("fallback_duration_secs must be positive"));
        }

        Ok(())
    }
}
