/*!
 * Tests for application configuration
 */

use capsync::app_config::{CaptionMode, Config, HeadlinePosition, LogLevel, SubtitleFormat};

#[test]
fn test_default_config_should_validate() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.transcription.endpoint, "http://localhost:8000");
    assert_eq!((config.render.width, config.render.height), (1080, 1920));
    assert_eq!(config.render.max_concurrent_clips, 2);
    assert_eq!(config.captions.mode, CaptionMode::Plain);
    assert_eq!(config.captions.format, SubtitleFormat::Ass);
}

#[test]
fn test_partial_json_should_fill_missing_fields_with_defaults() {
    let raw = r#"{
        "render": { "width": 720, "height": 1280 },
        "captions": { "mode": "karaoke", "headline_position": "bottom" },
        "log_level": "debug"
    }"#;
    let config: Config = serde_json::from_str(raw).unwrap();

    assert_eq!(config.render.width, 720);
    assert_eq!(config.render.fps, 30);
    assert_eq!(config.render.ffmpeg_path, "ffmpeg");
    assert_eq!(config.captions.mode, CaptionMode::Karaoke);
    assert_eq!(config.captions.headline_position, HeadlinePosition::Bottom);
    assert_eq!(config.captions.karaoke_chunk_size, 3);
    assert_eq!(config.alignment.search_window, 100);
    assert_eq!(config.log_level, LogLevel::Debug);
    assert!(config.validate().is_ok());
}

#[test]
fn test_serialized_default_should_load_back() {
    let json = serde_json::to_string_pretty(&Config::default()).unwrap();
    let config: Config = serde_json::from_str(&json).unwrap();
    assert_eq!(config.captions.highlight_colour, "#FFD400");
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_should_reject_odd_resolution() {
    let mut config = Config::default();
    config.render.width = 1081;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_should_reject_bad_colour_and_endpoint() {
    let mut config = Config::default();
    config.captions.highlight_colour = "yellow".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.transcription.endpoint = "ftp://localhost".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.transcription.endpoint = "not a url".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_should_reject_zero_limits() {
    let mut config = Config::default();
    config.render.max_concurrent_clips = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.alignment.fallback_duration_secs = 0.0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.render.zoom_peak = 0.9;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_should_check_language_hint() {
    let mut config = Config::default();
    config.transcription.language = Some("ko".to_string());
    assert!(config.validate().is_ok());

    config.transcription.language = Some("zz-not-a-language".to_string());
    assert!(config.validate().is_err());
}
