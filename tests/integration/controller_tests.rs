/*!
 * Controller tests with a scripted transcriber and the recording transcoder
 */

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use capsync::app_config::{CaptionMode, Config};
use capsync::errors::{AppError, TranscriptionError};
use capsync::jobs::JobStatus;
use capsync::providers::mock::MockTranscriber;
use capsync::transcript::TranscriptionResponse;
use capsync::{Controller, RenderRequest, SectionInput};
use tempfile::TempDir;

use crate::common::{create_temp_dir, create_test_file, init_logger, test_config, FakeTranscoder};

const NARRATION_WORDS: &[(&str, f64, f64)] = &[
    ("Hello", 0.0, 0.5),
    ("world.", 0.5, 1.0),
    ("Good", 1.5, 2.0),
    ("night!", 2.0, 3.0),
];

fn section(order: u32, caption: &str, media: &Path, audio: Option<&Path>) -> SectionInput {
    SectionInput {
        order,
        caption: caption.to_string(),
        media: media.to_string_lossy().into_owned(),
        audio: audio.map(|a| a.to_string_lossy().into_owned()),
    }
}

/// Narrated request over one image and one video section
fn narrated_request(dir: &TempDir) -> RenderRequest {
    let image = create_test_file(dir.path(), "a.png", b"png").unwrap();
    let video = create_test_file(dir.path(), "b.mp4", b"mp4").unwrap();
    let narration = create_test_file(dir.path(), "voice.mp3", b"mp3").unwrap();

    RenderRequest {
        narration: Some(narration.to_string_lossy().into_owned()),
        sections: vec![
            section(2, "Good <h>night</h>", &video, None),
            section(1, "Hello world", &image, None),
        ],
        headline: None,
        caption_mode: None,
        caption_format: None,
        captions_required: false,
        language: None,
        output: dir.path().join("out").join("video.mp4"),
        width: None,
        height: None,
    }
}

fn controller(config: Config, transcriber: &MockTranscriber, transcoder: &Arc<FakeTranscoder>) -> Controller {
    Controller::with_components(config, Arc::new(transcriber.clone()), transcoder.clone(), None).unwrap()
}

#[tokio::test]
async fn test_render_with_narration_should_align_sections_to_transcript() {
    init_logger();
    let dir = create_temp_dir().unwrap();
    let transcriber = MockTranscriber::with_words(NARRATION_WORDS);
    let transcoder = Arc::new(FakeTranscoder::new(4.0));
    let controller = controller(test_config(dir.path()), &transcriber, &transcoder);
    let request = narrated_request(&dir);

    let outcome = controller.render(request.clone()).await.unwrap();

    assert_eq!(outcome.output, request.output);
    assert!(request.output.exists());
    assert_eq!(transcriber.request_count(), 1);

    // Gap before "Good" goes to the first section, the tail to the last
    let first = transcoder.invocation("audio 1").unwrap();
    assert_eq!(first.value_of("-ss"), Some("0.000"));
    assert_eq!(first.value_of("-t"), Some("1.500"));
    let second = transcoder.invocation("audio 2").unwrap();
    assert_eq!(second.value_of("-ss"), Some("1.500"));
    assert_eq!(second.value_of("-t"), Some("2.500"));

    // Sections are rendered in manifest order regardless of input order
    assert!(transcoder.invocation("clip 1").unwrap().has_arg("-loop"));
    assert!(transcoder.invocation("clip 2").unwrap().has_arg("-stream_loop"));
    assert!(transcoder.invocation("burn captions").is_some());
    assert!(transcoder.invocation("reconcile").is_none());
}

#[tokio::test]
async fn test_render_with_narration_should_not_fetch_section_audio() {
    let dir = create_temp_dir().unwrap();
    let transcriber = MockTranscriber::with_words(NARRATION_WORDS);
    let transcoder = Arc::new(FakeTranscoder::new(4.0));
    let controller = controller(test_config(dir.path()), &transcriber, &transcoder);

    // Section audio that does not exist would fail resolution if it were used
    let mut request = narrated_request(&dir);
    let missing = dir.path().join("unused.mp3");
    request.sections[0].audio = Some(missing.to_string_lossy().into_owned());

    controller.render(request).await.unwrap();

    let audio = transcoder.invocation("audio 2").unwrap();
    assert!(audio.args.iter().all(|arg| !arg.contains("unused.mp3")));
    assert_eq!(audio.value_of("-ss"), Some("1.500"));
}

#[tokio::test]
async fn test_render_with_failing_transcriber_should_fall_back_to_single_caption() {
    let dir = create_temp_dir().unwrap();
    let mut config = test_config(dir.path());
    config.render.eager_cleanup = false;
    let transcriber = MockTranscriber::failing();
    let transcoder = Arc::new(FakeTranscoder::new(4.0));
    let controller = controller(config, &transcriber, &transcoder);

    let outcome = controller.render(narrated_request(&dir)).await.unwrap();

    let run_dir = controller.pipeline().runs_root().join(outcome.run_id.to_string());
    let captions = std::fs::read_to_string(run_dir.join("captions.ass")).unwrap();
    let dialogues: Vec<&str> = captions.lines().filter(|l| l.starts_with("Dialogue:")).collect();
    assert_eq!(dialogues.len(), 1);
    assert!(dialogues[0].starts_with("Dialogue: 0,0:00:00.00,0:00:04.00,"));
    assert!(dialogues[0].contains("Hello world Good"));

    controller.pipeline().cleanup().flush().await;
}

#[tokio::test]
async fn test_render_with_text_only_transcript_should_fall_back() {
    let dir = create_temp_dir().unwrap();
    let transcriber = MockTranscriber::text_only("Hello world. Good night!");
    let transcoder = Arc::new(FakeTranscoder::new(4.0));
    let controller = controller(test_config(dir.path()), &transcriber, &transcoder);

    assert!(controller.render(narrated_request(&dir)).await.is_ok());
    assert_eq!(transcriber.request_count(), 1);
}

#[tokio::test]
async fn test_render_with_required_captions_should_fail_on_transcription_error() {
    let dir = create_temp_dir().unwrap();
    let transcriber = MockTranscriber::failing();
    let transcoder = Arc::new(FakeTranscoder::new(4.0));
    let controller = controller(test_config(dir.path()), &transcriber, &transcoder);

    let mut request = narrated_request(&dir);
    request.captions_required = true;
    let err = controller.render(request).await.unwrap_err();

    assert!(matches!(err, AppError::Transcription(TranscriptionError::ConnectionError(_))));
    assert!(!err.is_client_error());
    assert!(transcoder.invocations().is_empty());
}

#[tokio::test]
async fn test_render_with_section_audio_should_lay_sections_end_to_end() {
    let dir = create_temp_dir().unwrap();
    let transcriber = MockTranscriber::with_words(NARRATION_WORDS);
    let transcoder = Arc::new(
        FakeTranscoder::new(0.0)
            .with_duration("one.mp3", 2.0)
            .with_duration("two.mp3", 3.0)
            .with_duration("captioned.mp4", 5.0),
    );
    let controller = controller(test_config(dir.path()), &transcriber, &transcoder);

    let image = create_test_file(dir.path(), "a.png", b"png").unwrap();
    let one = create_test_file(dir.path(), "one.mp3", b"mp3").unwrap();
    let two = create_test_file(dir.path(), "two.mp3", b"mp3").unwrap();
    let request = RenderRequest {
        narration: None,
        sections: vec![
            section(1, "First", &image, Some(&one)),
            section(2, "Second", &image, Some(&two)),
        ],
        headline: None,
        caption_mode: None,
        caption_format: None,
        captions_required: false,
        language: None,
        output: dir.path().join("sections.mp4"),
        width: None,
        height: None,
    };

    let outcome = controller.render(request).await.unwrap();

    assert_eq!(outcome.duration, 5.0);
    assert_eq!(transcriber.request_count(), 0);
    assert!(transcoder.invocation("attach narration").is_none());

    let second = transcoder.invocation("audio 2").unwrap();
    assert!(second.has_arg(&two.to_string_lossy()));
    assert_eq!(second.value_of("-t"), Some("3.000"));
}

#[tokio::test]
async fn test_render_with_headline_and_no_captions_should_only_burn_headline() {
    let dir = create_temp_dir().unwrap();
    let transcriber = MockTranscriber::with_words(NARRATION_WORDS);
    let transcoder = Arc::new(FakeTranscoder::new(4.0));
    let controller = controller(test_config(dir.path()), &transcriber, &transcoder);

    let mut request = narrated_request(&dir);
    request.caption_mode = Some(CaptionMode::None);
    request.headline = Some("Tonight\nonly".to_string());

    controller.render(request).await.unwrap();

    let stages = transcoder.stages();
    assert!(stages.iter().any(|s| s == "burn headline"));
    assert!(!stages.iter().any(|s| s == "burn captions"));
}

#[tokio::test]
async fn test_render_with_invalid_request_should_be_client_error() {
    let dir = create_temp_dir().unwrap();
    let transcriber = MockTranscriber::with_words(NARRATION_WORDS);
    let transcoder = Arc::new(FakeTranscoder::new(4.0));
    let controller = controller(test_config(dir.path()), &transcriber, &transcoder);

    let mut gap = narrated_request(&dir);
    gap.sections[0].order = 3;
    let err = controller.render(gap).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));
    assert!(err.is_client_error());

    let mut missing = narrated_request(&dir);
    missing.sections[0].media = dir.path().join("nope.png").to_string_lossy().into_owned();
    let err = controller.render(missing).await.unwrap_err();
    assert!(matches!(err, AppError::Resolve(_)));
    assert!(err.is_client_error());

    let mut audio_as_visual = narrated_request(&dir);
    audio_as_visual.sections[0].media = audio_as_visual.narration.clone().unwrap();
    let err = controller.render(audio_as_visual).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidRequest(_)));

    assert!(transcoder.invocations().is_empty());
    assert_eq!(transcriber.request_count(), 0);
}

#[tokio::test]
async fn test_submit_should_track_job_until_completion() {
    let dir = create_temp_dir().unwrap();
    let transcriber = MockTranscriber::with_words(NARRATION_WORDS);
    let transcoder = Arc::new(FakeTranscoder::new(4.0));
    let controller = controller(test_config(dir.path()), &transcriber, &transcoder);
    let request = narrated_request(&dir);

    let ok = controller.submit(request.clone());
    let mut broken = request.clone();
    broken.sections.clear();
    let failed = controller.submit(broken);

    for _ in 0..200 {
        let done = [ok, failed]
            .iter()
            .all(|id| controller.job(id).map(|j| j.status.is_terminal()).unwrap_or(false));
        if done {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let ok = controller.job(&ok).unwrap();
    assert_eq!(ok.status, JobStatus::Completed);
    assert_eq!(ok.output, Some(request.output.clone()));

    let failed = controller.job(&failed).unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error.unwrap().contains("At least one section"));
}

#[tokio::test]
async fn test_health_should_report_engine_state() {
    let dir = create_temp_dir().unwrap();
    let transcoder = Arc::new(FakeTranscoder::new(4.0));

    let healthy = controller(test_config(dir.path()), &MockTranscriber::text_only("x"), &transcoder);
    assert_eq!(healthy.health().await.unwrap().status, "healthy");

    let offline = controller(test_config(dir.path()), &MockTranscriber::failing(), &transcoder);
    assert!(offline.health().await.is_err());
}

#[test]
fn test_with_components_should_reject_invalid_config() {
    let dir = create_temp_dir().unwrap();
    let mut config = test_config(dir.path());
    config.render.height = 1919;
    let transcoder = Arc::new(FakeTranscoder::new(1.0));

    let result = Controller::with_components(config, Arc::new(MockTranscriber::failing()), transcoder, None);
    assert!(result.is_err());
}

#[test]
fn test_align_transcript_should_normalize_to_audio_length() {
    let dir = create_temp_dir().unwrap();
    let transcoder = Arc::new(FakeTranscoder::new(1.0));
    let controller = controller(test_config(dir.path()), &MockTranscriber::failing(), &transcoder);

    let raw = r#"{"segments":[{"words":[
        {"word":" Hello","start":1.0,"end":1.4},
        {"word":" there","start":1.4,"end":2.0}
    ]}]}"#;
    let response = TranscriptionResponse::from_json(raw).unwrap();
    let plan = controller.align_transcript(&["Hello", "there"], &response, 2.0).unwrap();

    assert!(plan.aligned);
    assert!(plan.fallback_sections.is_empty());
    assert_eq!(plan.timings[0].start, 0.0);
    assert!((plan.timings[1].end - 2.0).abs() < 1e-9);

    let empty = TranscriptionResponse::from_json(r#"{"segments":[{"words":[]}]}"#).unwrap();
    assert!(matches!(
        controller.align_transcript(&["Hello"], &empty, 2.0),
        Err(TranscriptionError::MissingWordTimestamps)
    ));
}
