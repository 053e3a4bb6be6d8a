/*!
 * Render pipeline tests against the recording transcoder
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use capsync::alignment::SectionTiming;
use capsync::app_config::{CaptionConfig, RenderConfig, SubtitleFormat};
use capsync::errors::RenderError;
use capsync::file_utils::MediaKind;
use capsync::media::{DurationCache, MediaResolver, PathCache, Transcoder};
use capsync::render::{ClipAudio, ClipSpec, RenderPipeline, RenderPlan, RenderStage, SubtitleBurn};
use capsync::subtitle::SubtitleSynthesizer;
use parking_lot::Mutex;
use tempfile::TempDir;

use crate::common::{create_temp_dir, create_test_file, init_logger, test_config, FakeTranscoder};

fn render_config(dir: &Path) -> RenderConfig {
    test_config(dir).render
}

fn build_pipeline(transcoder: &Arc<FakeTranscoder>, config: &RenderConfig) -> RenderPipeline {
    let transcoder: Arc<dyn Transcoder> = transcoder.clone();
    let resolver = MediaResolver::new(
        config.work_root().join("downloads"),
        PathCache::default(),
        Duration::from_secs(5),
    );
    RenderPipeline::new(transcoder, resolver, DurationCache::default(), config)
}

fn synthesizer() -> SubtitleSynthesizer {
    SubtitleSynthesizer::new(&CaptionConfig::default(), 1080, 1920).unwrap()
}

/// Two image sections cut from one narration, with plain captions
fn narrated_plan(dir: &TempDir, target: f64) -> RenderPlan {
    let a = create_test_file(dir.path(), "a.png", b"png").unwrap();
    let b = create_test_file(dir.path(), "b.png", b"png").unwrap();
    let narration = create_test_file(dir.path(), "voice.mp3", b"mp3").unwrap();
    let half = target / 2.0;

    let timings = vec![SectionTiming::new(0.0, half), SectionTiming::new(half, target)];
    let document = synthesizer().captions(&["First section", "Second <h>section</h>"], &timings);

    RenderPlan {
        clips: vec![
            ClipSpec {
                media: a,
                kind: MediaKind::Image,
                duration: half,
                audio: ClipAudio::NarrationSlice { start: 0.0 },
            },
            ClipSpec {
                media: b,
                kind: MediaKind::Image,
                duration: half,
                audio: ClipAudio::NarrationSlice { start: half },
            },
        ],
        narration: Some(narration),
        target_duration: target,
        headline: None,
        captions: Some(SubtitleBurn {
            document,
            format: SubtitleFormat::Ass,
        }),
        output: dir.path().join("out").join("final.mp4"),
        width: 1080,
        height: 1920,
    }
}

fn sorted(mut stages: Vec<String>) -> Vec<String> {
    stages.sort();
    stages
}

#[tokio::test]
async fn test_render_should_run_stages_in_order_and_copy_output() {
    init_logger();
    let dir = create_temp_dir().unwrap();
    let transcoder = Arc::new(FakeTranscoder::new(4.0));
    let pipeline = build_pipeline(&transcoder, &render_config(dir.path()));
    let plan = narrated_plan(&dir, 4.0);

    let outcome = pipeline.render(&plan).await.unwrap();

    let stages = transcoder.stages();
    assert_eq!(stages.len(), 7);
    assert_eq!(sorted(stages[0..2].to_vec()), vec!["clip 1", "clip 2"]);
    assert_eq!(sorted(stages[2..4].to_vec()), vec!["audio 1", "audio 2"]);
    assert_eq!(&stages[4..], &["concatenate", "attach narration", "burn captions"]);

    assert!(!outcome.reconciled);
    assert_eq!(outcome.duration, 4.0);
    assert_eq!(std::fs::read(&plan.output).unwrap(), b"fake media");
}

#[tokio::test]
async fn test_render_should_slice_narration_per_section() {
    let dir = create_temp_dir().unwrap();
    let transcoder = Arc::new(FakeTranscoder::new(6.0));
    let pipeline = build_pipeline(&transcoder, &render_config(dir.path()));
    let plan = narrated_plan(&dir, 6.0);

    pipeline.render(&plan).await.unwrap();

    let second = transcoder.invocation("audio 2").unwrap();
    assert_eq!(second.value_of("-ss"), Some("3.000"));
    assert_eq!(second.value_of("-t"), Some("3.000"));

    let narration = transcoder.invocation("attach narration").unwrap();
    assert_eq!(narration.value_of("-t"), Some("6.000"));

    let concat = transcoder.invocation("concatenate").unwrap();
    assert_eq!(concat.value_of("-f"), Some("concat"));
    assert_eq!(concat.value_of("-c"), Some("copy"));

    let burn = transcoder.invocation("burn captions").unwrap();
    assert!(burn.value_of("-vf").unwrap().starts_with("ass="));
}

#[tokio::test]
async fn test_render_should_clean_run_directory_and_caches_on_success() {
    let dir = create_temp_dir().unwrap();
    let transcoder = Arc::new(FakeTranscoder::new(4.0));
    let pipeline = build_pipeline(&transcoder, &render_config(dir.path()));
    let plan = narrated_plan(&dir, 4.0);

    let references: Vec<String> = plan
        .clips
        .iter()
        .map(|c| c.media.to_string_lossy().into_owned())
        .collect();
    let references: Vec<&str> = references.iter().map(String::as_str).collect();
    let resolved = pipeline.resolve_inputs(&references).await.unwrap();
    assert_eq!(resolved, vec![plan.clips[0].media.clone(), plan.clips[1].media.clone()]);
    assert_eq!(pipeline.path_cache().len(), 2);

    let outcome = pipeline.render(&plan).await.unwrap();

    assert!(!pipeline.runs_root().join(outcome.run_id.to_string()).exists());
    assert!(pipeline.cleanup().pending().is_empty());
    assert!(pipeline.path_cache().is_empty());
    assert!(pipeline.duration_cache().is_empty());
}

#[tokio::test]
async fn test_render_without_eager_cleanup_should_keep_run_for_retention() {
    let dir = create_temp_dir().unwrap();
    let transcoder = Arc::new(FakeTranscoder::new(4.0));
    let mut config = render_config(dir.path());
    config.eager_cleanup = false;
    let pipeline = build_pipeline(&transcoder, &config);

    let mut plan = narrated_plan(&dir, 4.0);
    plan.headline = Some(synthesizer().headline("Top story", 4.0));

    let outcome = pipeline.render(&plan).await.unwrap();
    let run_dir = pipeline.runs_root().join(outcome.run_id.to_string());

    assert_eq!(pipeline.cleanup().pending(), vec![run_dir.clone()]);
    let headline = std::fs::read_to_string(run_dir.join("headline.ass")).unwrap();
    assert!(headline.contains("Top story"));
    assert!(run_dir.join("concat.txt").exists());

    let burn = transcoder.invocation("burn headline").unwrap();
    assert!(burn.value_of("-vf").unwrap().contains("headline.ass"));

    assert_eq!(pipeline.cleanup().flush().await, 1);
    assert!(!run_dir.exists());
}

#[tokio::test]
async fn test_render_should_bound_clip_concurrency() {
    let dir = create_temp_dir().unwrap();
    let transcoder = Arc::new(FakeTranscoder::new(10.0).with_delay(Duration::from_millis(30)));
    let config = render_config(dir.path());
    assert_eq!(config.max_concurrent_clips, 2);
    let pipeline = build_pipeline(&transcoder, &config);

    let image = create_test_file(dir.path(), "a.png", b"png").unwrap();
    let clips = (0..5)
        .map(|i| ClipSpec {
            media: image.clone(),
            kind: MediaKind::Image,
            duration: 2.0,
            audio: ClipAudio::Own(create_test_file(dir.path(), &format!("s{}.mp3", i), b"mp3").unwrap()),
        })
        .collect();
    let plan = RenderPlan {
        clips,
        narration: None,
        target_duration: 10.0,
        headline: None,
        captions: None,
        output: dir.path().join("final.mp4"),
        width: 1080,
        height: 1920,
    };

    pipeline.render(&plan).await.unwrap();

    assert!(transcoder.peak_concurrency() <= 2);
    assert!(transcoder.peak_concurrency() >= 1);
}

#[tokio::test]
async fn test_render_should_not_launch_clips_after_a_failure() {
    let dir = create_temp_dir().unwrap();
    let transcoder = Arc::new(
        FakeTranscoder::new(10.0)
            .with_delay(Duration::from_millis(30))
            .failing_at("clip"),
    );
    let pipeline = build_pipeline(&transcoder, &render_config(dir.path()));

    let image = create_test_file(dir.path(), "a.png", b"png").unwrap();
    let clips = (0..6)
        .map(|i| ClipSpec {
            media: image.clone(),
            kind: MediaKind::Image,
            duration: 2.0,
            audio: ClipAudio::Own(create_test_file(dir.path(), &format!("s{}.mp3", i), b"mp3").unwrap()),
        })
        .collect();
    let plan = RenderPlan {
        clips,
        narration: None,
        target_duration: 12.0,
        headline: None,
        captions: None,
        output: dir.path().join("final.mp4"),
        width: 1080,
        height: 1920,
    };

    assert!(pipeline.render(&plan).await.is_err());
    // Only the first concurrency window reached the transcoder
    assert!(transcoder.stages().len() <= 2);
}

#[tokio::test]
async fn test_render_with_own_audio_should_skip_narration_stage() {
    let dir = create_temp_dir().unwrap();
    let transcoder = Arc::new(FakeTranscoder::new(3.5));
    let pipeline = build_pipeline(&transcoder, &render_config(dir.path()));

    let video = create_test_file(dir.path(), "loop.mp4", b"mp4").unwrap();
    let audio = create_test_file(dir.path(), "part.mp3", b"mp3").unwrap();
    let plan = RenderPlan {
        clips: vec![ClipSpec {
            media: video,
            kind: MediaKind::Video,
            duration: 3.5,
            audio: ClipAudio::Own(audio.clone()),
        }],
        narration: None,
        target_duration: 3.5,
        headline: None,
        captions: None,
        output: dir.path().join("final.mp4"),
        width: 1080,
        height: 1920,
    };

    pipeline.render(&plan).await.unwrap();

    let stages = transcoder.stages();
    assert!(!stages.iter().any(|s| s == "attach narration"));
    assert_eq!(stages, vec!["clip 1", "audio 1", "concatenate"]);

    let attach = transcoder.invocation("audio 1").unwrap();
    assert!(attach.has_arg(&audio.to_string_lossy()));
    assert!(!attach.has_arg("-ss"));
}

#[tokio::test]
async fn test_render_should_reconcile_short_output() {
    let dir = create_temp_dir().unwrap();
    let transcoder = Arc::new(FakeTranscoder::new(4.0).with_duration("reconciled.mp4", 5.0));
    let pipeline = build_pipeline(&transcoder, &render_config(dir.path()));
    let plan = narrated_plan(&dir, 5.0);

    let outcome = pipeline.render(&plan).await.unwrap();

    assert!(outcome.reconciled);
    assert_eq!(outcome.duration, 5.0);

    let reconcile = transcoder.invocation("reconcile").unwrap();
    assert_eq!(reconcile.value_of("-af"), Some("apad"));
    assert_eq!(reconcile.value_of("-t"), Some("5.000"));
    assert!(plan.output.exists());
}

#[tokio::test]
async fn test_render_with_persistent_drift_should_fail_and_keep_run() {
    let dir = create_temp_dir().unwrap();
    let transcoder = Arc::new(FakeTranscoder::new(4.0));
    let pipeline = build_pipeline(&transcoder, &render_config(dir.path()));
    let plan = narrated_plan(&dir, 5.0);

    let err = pipeline.render(&plan).await.unwrap_err();

    match err {
        RenderError::DurationDrift { expected, actual } => {
            assert_eq!(expected, 5.0);
            assert_eq!(actual, 4.0);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!plan.output.exists());

    let pending = pipeline.cleanup().pending();
    assert_eq!(pending.len(), 1);
    assert!(pending[0].exists());
}

#[tokio::test]
async fn test_render_with_failing_clip_should_stop_before_concatenation() {
    let dir = create_temp_dir().unwrap();
    let transcoder = Arc::new(FakeTranscoder::new(4.0).failing_at("clip"));
    let pipeline = build_pipeline(&transcoder, &render_config(dir.path()));
    let plan = narrated_plan(&dir, 4.0);

    let err = pipeline.render(&plan).await.unwrap_err();

    assert!(matches!(err, RenderError::StageFailed { ref stage, .. } if stage.starts_with("clip ")));
    assert!(transcoder.stages().iter().all(|s| s.starts_with("clip")));
    assert_eq!(pipeline.cleanup().pending().len(), 1);
}

#[tokio::test]
async fn test_render_with_no_clips_should_fail() {
    let dir = create_temp_dir().unwrap();
    let transcoder = Arc::new(FakeTranscoder::new(4.0));
    let pipeline = build_pipeline(&transcoder, &render_config(dir.path()));
    let mut plan = narrated_plan(&dir, 4.0);
    plan.clips.clear();

    assert!(pipeline.render(&plan).await.is_err());
    assert!(transcoder.stages().is_empty());
}

#[tokio::test]
async fn test_progress_callback_should_see_stages_in_order() {
    let dir = create_temp_dir().unwrap();
    let transcoder = Arc::new(FakeTranscoder::new(4.0));
    let seen: Arc<Mutex<Vec<RenderStage>>> = Arc::new(Mutex::new(Vec::new()));

    let sink = seen.clone();
    let pipeline = build_pipeline(&transcoder, &render_config(dir.path())).with_progress(Arc::new(
        move |stage: RenderStage, _done: usize, _total: usize| {
            let mut seen = sink.lock();
            if seen.last() != Some(&stage) {
                seen.push(stage);
            }
        },
    ));
    let plan = narrated_plan(&dir, 4.0);

    let paths: Vec<PathBuf> = plan.clips.iter().map(|c| c.media.clone()).collect();
    let references: Vec<String> = paths.iter().map(|p| p.to_string_lossy().into_owned()).collect();
    let references: Vec<&str> = references.iter().map(String::as_str).collect();
    pipeline.resolve_inputs(&references).await.unwrap();
    pipeline.render(&plan).await.unwrap();

    assert_eq!(
        *seen.lock(),
        vec![
            RenderStage::ResolveInputs,
            RenderStage::SynthesizeClips,
            RenderStage::AttachSectionAudio,
            RenderStage::Concatenate,
            RenderStage::AttachNarration,
            RenderStage::BurnCaptions,
            RenderStage::Reconcile,
            RenderStage::Cleanup,
        ]
    );
}

#[tokio::test]
async fn test_measure_should_probe_each_file_once() {
    let dir = create_temp_dir().unwrap();
    let transcoder = Arc::new(FakeTranscoder::new(2.0).with_duration("voice.mp3", 42.5));
    let pipeline = build_pipeline(&transcoder, &render_config(dir.path()));
    let voice = create_test_file(dir.path(), "voice.mp3", b"mp3").unwrap();

    assert_eq!(pipeline.measure(&voice).await.unwrap(), 42.5);
    assert_eq!(pipeline.measure(&voice).await.unwrap(), 42.5);
    assert_eq!(transcoder.probe_count(), 1);
}
