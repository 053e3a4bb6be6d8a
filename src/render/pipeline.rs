use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::app_config::{RenderConfig, SubtitleFormat};
use crate::errors::{RenderError, ResolveError};
use crate::file_utils::{FileManager, MediaKind};
use crate::media::filters::{self, secs};
use crate::media::{DurationCache, FfmpegInvocation, MediaResolver, PathCache, Transcoder};
use crate::subtitle::{SubtitleDocument, CAPTION_STYLE};

use super::batch::ClipBatcher;
use super::cleanup::CleanupScheduler;
use super::{ProgressCallback, RenderStage};

/// Audio muxed onto one section clip
#[derive(Debug, Clone, PartialEq)]
pub enum ClipAudio {
    /// The section's own audio file
    Own(PathBuf),
    /// A slice of the narration track starting at `start` seconds
    NarrationSlice { start: f64 },
}

/// One section to synthesize
#[derive(Debug, Clone, PartialEq)]
pub struct ClipSpec {
    /// Resolved local media
    pub media: PathBuf,
    /// Image or video
    pub kind: MediaKind,
    /// Section length in seconds
    pub duration: f64,
    /// Where the section's sound comes from
    pub audio: ClipAudio,
}

/// A subtitle document to burn, and the file family to write it as
#[derive(Debug, Clone)]
pub struct SubtitleBurn {
    pub document: SubtitleDocument,
    pub format: SubtitleFormat,
}

/// Everything a render needs once inputs are resolved and timings are known
#[derive(Debug, Clone)]
pub struct RenderPlan {
    pub clips: Vec<ClipSpec>,
    /// Full narration track, absent in per-section audio mode
    pub narration: Option<PathBuf>,
    /// Duration the final video must have
    pub target_duration: f64,
    pub headline: Option<SubtitleDocument>,
    pub captions: Option<SubtitleBurn>,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Result of a successful render
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutcome {
    pub output: PathBuf,
    /// Measured duration of the output
    pub duration: f64,
    /// Whether a reconciliation pass was needed
    pub reconciled: bool,
    pub run_id: Uuid,
}

/// Drives the transcoder through the render stages
pub struct RenderPipeline {
    transcoder: Arc<dyn Transcoder>,
    resolver: MediaResolver,
    durations: DurationCache,
    cleanup: CleanupScheduler,
    batcher: ClipBatcher,
    config: RenderConfig,
    progress: Option<ProgressCallback>,
}

impl RenderPipeline {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        resolver: MediaResolver,
        durations: DurationCache,
        config: &RenderConfig,
    ) -> Self {
        Self {
            transcoder,
            resolver,
            durations,
            cleanup: CleanupScheduler::new(Duration::from_secs(config.retention_secs)),
            batcher: ClipBatcher::new(config.max_concurrent_clips),
            config: config.clone(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn cleanup(&self) -> &CleanupScheduler {
        &self.cleanup
    }

    pub fn path_cache(&self) -> &PathCache {
        self.resolver.cache()
    }

    pub fn duration_cache(&self) -> &DurationCache {
        &self.durations
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Parent of every per-run working directory
    pub fn runs_root(&self) -> PathBuf {
        self.config.work_root().join("runs")
    }

    fn report(&self, stage: RenderStage, done: usize, total: usize) {
        if done == 0 {
            info!("Stage {}/{}: {}", stage.index() + 1, RenderStage::ALL.len(), stage);
        }
        if let Some(progress) = &self.progress {
            progress(stage, done, total);
        }
    }

    /// Drop both caches; safe at any idle point
    pub fn clear_caches(&self) {
        self.resolver.cache().clear();
        self.durations.clear();
    }

    /// Resolve every reference to a local file, in order
    pub async fn resolve_inputs(&self, references: &[&str]) -> Result<Vec<PathBuf>, ResolveError> {
        let total = references.len();
        self.report(RenderStage::ResolveInputs, 0, total);

        let mut resolved = Vec::with_capacity(total);
        for (i, reference) in references.iter().enumerate() {
            resolved.push(self.resolver.resolve(reference).await?);
            self.report(RenderStage::ResolveInputs, i + 1, total);
        }
        Ok(resolved)
    }

    /// Media duration, measured once per TTL
    pub async fn measure(&self, path: &Path) -> Result<f64, RenderError> {
        if let Some(seconds) = self.durations.get(path) {
            return Ok(seconds);
        }

        let seconds = self.transcoder.probe_duration(path).await?;
        self.durations.insert(path, seconds);
        Ok(seconds)
    }

    fn video_encode_args(&self) -> Vec<String> {
        vec![
            "-c:v".into(),
            self.config.video_codec.clone(),
            "-preset".into(),
            self.config.preset.clone(),
            "-crf".into(),
            self.config.crf.to_string(),
            "-pix_fmt".into(),
            "yuv420p".into(),
        ]
    }

    fn audio_encode_args(&self) -> Vec<String> {
        vec![
            "-c:a".into(),
            self.config.audio_codec.clone(),
            "-b:a".into(),
            self.config.audio_bitrate.clone(),
        ]
    }

    /// Silent clip for one section
    pub fn clip_invocation(&self, index: usize, spec: &ClipSpec, plan: &RenderPlan, output: &Path) -> Result<FfmpegInvocation, RenderError> {
        let fps = self.config.fps.to_string();
        let stage = format!("clip {}", index + 1);

        let invocation = match spec.kind {
            MediaKind::Image => FfmpegInvocation::new(stage)
                .args(["-loop", "1", "-framerate", fps.as_str(), "-t", secs(spec.duration).as_str()])
                .input(&spec.media)
                .arg("-filter_complex")
                .arg(filters::ken_burns_filter(plan.width, plan.height, self.config.fps, spec.duration, self.config.zoom_peak))
                .args(["-map", "[v]", "-t", secs(spec.duration).as_str(), "-r", fps.as_str()]),
            MediaKind::Video => FfmpegInvocation::new(stage)
                .args(["-stream_loop", "-1"])
                .input(&spec.media)
                .args(["-t", secs(spec.duration).as_str(), "-vf"])
                .arg(filters::video_fit_filter(plan.width, plan.height, self.config.fps))
                .args(["-r", fps.as_str()]),
            other => {
                return Err(RenderError::StageFailed {
                    stage,
                    message: format!("{:?} media cannot be used as a section visual", other),
                })
            }
        };

        Ok(invocation.args(self.video_encode_args()).arg("-an").output(output))
    }

    /// Mux the section's audio onto its silent clip, enforcing the section length
    pub fn attach_audio_invocation(
        &self,
        index: usize,
        clip: &Path,
        spec: &ClipSpec,
        narration: Option<&Path>,
        output: &Path,
    ) -> Result<FfmpegInvocation, RenderError> {
        let stage = format!("audio {}", index + 1);
        let base = FfmpegInvocation::new(stage.clone()).input(clip);

        let with_audio = match &spec.audio {
            ClipAudio::Own(audio) => base.input(audio),
            ClipAudio::NarrationSlice { start } => {
                let narration = narration.ok_or_else(|| RenderError::StageFailed {
                    stage,
                    message: "narration slice requested without a narration track".to_string(),
                })?;
                base.args(["-ss", secs(*start).as_str(), "-t", secs(spec.duration).as_str()])
                    .input(narration)
            }
        };

        Ok(with_audio
            .args(["-map", "0:v:0", "-map", "1:a:0", "-c:v", "copy"])
            .args(self.audio_encode_args())
            .args(["-shortest", "-t", secs(spec.duration).as_str()])
            .output(output))
    }

    fn concat_invocation(list: &Path, output: &Path) -> FfmpegInvocation {
        FfmpegInvocation::new("concatenate")
            .args(["-f", "concat", "-safe", "0"])
            .input(list)
            .args(["-c", "copy"])
            .output(output)
    }

    /// Replace the section audio with the full narration, re-encoding to trim exactly
    pub fn narration_invocation(&self, video: &Path, narration: &Path, target: f64, output: &Path) -> FfmpegInvocation {
        FfmpegInvocation::new("attach narration")
            .input(video)
            .input(narration)
            .args(["-map", "0:v:0", "-map", "1:a:0"])
            .args(self.video_encode_args())
            .args(self.audio_encode_args())
            .args(["-t", secs(target).as_str()])
            .output(output)
    }

    fn burn_invocation(&self, stage: &str, video: &Path, filter: String, output: &Path) -> FfmpegInvocation {
        FfmpegInvocation::new(stage)
            .input(video)
            .arg("-vf")
            .arg(filter)
            .args(self.video_encode_args())
            .args(["-c:a", "copy"])
            .output(output)
    }

    /// Trim or pad to `target` in one pass
    pub fn reconcile_invocation(&self, video: &Path, measured: f64, target: f64, output: &Path) -> FfmpegInvocation {
        let mut invocation = FfmpegInvocation::new("reconcile").input(video);
        if measured < target {
            invocation = invocation
                .arg("-vf")
                .arg(filters::clone_pad_filter(target - measured))
                .args(["-af", "apad"]);
        }

        invocation
            .args(["-t", secs(target).as_str()])
            .args(self.video_encode_args())
            .args(self.audio_encode_args())
            .output(output)
    }

    /// Run stages 2 to 9 for a resolved plan.
    ///
    /// On success the intermediates go away (now, or after the retention
    /// window when eager cleanup is off) and both caches are cleared. On
    /// failure the run directory is kept for the retention window.
    pub async fn render(&self, plan: &RenderPlan) -> Result<RenderOutcome, RenderError> {
        if plan.clips.is_empty() {
            return Err(RenderError::StageFailed {
                stage: RenderStage::SynthesizeClips.label().to_string(),
                message: "no sections to render".to_string(),
            });
        }

        let run_id = Uuid::new_v4();
        let run_dir = FileManager::run_dir(self.runs_root(), &run_id);
        tokio::fs::create_dir_all(&run_dir).await?;
        info!("Render {} started in {:?}", run_id, run_dir);

        let result = self.render_stages(plan, &run_dir).await;

        self.report(RenderStage::Cleanup, 0, 1);
        match result {
            Ok((duration, reconciled)) => {
                if self.config.eager_cleanup {
                    self.cleanup.remove_now(&run_dir).await;
                } else {
                    self.cleanup.schedule(run_dir);
                }
                self.clear_caches();
                self.report(RenderStage::Cleanup, 1, 1);

                info!("Render {} finished: {:?} ({:.3}s)", run_id, plan.output, duration);
                Ok(RenderOutcome {
                    output: plan.output.clone(),
                    duration,
                    reconciled,
                    run_id,
                })
            }
            Err(e) => {
                error!("Render {} failed: {}", run_id, e);
                self.cleanup.schedule(run_dir);
                Err(e)
            }
        }
    }

    async fn render_stages(&self, plan: &RenderPlan, run_dir: &Path) -> Result<(f64, bool), RenderError> {
        let total = plan.clips.len();

        // Stage 2: silent clips
        self.report(RenderStage::SynthesizeClips, 0, total);
        let clips = self
            .batcher
            .run(
                plan.clips.iter().collect::<Vec<_>>(),
                |index, spec| {
                    let output = run_dir.join(format!("clip_{:03}.mp4", index));
                    let invocation = self.clip_invocation(index, spec, plan, &output);
                    async move {
                        self.transcoder.run(&invocation?).await?;
                        Ok::<PathBuf, RenderError>(output)
                    }
                },
                |done, total| self.report(RenderStage::SynthesizeClips, done, total),
            )
            .await?;

        // Stage 3: per-section audio
        self.report(RenderStage::AttachSectionAudio, 0, total);
        let narration = plan.narration.as_deref();
        let sections = self
            .batcher
            .run(
                clips.into_iter().zip(plan.clips.iter()).collect::<Vec<_>>(),
                |index, (clip, spec)| {
                    let output = run_dir.join(format!("section_{:03}.mp4", index));
                    let invocation = self.attach_audio_invocation(index, &clip, spec, narration, &output);
                    async move {
                        self.transcoder.run(&invocation?).await?;
                        Ok::<PathBuf, RenderError>(output)
                    }
                },
                |done, total| self.report(RenderStage::AttachSectionAudio, done, total),
            )
            .await?;

        // Stage 4: concatenation, list entries are relative to the list file
        self.report(RenderStage::Concatenate, 0, 1);
        let list_path = run_dir.join("concat.txt");
        tokio::fs::write(&list_path, concat_list(&sections)).await?;
        let mut current = run_dir.join("concat.mp4");
        self.transcoder.run(&Self::concat_invocation(&list_path, &current)).await?;
        self.report(RenderStage::Concatenate, 1, 1);

        // Stage 5: full narration
        if let Some(narration) = narration {
            self.report(RenderStage::AttachNarration, 0, 1);
            let output = run_dir.join("narrated.mp4");
            self.transcoder
                .run(&self.narration_invocation(&current, narration, plan.target_duration, &output))
                .await?;
            current = output;
            self.report(RenderStage::AttachNarration, 1, 1);
        } else {
            debug!("No narration track, keeping per-section audio");
        }

        // Stage 6: headline
        if let Some(headline) = plan.headline.as_ref().filter(|d| !d.is_empty()) {
            self.report(RenderStage::BurnHeadline, 0, 1);
            let subtitle_path = run_dir.join("headline.ass");
            write_document(headline, &subtitle_path, SubtitleFormat::Ass)?;
            let output = run_dir.join("headline.mp4");
            let filter = filters::subtitle_burn_filter(&subtitle_path, SubtitleFormat::Ass, None);
            self.transcoder
                .run(&self.burn_invocation(RenderStage::BurnHeadline.label(), &current, filter, &output))
                .await?;
            current = output;
            self.report(RenderStage::BurnHeadline, 1, 1);
        }

        // Stage 7: captions
        if let Some(burn) = plan.captions.as_ref().filter(|b| !b.document.is_empty()) {
            self.report(RenderStage::BurnCaptions, 0, 1);
            let subtitle_path = run_dir.join(format!("captions.{}", burn.format.extension()));
            write_document(&burn.document, &subtitle_path, burn.format)?;
            let output = run_dir.join("captioned.mp4");
            let filter = filters::subtitle_burn_filter(&subtitle_path, burn.format, burn.document.style(CAPTION_STYLE));
            self.transcoder
                .run(&self.burn_invocation(RenderStage::BurnCaptions.label(), &current, filter, &output))
                .await?;
            current = output;
            self.report(RenderStage::BurnCaptions, 1, 1);
        }

        // Stage 8: duration reconciliation
        self.report(RenderStage::Reconcile, 0, 1);
        let tolerance = self.config.drift_tolerance_ms as f64 / 1000.0;
        let mut duration = self.measure(&current).await?;
        let mut reconciled = false;

        if (duration - plan.target_duration).abs() > tolerance {
            warn!(
                "Output is {:.3}s, expected {:.3}s; reconciling",
                duration, plan.target_duration
            );
            let output = run_dir.join("reconciled.mp4");
            self.transcoder
                .run(&self.reconcile_invocation(&current, duration, plan.target_duration, &output))
                .await?;

            duration = self.measure(&output).await?;
            if (duration - plan.target_duration).abs() > tolerance {
                return Err(RenderError::DurationDrift {
                    expected: plan.target_duration,
                    actual: duration,
                });
            }
            current = output;
            reconciled = true;
        }
        self.report(RenderStage::Reconcile, 1, 1);

        if let Some(parent) = plan.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&current, &plan.output).await?;

        Ok((duration, reconciled))
    }
}

fn write_document(document: &SubtitleDocument, path: &Path, format: SubtitleFormat) -> Result<(), RenderError> {
    document
        .write_to_file(path, format)
        .map_err(|e| RenderError::Io(std::io::Error::other(e.to_string())))
}

/// Concat demuxer list naming each file relative to the list's directory
pub fn concat_list(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string_lossy().into_owned());
            format!("file '{}'\n", name.replace('\'', "'\\''"))
        })
        .collect()
}
