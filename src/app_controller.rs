use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::alignment::{
    proportional_timings, sequential_timings, SectionTiming, SequentialAligner, TimingNormalizer,
};
use crate::app_config::{CaptionMode, Config};
use crate::errors::{AppError, TranscriptionError};
use crate::file_utils::{FileManager, MediaKind};
use crate::jobs::{JobRecord, JobStore};
use crate::language_utils;
use crate::media::{DurationCache, FfmpegCli, MediaResolver, PathCache, Transcoder};
use crate::project::RenderRequest;
use crate::providers::whisper::WhisperClient;
use crate::providers::{EngineHealth, Transcriber};
use crate::render::{
    ClipAudio, ClipSpec, ProgressCallback, RenderOutcome, RenderPipeline, RenderPlan, SubtitleBurn,
};
use crate::subtitle::{SubtitleDocument, SubtitleSynthesizer};
use crate::transcript::{extract_words, TranscriptionResponse};

// @module: Application controller for caption rendering

/// Section timings and how they were obtained
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingPlan {
    // @field: Contiguous timings starting at zero
    pub timings: Vec<SectionTiming>,

    // @field: Sections the aligner could not place
    pub fallback_sections: Vec<usize>,

    // @field: False when timings are a proportional guess without a transcript
    pub aligned: bool,
}

/// Main application controller
#[derive(Clone)]
pub struct Controller {
    // @field: App configuration
    config: Config,

    transcriber: Arc<dyn Transcriber>,

    pipeline: Arc<RenderPipeline>,

    aligner: SequentialAligner,

    normalizer: TimingNormalizer,

    jobs: JobStore,

    // @field: One render at a time
    render_lock: Arc<Mutex<()>>,
}

impl Controller {
    // @method: Create a controller backed by the whisper worker and host ffmpeg
    pub fn with_config(config: Config) -> Result<Self, AppError> {
        let transcriber = Arc::new(WhisperClient::from_config(&config.transcription));
        let transcoder = Arc::new(FfmpegCli::new(&config.render));
        Self::with_components(config, transcriber, transcoder, None)
    }

    /// Create a controller with explicit collaborators
    pub fn with_components(
        config: Config,
        transcriber: Arc<dyn Transcriber>,
        transcoder: Arc<dyn Transcoder>,
        progress: Option<ProgressCallback>,
    ) -> Result<Self, AppError> {
        config.validate()?;

        let resolver = MediaResolver::new(
            config.render.work_root().join("downloads"),
            PathCache::from_config(&config.cache),
            Duration::from_secs(config.cache.download_timeout_secs),
        );
        let mut pipeline = RenderPipeline::new(
            transcoder,
            resolver,
            DurationCache::from_config(&config.cache),
            &config.render,
        );
        if let Some(progress) = progress {
            pipeline = pipeline.with_progress(progress);
        }

        Ok(Self {
            aligner: SequentialAligner::from_config(&config.alignment),
            normalizer: TimingNormalizer::new(config.alignment.tolerance_ms),
            config,
            transcriber,
            pipeline: Arc::new(pipeline),
            jobs: JobStore::new(),
            render_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    /// Check the speech-to-text engine
    pub async fn health(&self) -> Result<EngineHealth, AppError> {
        Ok(self.transcriber.test_connection().await?)
    }

    /// Align captions against an engine response and normalize to `audio_total`
    pub fn align_transcript<S: AsRef<str>>(
        &self,
        captions: &[S],
        response: &TranscriptionResponse,
        audio_total: f64,
    ) -> Result<TimingPlan, TranscriptionError> {
        let words = extract_words(response.segments()?);
        if words.is_empty() {
            return Err(TranscriptionError::MissingWordTimestamps);
        }
        debug!("Extracted {} words for {} sections", words.len(), captions.len());

        let report = self.aligner.align(&words, captions);
        if !report.fallback_sections.is_empty() {
            warn!(
                "{} of {} sections could not be aligned: {:?}",
                report.fallback_sections.len(),
                captions.len(),
                report.fallback_sections
            );
        }

        Ok(TimingPlan {
            timings: self.normalizer.normalize(&report.timings, audio_total),
            fallback_sections: report.fallback_sections,
            aligned: true,
        })
    }

    /// Caption-length split of `audio_total`, used when there is no transcript
    pub fn fallback_plan<S: AsRef<str>>(&self, captions: &[S], audio_total: f64) -> TimingPlan {
        TimingPlan {
            timings: proportional_timings(captions, audio_total),
            fallback_sections: (0..captions.len()).collect(),
            aligned: false,
        }
    }

    /// Caption document for a timing plan, `None` when captions are off
    pub fn caption_document<S: AsRef<str>>(
        &self,
        captions: &[S],
        plan: &TimingPlan,
        mode: CaptionMode,
        width: u32,
        height: u32,
    ) -> Result<Option<SubtitleDocument>, AppError> {
        if mode == CaptionMode::None {
            return Ok(None);
        }

        let mut caption_config = self.config.captions.clone();
        caption_config.mode = mode;
        let synthesizer = SubtitleSynthesizer::new(&caption_config, width, height)?;

        let document = if plan.aligned {
            synthesizer.captions(captions, &plan.timings)
        } else {
            let total = plan.timings.last().map(|t| t.end).unwrap_or(0.0);
            synthesizer.fallback(captions, total)
        };
        Ok(Some(document))
    }

    fn language_hint(&self, request: &RenderRequest) -> Result<Option<String>, AppError> {
        match request.language.as_ref().or(self.config.transcription.language.as_ref()) {
            Some(code) => Ok(Some(language_utils::to_engine_language(code)?)),
            None => Ok(None),
        }
    }

    async fn narration_plan(
        &self,
        request: &RenderRequest,
        narration: &std::path::Path,
        total: f64,
    ) -> Result<TimingPlan, AppError> {
        let captions = request.captions();
        let language = self.language_hint(request)?;

        let transcribed = match self.transcriber.transcribe(narration, language.as_deref()).await {
            Ok(response) => self.align_transcript(&captions, &response, total),
            Err(e) => Err(e),
        };

        match transcribed {
            Ok(plan) => Ok(plan),
            Err(e) if request.captions_required => {
                error!("Transcription failed and captions are required: {}", e);
                Err(e.into())
            }
            Err(e) => {
                warn!("Transcription failed, falling back to a single caption: {}", e);
                Ok(self.fallback_plan(&captions, total))
            }
        }
    }

    /// Render one request, waiting for any render already in progress
    pub async fn render(&self, request: RenderRequest) -> Result<RenderOutcome, AppError> {
        let _guard = self.render_lock.lock().await;
        self.render_locked(request).await
    }

    async fn render_locked(&self, mut request: RenderRequest) -> Result<RenderOutcome, AppError> {
        let start_time = std::time::Instant::now();
        request.validate()?;

        let width = request.width.unwrap_or(self.config.render.width);
        let height = request.height.unwrap_or(self.config.render.height);
        let count = request.sections.len();
        info!("Rendering {} sections at {}x{} to {:?}", count, width, height, request.output);

        // Narration covers every section, so section audio is left unresolved
        let narrated = request.narration.is_some();
        if narrated {
            for section in request.sections.iter().filter(|s| s.audio.is_some()) {
                debug!("Section {} audio ignored in favour of the narration track", section.order);
            }
        }

        // Media first, then section audio, then narration
        let mut references: Vec<&str> = request.sections.iter().map(|s| s.media.as_str()).collect();
        if !narrated {
            references.extend(request.sections.iter().filter_map(|s| s.audio.as_deref()));
        }
        references.extend(request.narration.as_deref());

        let mut resolved = self.pipeline.resolve_inputs(&references).await?.into_iter();
        let media: Vec<PathBuf> = resolved.by_ref().take(count).collect();
        let section_audio: Vec<Option<PathBuf>> = request
            .sections
            .iter()
            .map(|s| s.audio.as_ref().filter(|_| !narrated).and_then(|_| resolved.next()))
            .collect();
        let narration = request.narration.as_ref().and_then(|_| resolved.next());

        let kinds = media
            .iter()
            .zip(&request.sections)
            .map(|(path, section)| match FileManager::detect_media_kind(path) {
                kind @ (MediaKind::Image | MediaKind::Video) => Ok(kind),
                other => Err(AppError::InvalidRequest(format!(
                    "Section {} media {:?} is {:?}, expected an image or video",
                    section.order, path, other
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (plan, target, audio) = match &narration {
            Some(narration) => {
                let total = self.pipeline.measure(narration).await?;
                let plan = self.narration_plan(&request, narration, total).await?;
                let audio = plan
                    .timings
                    .iter()
                    .map(|t| ClipAudio::NarrationSlice { start: t.start })
                    .collect::<Vec<_>>();
                (plan, total, audio)
            }
            None => {
                let mut durations = Vec::with_capacity(count);
                let mut audio = Vec::with_capacity(count);
                for path in section_audio.into_iter().flatten() {
                    durations.push(self.pipeline.measure(&path).await?);
                    audio.push(ClipAudio::Own(path));
                }
                let plan = TimingPlan {
                    timings: sequential_timings(&durations),
                    fallback_sections: Vec::new(),
                    aligned: true,
                };
                (plan, durations.iter().sum(), audio)
            }
        };

        let captions = request.captions();
        let mode = request.caption_mode.unwrap_or(self.config.captions.mode);
        let format = request.caption_format.unwrap_or(self.config.captions.format);
        let caption_burn = self
            .caption_document(&captions, &plan, mode, width, height)?
            .map(|document| SubtitleBurn { document, format });

        let headline = match request.headline.as_deref().map(str::trim).filter(|h| !h.is_empty()) {
            Some(text) => Some(SubtitleSynthesizer::new(&self.config.captions, width, height)?.headline(text, target)),
            None => None,
        };

        let clips = media
            .into_iter()
            .zip(kinds)
            .zip(plan.timings.iter().zip(audio))
            .map(|((media, kind), (timing, audio))| ClipSpec {
                media,
                kind,
                duration: timing.duration,
                audio,
            })
            .collect();

        let render_plan = RenderPlan {
            clips,
            narration,
            target_duration: target,
            headline,
            captions: caption_burn,
            output: request.output.clone(),
            width,
            height,
        };

        let outcome = self.pipeline.render(&render_plan).await?;
        info!(
            "Render completed in {:.1}s ({} sections, {:.3}s of video)",
            start_time.elapsed().as_secs_f64(),
            count,
            outcome.duration
        );
        Ok(outcome)
    }

    /// Queue a render and return immediately with its job id
    pub fn submit(&self, request: RenderRequest) -> Uuid {
        let id = self.jobs.create();
        let controller = self.clone();

        tokio::spawn(async move {
            let _guard = controller.render_lock.lock().await;
            controller.jobs.mark_processing(&id);

            match controller.render_locked(request).await {
                Ok(outcome) => controller.jobs.mark_completed(&id, outcome.output),
                Err(e) => {
                    error!("Job {} failed: {}", id, e);
                    controller.jobs.mark_failed(&id, e.to_string());
                }
            }
        });

        id
    }

    pub fn job(&self, id: &Uuid) -> Option<JobRecord> {
        self.jobs.get(id)
    }
}
