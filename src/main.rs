// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use capsync::app_config::{self, CaptionMode, Config, SubtitleFormat};
use capsync::media::FfmpegCli;
use capsync::render::{ProgressCallback, RenderStage};
use capsync::{Controller, RenderRequest, TranscriptionResponse};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for CaptionMode to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliCaptionMode {
    None,
    Plain,
    Karaoke,
}

impl From<CliCaptionMode> for CaptionMode {
    fn from(mode: CliCaptionMode) -> Self {
        match mode {
            CliCaptionMode::None => CaptionMode::None,
            CliCaptionMode::Plain => CaptionMode::Plain,
            CliCaptionMode::Karaoke => CaptionMode::Karaoke,
        }
    }
}

/// CLI Wrapper for SubtitleFormat to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliSubtitleFormat {
    Ass,
    Srt,
    Vtt,
}

impl From<CliSubtitleFormat> for SubtitleFormat {
    fn from(format: CliSubtitleFormat) -> Self {
        match format {
            CliSubtitleFormat::Ass => SubtitleFormat::Ass,
            CliSubtitleFormat::Srt => SubtitleFormat::Srt,
            CliSubtitleFormat::Vtt => SubtitleFormat::Vtt,
        }
    }
}

#[derive(Args, Debug)]
struct TranscriptArgs {
    /// Project manifest (JSON)
    #[arg(value_name = "MANIFEST")]
    manifest: PathBuf,

    /// Saved speech-to-text response (JSON)
    #[arg(short, long)]
    transcript: PathBuf,

    /// Measured narration duration in seconds
    #[arg(short, long)]
    audio_duration: f64,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a project manifest to a captioned video
    Render {
        /// Project manifest (JSON)
        #[arg(value_name = "MANIFEST")]
        manifest: PathBuf,

        /// Override the output path from the manifest
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Caption style
        #[arg(short = 'm', long, value_enum)]
        caption_mode: Option<CliCaptionMode>,

        /// Subtitle file family used for the caption burn
        #[arg(short, long, value_enum)]
        format: Option<CliSubtitleFormat>,

        /// Fail instead of falling back when transcription fails
        #[arg(long)]
        captions_required: bool,
    },

    /// Align captions against a saved transcript and print the section timings
    Align(TranscriptArgs),

    /// Write the caption document for a saved transcript
    Subtitles {
        #[command(flatten)]
        transcript: TranscriptArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "ass")]
        format: CliSubtitleFormat,

        /// Caption style
        #[arg(short = 'm', long, value_enum)]
        caption_mode: Option<CliCaptionMode>,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check the speech-to-text engine and the ffmpeg binaries
    Health,

    /// Generate shell completions for capsync
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// capsync - narrated video captioning
///
/// Aligns caption text to a machine transcript of the narration and renders
/// the sections into one video with burned-in captions.
#[derive(Parser, Debug)]
#[command(name = "capsync")]
#[command(version)]
#[command(about = "Narrated video captioning tool")]
#[command(long_about = "capsync aligns caption text to a word-level transcript and renders captioned videos with ffmpeg.

EXAMPLES:
    capsync render project.json                          # Render using default config
    capsync render -m karaoke project.json               # Word-by-word highlighted captions
    capsync align project.json -t words.json -a 42.5     # Print section timings
    capsync subtitles project.json -t words.json -a 42.5 -f srt -o captions.srt
    capsync health                                       # Check whisper worker and ffmpeg
    capsync completions bash > capsync.bash              # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config-path. If the config file doesn't exist, a default one
    will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌",
            Level::Warn => "🚧",
            Level::Info => " ",
            Level::Debug => "🔍",
            Level::Trace => "📋",
        }
    }

    // @returns: ANSI colour for log level
    fn get_colour_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "1;31",
            Level::Warn => "1;33",
            Level::Info => "1;32",
            Level::Debug => "1;36",
            Level::Trace => "1;35",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S%.3f");
            let level = record.level();

            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "\x1B[{}m{} {} {}\x1B[0m",
                Self::get_colour_for_level(level),
                now,
                Self::get_emoji_for_level(level),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the config says otherwise
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "capsync", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config_path, cli.log_level.clone())?;
    log::set_max_level(level_filter(&config.log_level));

    match cli.command {
        Commands::Render {
            manifest,
            output,
            caption_mode,
            format,
            captions_required,
        } => {
            let mut request = RenderRequest::from_file(&manifest)?;
            if let Some(output) = output {
                request.output = output;
            }
            if let Some(mode) = caption_mode {
                request.caption_mode = Some(mode.into());
            }
            if let Some(format) = format {
                request.caption_format = Some(format.into());
            }
            request.captions_required |= captions_required;
            run_render(config, request).await
        }
        Commands::Align(args) => run_align(config, args),
        Commands::Subtitles {
            transcript,
            format,
            caption_mode,
            output,
        } => run_subtitles(config, transcript, format.into(), caption_mode.map(Into::into), output),
        Commands::Health => run_health(config).await,
        Commands::Completions { .. } => Ok(()),
    }
}

/// Load the config file, creating it with defaults when missing, then apply CLI overrides
fn load_config(config_path: &str, log_level: Option<CliLogLevel>) -> Result<Config> {
    let mut config = if Path::new(config_path).exists() {
        let file = File::open(config_path).context(format!("Failed to open config file: {}", config_path))?;

        let reader = BufReader::new(file);
        serde_json::from_reader(reader).context(format!("Failed to parse config file: {}", config_path))?
    } else {
        warn!("Config file not found at '{}', creating default config.", config_path);

        let config = Config::default();
        let config_json =
            serde_json::to_string_pretty(&config).context("Failed to serialize default config to JSON")?;
        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;

        config
    };

    if let Some(log_level) = log_level {
        config.log_level = log_level.into();
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

fn stage_progress_bar() -> ProgressBar {
    let progress_bar = ProgressBar::new(RenderStage::ALL.len() as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} stages {msg}")
        .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(style.progress_chars("█▓▒░"));
    progress_bar.enable_steady_tick(Duration::from_millis(120));
    progress_bar
}

async fn run_render(config: Config, request: RenderRequest) -> Result<()> {
    let progress_bar = stage_progress_bar();
    let bar = progress_bar.clone();
    let progress: ProgressCallback = Arc::new(move |stage: RenderStage, done: usize, total: usize| {
        bar.set_position(stage.index() as u64);
        if total > 1 {
            bar.set_message(format!("{} ({}/{})", stage, done, total));
        } else {
            bar.set_message(stage.to_string());
        }
    });

    let controller = Controller::with_components(
        config.clone(),
        Arc::new(capsync::providers::whisper::WhisperClient::from_config(&config.transcription)),
        Arc::new(FfmpegCli::new(&config.render)),
        Some(progress),
    )?;

    let pipeline = controller.pipeline();
    let swept = pipeline.cleanup().sweep(&pipeline.runs_root());
    if swept > 0 {
        info!("Removed {} stale work directories", swept);
    }

    let result = controller.render(request).await;
    progress_bar.finish_and_clear();

    let flushed = pipeline.cleanup().flush().await;
    if flushed > 0 {
        info!("Removed {} retained work directories before exit", flushed);
    }

    match result {
        Ok(outcome) => {
            info!("Success: {:?} ({:.3}s)", outcome.output, outcome.duration);
            Ok(())
        }
        Err(e) => {
            error!("Render failed: {}", e);
            Err(anyhow!(e))
        }
    }
}

fn load_transcript(args: &TranscriptArgs) -> Result<(RenderRequest, TranscriptionResponse)> {
    let mut request = RenderRequest::from_file(&args.manifest)?;
    request.validate()?;

    let raw = std::fs::read_to_string(&args.transcript)
        .context(format!("Failed to read transcript: {:?}", args.transcript))?;
    let response = TranscriptionResponse::from_json(&raw)?;

    if !(args.audio_duration > 0.0) {
        return Err(anyhow!("--audio-duration must be positive"));
    }
    Ok((request, response))
}

fn timing_plan(controller: &Controller, args: &TranscriptArgs) -> Result<(RenderRequest, capsync::TimingPlan)> {
    let (request, response) = load_transcript(args)?;
    let captions = request.captions();

    let plan = match controller.align_transcript(&captions, &response, args.audio_duration) {
        Ok(plan) => plan,
        Err(e) => {
            warn!("Transcript unusable, splitting by caption length: {}", e);
            controller.fallback_plan(&captions, args.audio_duration)
        }
    };
    Ok((request, plan))
}

fn run_align(config: Config, args: TranscriptArgs) -> Result<()> {
    let controller = Controller::with_config(config)?;
    let (_, plan) = timing_plan(&controller, &args)?;

    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn run_subtitles(
    config: Config,
    args: TranscriptArgs,
    format: SubtitleFormat,
    caption_mode: Option<CaptionMode>,
    output: Option<PathBuf>,
) -> Result<()> {
    let controller = Controller::with_config(config)?;
    let (request, plan) = timing_plan(&controller, &args)?;

    let render = &controller.config().render;
    let mode = caption_mode
        .or(request.caption_mode)
        .unwrap_or(controller.config().captions.mode);
    let document = controller
        .caption_document(
            &request.captions(),
            &plan,
            mode,
            request.width.unwrap_or(render.width),
            request.height.unwrap_or(render.height),
        )?
        .ok_or_else(|| anyhow!("Caption mode is 'none', nothing to write"))?;

    match output {
        Some(path) => {
            document.write_to_file(&path, format)?;
            info!("Success: {:?}", path);
        }
        None => print!("{}", document.render(format)),
    }
    Ok(())
}

async fn run_health(config: Config) -> Result<()> {
    let ffmpeg = FfmpegCli::new(&config.render);
    let controller = Controller::with_config(config)?;

    let mut healthy = true;
    match controller.health().await {
        Ok(health) => info!(
            "Whisper worker: {} (model loaded: {}, size: {})",
            health.status,
            health.model_loaded,
            health.model_size.as_deref().unwrap_or("unknown")
        ),
        Err(e) => {
            error!("Whisper worker unavailable: {}", e);
            healthy = false;
        }
    }

    match ffmpeg.test_connection().await {
        Ok(()) => info!("ffmpeg and ffprobe found"),
        Err(e) => {
            error!("ffmpeg unavailable: {}", e);
            healthy = false;
        }
    }

    if healthy {
        Ok(())
    } else {
        Err(anyhow!("Health check failed"))
    }
}
