use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error};
use tokio::process::Command;

use crate::app_config::RenderConfig;
use crate::errors::RenderError;

// @module: Transcoder invocation

/// A single ffmpeg run: arguments after the global flags, plus the file it produces
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegInvocation {
    // @field: Stage label used in logs and errors
    pub stage: String,

    // @field: Arguments, output path last
    pub args: Vec<String>,

    // @field: File written by this run
    pub output: PathBuf,
}

impl FfmpegInvocation {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            args: Vec::new(),
            output: PathBuf::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn input(self, path: &Path) -> Self {
        self.arg("-i").arg(path.to_string_lossy())
    }

    pub fn output(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self.output = path.to_path_buf();
        self
    }

    /// Whether an argument appears anywhere in the invocation
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }

    /// Value that follows a flag, e.g. `value_of("-t")`
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

/// External transcoder used by the render pipeline
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Run one invocation to completion
    async fn run(&self, invocation: &FfmpegInvocation) -> Result<(), RenderError>;

    /// Container duration in seconds
    async fn probe_duration(&self, path: &Path) -> Result<f64, RenderError>;
}

/// ffmpeg/ffprobe binaries on the host
#[derive(Debug, Clone)]
pub struct FfmpegCli {
    ffmpeg_path: String,
    ffprobe_path: String,
    ffmpeg_timeout: Duration,
    ffprobe_timeout: Duration,
}

impl FfmpegCli {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            ffprobe_path: config.ffprobe_path.clone(),
            ffmpeg_timeout: Duration::from_secs(config.ffmpeg_timeout_secs),
            ffprobe_timeout: Duration::from_secs(config.ffprobe_timeout_secs),
        }
    }

    /// Check that both binaries start
    pub async fn test_connection(&self) -> Result<(), RenderError> {
        for program in [&self.ffmpeg_path, &self.ffprobe_path] {
            let output = Command::new(program)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map_err(|e| RenderError::Spawn {
                    program: program.clone(),
                    message: e.to_string(),
                })?;

            if !output.success() {
                return Err(RenderError::Spawn {
                    program: program.clone(),
                    message: format!("exited with {}", output),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Transcoder for FfmpegCli {
    async fn run(&self, invocation: &FfmpegInvocation) -> Result<(), RenderError> {
        debug!("[{}] {} {}", invocation.stage, self.ffmpeg_path, invocation.args.join(" "));

        let ffmpeg_future = Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-nostdin", "-y"])
            .args(&invocation.args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let result = tokio::select! {
            result = ffmpeg_future => {
                result.map_err(|e| RenderError::Spawn {
                    program: self.ffmpeg_path.clone(),
                    message: e.to_string(),
                })?
            },
            _ = tokio::time::sleep(self.ffmpeg_timeout) => {
                return Err(RenderError::Timeout {
                    program: self.ffmpeg_path.clone(),
                    secs: self.ffmpeg_timeout.as_secs(),
                });
            }
        };

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let filtered = filter_ffmpeg_stderr(&stderr);
            error!("Stage '{}' failed: {}", invocation.stage, filtered);
            return Err(RenderError::StageFailed {
                stage: invocation.stage.clone(),
                message: filtered,
            });
        }

        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64, RenderError> {
        if !path.exists() {
            return Err(RenderError::Probe {
                path: path.to_path_buf(),
                message: "file not found".to_string(),
            });
        }

        let ffprobe_future = Command::new(&self.ffprobe_path)
            .args([
                "-v", "error",
                "-show_entries", "format=duration",
                "-of", "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::select! {
            result = ffprobe_future => {
                result.map_err(|e| RenderError::Spawn {
                    program: self.ffprobe_path.clone(),
                    message: e.to_string(),
                })?
            },
            _ = tokio::time::sleep(self.ffprobe_timeout) => {
                return Err(RenderError::Timeout {
                    program: self.ffprobe_path.clone(),
                    secs: self.ffprobe_timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            return Err(RenderError::Probe {
                path: path.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_probe_output(&String::from_utf8_lossy(&output.stdout)).map_err(|message| RenderError::Probe {
            path: path.to_path_buf(),
            message,
        })
    }
}

/// Parse the single number ffprobe prints for `format=duration`
pub fn parse_probe_output(stdout: &str) -> Result<f64, String> {
    let value = stdout.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    match value.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => Ok(seconds),
        Ok(seconds) => Err(format!("invalid duration {}", seconds)),
        Err(_) => Err(format!("unparseable duration '{}'", value)),
    }
}

/// Filter ffmpeg stderr to only show meaningful error lines, stripping the
/// version banner, build configuration, and stream metadata noise.
pub fn filter_ffmpeg_stderr(stderr: &str) -> String {
    let dominated_prefixes = [
        "ffmpeg version",
        "built with",
        "configuration:",
        "libav",
        "libsw",
        "libpostproc",
        "Input #",
        "Metadata:",
        "Duration:",
        "Stream #",
        "encoder",
        "handler_name",
        "vendor_id",
        "major_brand",
        "minor_version",
        "compatible_brands",
        "creation_time",
        "Output #",
        "Stream mapping:",
        "Press [q]",
        "frame=",
        "size=",
    ];

    let meaningful: Vec<&str> = stderr
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return false;
            }
            !dominated_prefixes.iter().any(|p| trimmed.starts_with(p))
        })
        .collect();

    if meaningful.is_empty() {
        "unknown ffmpeg error (stderr was empty after filtering)".to_string()
    } else {
        meaningful.join("\n")
    }
}
