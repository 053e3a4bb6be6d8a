/*!
 * Media plumbing shared by the render pipeline.
 *
 * - `cache`: path and duration caches
 * - `resolver`: local or remote reference resolution
 * - `ffmpeg`: the `Transcoder` seam and its ffmpeg/ffprobe implementation
 * - `filters`: filter-graph builders
 */

pub use self::cache::{DurationCache, PathCache};
pub use self::ffmpeg::{filter_ffmpeg_stderr, FfmpegCli, FfmpegInvocation, Transcoder};
pub use self::resolver::{MediaRef, MediaResolver};

pub mod cache;
pub mod ffmpeg;
pub mod filters;
pub mod resolver;
