/*!
 * Filter-graph builders for the render stages.
 *
 * These are pure string builders so each graph can be checked without
 * running ffmpeg.
 */

use std::path::Path;

use crate::app_config::SubtitleFormat;
use crate::subtitle::SubtitleStyle;

/// Frames needed to cover `duration` seconds, at least one
pub fn frame_count(duration: f64, fps: u32) -> u64 {
    ((duration * fps as f64).round() as u64).max(1)
}

/// Two-layer pan/zoom treatment for a still image.
///
/// The background is the image scaled to fill and blurred; the foreground is
/// the whole image fitted inside the frame and slowly zoomed towards
/// `zoom_peak` over the clip.
pub fn ken_burns_filter(width: u32, height: u32, fps: u32, duration: f64, zoom_peak: f64) -> String {
    let frames = frame_count(duration, fps);
    format!(
        "[0:v]split=2[bgsrc][fgsrc];\
         [bgsrc]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},boxblur=20:5,setsar=1[bg];\
         [fgsrc]scale={w}:{h}:force_original_aspect_ratio=decrease,format=yuva420p,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black@0,\
         zoompan=z='1+{extra:.4}*on/{frames}':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d=1:s={w}x{h}:fps={fps},setsar=1[fg];\
         [bg][fg]overlay=(W-w)/2:(H-h)/2,format=yuv420p,fps={fps}[v]",
        w = width,
        h = height,
        fps = fps,
        frames = frames,
        extra = zoom_peak - 1.0,
    )
}

/// Letterbox a video into the output frame at a fixed rate
pub fn video_fit_filter(width: u32, height: u32, fps: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1,fps={fps},format=yuv420p",
        w = width,
        h = height,
        fps = fps,
    )
}

/// Escape a path for use as a filter option value
pub fn escape_filter_path(path: &Path) -> String {
    let normalized = path.to_string_lossy().replace('\\', "/");
    let mut escaped = String::with_capacity(normalized.len() + 12);
    for ch in normalized.chars() {
        match ch {
            ':' => escaped.push_str("\\:"),
            '\'' => escaped.push_str("\\'"),
            ',' => escaped.push_str("\\,"),
            ';' => escaped.push_str("\\;"),
            '[' => escaped.push_str("\\["),
            ']' => escaped.push_str("\\]"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// `force_style` value mirroring a document style, for SubRip input
pub fn force_style(style: &SubtitleStyle) -> String {
    format!(
        "Fontname={},Fontsize={},PrimaryColour={},OutlineColour={},BackColour={},Bold={},BorderStyle={},Outline={},Shadow={},Alignment={},MarginV={}",
        style.font_name,
        style.font_size,
        style.primary_colour,
        style.outline_colour,
        style.back_colour,
        if style.bold { 1 } else { 0 },
        style.border_style,
        style.outline,
        style.shadow,
        style.alignment,
        style.margin_v,
    )
}

/// Burn-in filter for a subtitle file.
///
/// ASS files carry their own styles and go through the `ass` filter. Other
/// families go through `subtitles`, optionally restyled with `force_style`.
pub fn subtitle_burn_filter(path: &Path, format: SubtitleFormat, style: Option<&SubtitleStyle>) -> String {
    let escaped = escape_filter_path(path);
    match (format, style) {
        (SubtitleFormat::Ass, _) => format!("ass={}", escaped),
        (_, Some(style)) => format!("subtitles={}:force_style='{}'", escaped, force_style(style)),
        (_, None) => format!("subtitles={}", escaped),
    }
}

/// Hold the last frame for `pad_secs`
pub fn clone_pad_filter(pad_secs: f64) -> String {
    format!("tpad=stop_mode=clone:stop_duration={:.3}", pad_secs.max(0.0))
}

/// Seconds formatted the way every stage passes durations to ffmpeg
pub fn secs(value: f64) -> String {
    format!("{:.3}", value.max(0.0))
}
