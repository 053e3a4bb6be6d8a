/*!
 * In-memory subtitle document and its serializers.
 *
 * Cues are built as segment lists and rendered once, per output family:
 * ASS (`to_ass`), SubRip (`to_srt`) and WebVTT (`to_vtt`).
 */

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::app_config::{parse_hex_colour, SubtitleFormat};

use super::markup::Segment;

/// An RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn from_hex(value: &str) -> Result<Self> {
        let (r, g, b) = parse_hex_colour(value)?;
        Ok(Self(r, g, b))
    }

    /// Style-line colour `&HAABBGGRR`
    pub fn to_ass_style(&self, alpha: u8) -> String {
        format!("&H{:02X}{:02X}{:02X}{:02X}", alpha, self.2, self.1, self.0)
    }

    /// Override-tag colour `&HBBGGRR&`
    pub fn to_ass_inline(&self) -> String {
        format!("&H{:02X}{:02X}{:02X}&", self.2, self.1, self.0)
    }

    /// `#rrggbb`
    pub fn to_html(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// A named ASS style record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleStyle {
    pub name: String,
    pub font_name: String,
    pub font_size: u32,
    pub primary_colour: String,
    pub secondary_colour: String,
    pub outline_colour: String,
    pub back_colour: String,
    pub bold: bool,
    pub italic: bool,
    /// 1 = outline and shadow, 3 = opaque box
    pub border_style: u8,
    pub outline: u32,
    pub shadow: u32,
    /// Numpad alignment: 2 bottom centre, 8 top centre
    pub alignment: u8,
    pub margin_l: u32,
    pub margin_r: u32,
    pub margin_v: u32,
}

impl SubtitleStyle {
    fn to_ass_line(&self) -> String {
        format!(
            "Style: {},{},{},{},{},{},{},{},{},0,0,100,100,0,0,{},{},{},{},{},{},{},1",
            self.name,
            self.font_name,
            self.font_size,
            self.primary_colour,
            self.secondary_colour,
            self.outline_colour,
            self.back_colour,
            if self.bold { -1 } else { 0 },
            if self.italic { -1 } else { 0 },
            self.border_style,
            self.outline,
            self.shadow,
            self.alignment,
            self.margin_l,
            self.margin_r,
            self.margin_v,
        )
    }
}

/// One timed cue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleCue {
    // @field: Start in seconds
    pub start_time: f64,

    // @field: End in seconds
    pub end_time: f64,

    // @field: Style name, must exist in the document
    pub style: String,

    // @field: Content runs
    pub segments: Vec<Segment>,
}

impl SubtitleCue {
    pub fn new(start_time: f64, end_time: f64, style: impl Into<String>, segments: Vec<Segment>) -> Self {
        Self {
            start_time,
            end_time,
            style: style.into(),
            segments,
        }
    }

    /// ASS `Text` field for this cue
    pub fn to_ass_text(&self, highlight: Rgb) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(t) => out.push_str(&escape_ass(t)),
                Segment::Highlight(t) => {
                    let _ = write!(out, "{{\\c{}}}{}{{\\r}}", highlight.to_ass_inline(), escape_ass(t));
                }
                Segment::LineBreak => out.push_str("\\N"),
                Segment::Karaoke { centis, text, highlighted } => {
                    if *highlighted {
                        let _ = write!(
                            out,
                            "{{\\k{}\\c{}}}{}{{\\r}}",
                            centis,
                            highlight.to_ass_inline(),
                            escape_ass(text)
                        );
                    } else {
                        let _ = write!(out, "{{\\k{}}}{}", centis, escape_ass(text));
                    }
                }
            }
        }
        out
    }

    /// SubRip text, highlights as `<font color>` runs
    pub fn to_srt_text(&self, highlight: Rgb) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(t) => out.push_str(t),
                Segment::Highlight(t) => {
                    let _ = write!(out, "<font color=\"{}\">{}</font>", highlight.to_html(), t);
                }
                Segment::LineBreak => out.push('\n'),
                Segment::Karaoke { text, highlighted: true, .. } => {
                    let _ = write!(out, "<font color=\"{}\">{}</font>", highlight.to_html(), text);
                }
                Segment::Karaoke { text, .. } => out.push_str(text),
            }
        }
        out.trim_end().to_string()
    }

    /// WebVTT payload, highlights in bold
    pub fn to_vtt_text(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(t) => out.push_str(&escape_vtt(t)),
                Segment::Highlight(t) | Segment::Karaoke { text: t, highlighted: true, .. } => {
                    let _ = write!(out, "<b>{}</b>", escape_vtt(t));
                }
                Segment::Karaoke { text, .. } => out.push_str(&escape_vtt(text)),
                Segment::LineBreak => out.push('\n'),
            }
        }
        out.trim_end().to_string()
    }
}

// Braces open override blocks in ASS
fn escape_ass(text: &str) -> String {
    text.replace('{', "(").replace('}', ")").replace('\n', " ")
}

fn escape_vtt(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// `H:MM:SS.cc`
pub fn format_ass_timestamp(seconds: f64) -> String {
    let total = (seconds.max(0.0) * 100.0).round() as u64;
    let h = total / 360_000;
    let m = (total % 360_000) / 6_000;
    let s = (total % 6_000) / 100;
    let c = total % 100;
    format!("{}:{:02}:{:02}.{:02}", h, m, s, c)
}

fn split_millis(seconds: f64) -> (u64, u64, u64, u64) {
    let ms = (seconds.max(0.0) * 1000.0).round() as u64;
    (ms / 3_600_000, (ms % 3_600_000) / 60_000, (ms % 60_000) / 1_000, ms % 1_000)
}

/// `HH:MM:SS,mmm`
pub fn format_srt_timestamp(seconds: f64) -> String {
    let (h, m, s, ms) = split_millis(seconds);
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

/// `HH:MM:SS.mmm`
pub fn format_vtt_timestamp(seconds: f64) -> String {
    let (h, m, s, ms) = split_millis(seconds);
    format!("{:02}:{:02}:{:02}.{:03}", h, m, s, ms)
}

/// A complete subtitle document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleDocument {
    pub play_res_x: u32,
    pub play_res_y: u32,
    /// ASS wrap style, 0 = smart wrapping
    pub wrap_style: u8,
    /// Colour used for highlight runs
    pub highlight: Rgb,
    pub styles: Vec<SubtitleStyle>,
    pub cues: Vec<SubtitleCue>,
}

impl SubtitleDocument {
    pub fn new(play_res_x: u32, play_res_y: u32, highlight: Rgb) -> Self {
        Self {
            play_res_x,
            play_res_y,
            wrap_style: 0,
            highlight,
            styles: Vec::new(),
            cues: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn style(&self, name: &str) -> Option<&SubtitleStyle> {
        self.styles.iter().find(|s| s.name == name)
    }

    pub fn to_ass(&self) -> String {
        let mut out = String::new();
        out.push_str("[Script Info]\n");
        out.push_str("ScriptType: v4.00+\n");
        let _ = writeln!(out, "PlayResX: {}", self.play_res_x);
        let _ = writeln!(out, "PlayResY: {}", self.play_res_y);
        let _ = writeln!(out, "WrapStyle: {}", self.wrap_style);
        out.push_str("ScaledBorderAndShadow: yes\n\n");

        out.push_str("[V4+ Styles]\n");
        out.push_str("Format: Name,Fontname,Fontsize,PrimaryColour,SecondaryColour,OutlineColour,BackColour,Bold,Italic,Underline,StrikeOut,ScaleX,ScaleY,Spacing,Angle,BorderStyle,Outline,Shadow,Alignment,MarginL,MarginR,MarginV,Encoding\n");
        for style in &self.styles {
            out.push_str(&style.to_ass_line());
            out.push('\n');
        }

        out.push_str("\n[Events]\n");
        out.push_str("Format: Layer,Start,End,Style,Name,MarginL,MarginR,MarginV,Effect,Text\n");
        for cue in &self.cues {
            let _ = writeln!(
                out,
                "Dialogue: 0,{},{},{},,0,0,0,,{}",
                format_ass_timestamp(cue.start_time),
                format_ass_timestamp(cue.end_time),
                cue.style,
                cue.to_ass_text(self.highlight)
            );
        }
        out
    }

    pub fn to_srt(&self) -> String {
        let mut out = String::new();
        for (i, cue) in self.cues.iter().enumerate() {
            let _ = writeln!(out, "{}", i + 1);
            let _ = writeln!(
                out,
                "{} --> {}",
                format_srt_timestamp(cue.start_time),
                format_srt_timestamp(cue.end_time)
            );
            let _ = writeln!(out, "{}", cue.to_srt_text(self.highlight));
            out.push('\n');
        }
        out
    }

    pub fn to_vtt(&self) -> String {
        let mut out = String::from("WEBVTT\n\n");
        for cue in &self.cues {
            let _ = writeln!(
                out,
                "{} --> {}",
                format_vtt_timestamp(cue.start_time),
                format_vtt_timestamp(cue.end_time)
            );
            let _ = writeln!(out, "{}", cue.to_vtt_text());
            out.push('\n');
        }
        out
    }

    pub fn render(&self, format: SubtitleFormat) -> String {
        match format {
            SubtitleFormat::Ass => self.to_ass(),
            SubtitleFormat::Srt => self.to_srt(),
            SubtitleFormat::Vtt => self.to_vtt(),
        }
    }

    /// Serialize and write to `path`, creating parent directories
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P, format: SubtitleFormat) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, self.render(format))
            .with_context(|| format!("Failed to write subtitle file: {}", path.display()))
    }
}
