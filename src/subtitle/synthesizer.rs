use anyhow::Result;
use log::debug;

use crate::alignment::SectionTiming;
use crate::app_config::{CaptionConfig, CaptionMode, HeadlinePosition};

use super::document::{Rgb, SubtitleCue, SubtitleDocument, SubtitleStyle};
use super::markup::{markup_words, parse_headline, parse_markup, Segment};

pub const CAPTION_STYLE: &str = "Default";
pub const HEADLINE_STYLE: &str = "Headline";

/// Builds caption and headline documents from section timings
#[derive(Debug, Clone)]
pub struct SubtitleSynthesizer {
    config: CaptionConfig,
    width: u32,
    height: u32,
    text: Rgb,
    highlight: Rgb,
    outline: Rgb,
}

impl SubtitleSynthesizer {
    pub fn new(config: &CaptionConfig, width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            text: Rgb::from_hex(&config.text_colour)?,
            highlight: Rgb::from_hex(&config.highlight_colour)?,
            outline: Rgb::from_hex(&config.outline_colour)?,
            config: config.clone(),
            width,
            height,
        })
    }

    // Lower third, where plain captions sit
    fn caption_margin_v(&self) -> u32 {
        self.height / 4
    }

    fn plain_style(&self) -> SubtitleStyle {
        SubtitleStyle {
            name: CAPTION_STYLE.to_string(),
            font_name: self.config.font_name.clone(),
            font_size: self.config.font_size,
            primary_colour: self.text.to_ass_style(0),
            secondary_colour: self.highlight.to_ass_style(0),
            outline_colour: self.outline.to_ass_style(0),
            back_colour: Rgb(0, 0, 0).to_ass_style(self.config.box_opacity),
            bold: false,
            italic: false,
            border_style: 3,
            outline: self.config.outline_width,
            shadow: 0,
            alignment: 2,
            margin_l: 60,
            margin_r: 60,
            margin_v: self.caption_margin_v(),
        }
    }

    // Sung syllables take the primary colour, pending ones the secondary
    fn karaoke_style(&self) -> SubtitleStyle {
        SubtitleStyle {
            primary_colour: self.highlight.to_ass_style(0),
            secondary_colour: self.text.to_ass_style(0),
            back_colour: Rgb(0, 0, 0).to_ass_style(self.config.box_opacity),
            border_style: 1,
            bold: true,
            ..self.plain_style()
        }
    }

    fn headline_style(&self) -> SubtitleStyle {
        SubtitleStyle {
            name: HEADLINE_STYLE.to_string(),
            font_size: self.config.headline_font_size,
            bold: true,
            border_style: 1,
            shadow: 2,
            back_colour: Rgb(0, 0, 0).to_ass_style(self.config.box_opacity),
            alignment: match self.config.headline_position {
                HeadlinePosition::Top => 8,
                HeadlinePosition::Bottom => 2,
            },
            margin_v: self.config.headline_margin_v,
            ..self.plain_style()
        }
    }

    fn empty_document(&self) -> SubtitleDocument {
        SubtitleDocument::new(self.width, self.height, self.highlight)
    }

    /// Caption document in the configured mode; `None` mode yields no cues
    pub fn captions<S: AsRef<str>>(&self, captions: &[S], timings: &[SectionTiming]) -> SubtitleDocument {
        match self.config.mode {
            CaptionMode::Plain => self.plain(captions, timings),
            CaptionMode::Karaoke => self.karaoke(captions, timings),
            CaptionMode::None => self.empty_document(),
        }
    }

    /// One boxed cue per section, text as written
    pub fn plain<S: AsRef<str>>(&self, captions: &[S], timings: &[SectionTiming]) -> SubtitleDocument {
        let mut doc = self.empty_document();
        doc.styles.push(self.plain_style());

        for (caption, timing) in captions.iter().zip(timings) {
            let segments = parse_markup(caption.as_ref());
            if segments.is_empty() {
                continue;
            }
            doc.cues.push(SubtitleCue::new(timing.start, timing.end, CAPTION_STYLE, segments));
        }

        doc
    }

    /// Word-by-word highlight, one cue per chunk of words
    pub fn karaoke<S: AsRef<str>>(&self, captions: &[S], timings: &[SectionTiming]) -> SubtitleDocument {
        let mut doc = self.empty_document();
        doc.styles.push(self.karaoke_style());

        for (caption, timing) in captions.iter().zip(timings) {
            let cues = karaoke_cues(
                &markup_words(caption.as_ref()),
                timing.start,
                timing.end,
                self.config.karaoke_chunk_size,
            );
            doc.cues.extend(cues);
        }

        debug!("Built {} karaoke cues", doc.cues.len());
        doc
    }

    /// Single cue over `[0, total]` with every caption joined, used without a transcript
    pub fn fallback<S: AsRef<str>>(&self, captions: &[S], total: f64) -> SubtitleDocument {
        let joined = captions
            .iter()
            .map(|c| c.as_ref().trim())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let span = [SectionTiming::new(0.0, total)];

        match self.config.mode {
            CaptionMode::Karaoke => self.karaoke(&[joined], &span),
            CaptionMode::Plain => self.plain(&[joined], &span),
            CaptionMode::None => self.empty_document(),
        }
    }

    /// Headline overlay spanning the whole video
    pub fn headline(&self, text: &str, total: f64) -> SubtitleDocument {
        let mut doc = self.empty_document();
        doc.styles.push(self.headline_style());

        let segments = parse_headline(text);
        if !segments.is_empty() {
            doc.cues.push(SubtitleCue::new(0.0, total, HEADLINE_STYLE, segments));
        }

        doc
    }
}

/// Spread words evenly over `[start, end]` and group them into cues.
///
/// Word boundaries are quantized to centiseconds cumulatively, so the `\k`
/// values of a chunk always add up to the chunk's own length.
pub fn karaoke_cues(words: &[(String, bool)], start: f64, end: f64, chunk_size: usize) -> Vec<SubtitleCue> {
    if words.is_empty() || end <= start {
        return Vec::new();
    }

    let per_word = (end - start) / words.len() as f64;
    let boundary = |i: usize| -> f64 {
        if i == words.len() {
            end
        } else {
            start + per_word * i as f64
        }
    };
    let centis = |t: f64| -> i64 { (t * 100.0).round() as i64 };

    let mut cues = Vec::new();
    for chunk_start in (0..words.len()).step_by(chunk_size.max(1)) {
        let chunk_end = (chunk_start + chunk_size.max(1)).min(words.len());
        let last_index = chunk_end - 1;

        let segments = (chunk_start..chunk_end)
            .map(|i| {
                let (word, highlighted) = &words[i];
                let text = if i == last_index { word.clone() } else { format!("{} ", word) };
                Segment::Karaoke {
                    centis: (centis(boundary(i + 1)) - centis(boundary(i))).max(0) as u32,
                    text,
                    highlighted: *highlighted,
                }
            })
            .collect();

        cues.push(SubtitleCue::new(boundary(chunk_start), boundary(chunk_end), CAPTION_STYLE, segments));
    }

    cues
}
