/*!
 * Subtitle synthesis.
 *
 * - `markup`: `<h>` highlight and `<br>` break parsing into segment runs
 * - `document`: style and cue model with ASS, SRT and VTT serializers
 * - `synthesizer`: plain, karaoke, fallback and headline document builders
 */

pub use self::document::{Rgb, SubtitleCue, SubtitleDocument, SubtitleStyle};
pub use self::markup::{parse_headline, parse_markup, plain_text, Segment};
pub use self::synthesizer::{karaoke_cues, SubtitleSynthesizer, CAPTION_STYLE, HEADLINE_STYLE};

pub mod document;
pub mod markup;
pub mod synthesizer;
