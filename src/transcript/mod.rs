/*!
 * Transcript handling: engine response model and word extraction.
 *
 * - `model`: strict union of the response shapes the engine produces
 * - `extract`: flattening of segments into one ordered word sequence
 */

pub use self::extract::{extract_words, is_placeholder_token, TimedWord};
pub use self::model::{EngineSegment, EngineWord, TranscriptionResponse, VerboseTranscript};

pub mod extract;
pub mod model;
