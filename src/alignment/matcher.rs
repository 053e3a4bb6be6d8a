/*!
 * Token normalization and the fuzzy word-matching heuristic.
 *
 * A transcript word matches a caption token when they are equal, when one
 * contains the other, or when the same holds after both are reduced to
 * ASCII alphanumerics and Hangul. Short or repeated syllables can produce
 * false positives; that behaviour is kept as is.
 */

use once_cell::sync::Lazy;
use regex::Regex;

// Inline caption markup, removed before tokenizing
static MARKUP_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</?h>|<br\s*/?>|</br>").unwrap());

// Everything that is not ASCII alphanumeric or Hangul (jamo, compatibility jamo, syllables)
static NON_CORE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^a-z0-9\x{1100}-\x{11FF}\x{3130}-\x{318F}\x{AC00}-\x{D7A3}]").unwrap()
});

const STRIPPED_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':'];

/// Lowercase, drop `.,!?;:` and trim
pub fn normalize_token(token: &str) -> String {
    token
        .to_lowercase()
        .chars()
        .filter(|c| !STRIPPED_PUNCTUATION.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Reduce an already normalized token to alphanumerics and Hangul
pub fn core_token(token: &str) -> String {
    NON_CORE_REGEX.replace_all(token, "").into_owned()
}

/// Split caption text into normalized tokens, ignoring inline markup
pub fn caption_tokens(caption: &str) -> Vec<String> {
    MARKUP_REGEX
        .replace_all(caption, " ")
        .split_whitespace()
        .map(normalize_token)
        .filter(|t| !t.is_empty())
        .collect()
}

fn equal_or_contained(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a == b || a.contains(b) || b.contains(a))
}

/// Whether a transcript word matches a normalized caption token
pub fn words_match(word: &str, token: &str) -> bool {
    let word = normalize_token(word);
    if equal_or_contained(&word, token) {
        return true;
    }

    equal_or_contained(&core_token(&word), &core_token(token))
}
