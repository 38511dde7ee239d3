//! String normalization: folds free-text names to a canonical, romanized,
//! lowercase ASCII fingerprint suitable for trigram matching.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Encoded strings never exceed this many bytes.
pub const MAX_ENCODED_LEN: usize = 30;

/// Anything that isn't a (Unicode) word character or a space. Mirrors the
/// original `re.sub(r'[^\w ]+', '', text)` strip, including its Unicode-aware
/// `\w` so non-Latin scripts survive to transliteration.
static NON_WORD_OR_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w ]+").unwrap());

/// Runs of space or underscore, collapsed to a single space.
static SEPARATOR_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ _]+").unwrap());

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to ASCII: strip diacritics via NFKD, then transliterate
/// whatever non-ASCII remains (Cyrillic, Hebrew, CJK, ...).
fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    any_ascii(&stripped)
}

fn encode_core(text: &str, strip_punctuation: bool) -> Option<String> {
    if text.is_empty() {
        return None;
    }

    let filtered = if strip_punctuation {
        NON_WORD_OR_SPACE.replace_all(text, "")
    } else {
        std::borrow::Cow::Borrowed(text)
    };

    let collapsed = SEPARATOR_RUN.replace_all(&filtered, " ");
    let collapsed = collapsed.trim();
    if collapsed.is_empty() {
        return None;
    }

    let transliterated = fold_to_ascii(collapsed);
    let no_space: String = transliterated.chars().filter(|c| !c.is_whitespace()).collect();
    let lowered = no_space.to_lowercase();

    let truncated = truncate_bytes(&lowered, MAX_ENCODED_LEN);
    if truncated.is_empty() {
        None
    } else {
        Some(truncated)
    }
}

fn truncate_bytes(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Canonical encoding: strips punctuation before transliterating.
///
/// Returns `None` for empty input or input that encodes to nothing usable
/// (e.g. a string made entirely of punctuation).
pub fn encode(text: &str) -> Option<String> {
    encode_core(text, true)
}

/// Loose encoding: retains punctuation through transliteration. Used for
/// artist names that would otherwise encode to empty, e.g. `"!!!"`.
pub fn encode_loose(text: &str) -> Option<String> {
    encode_core(text, false)
}
