//! Text helpers for building prompts and fallback digests

use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;

lazy_static! {
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").unwrap();
}

pub struct TextUtils;

impl TextUtils {
    /// Cap `text` at `max_chars` characters. Over-long text is cut to
    /// `max_chars - 1` characters, right-trimmed, and ends with `…`.
    pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> Cow<'_, str> {
        if text.chars().count() <= max_chars {
            return Cow::Borrowed(text);
        }
        if max_chars == 0 {
            return Cow::Borrowed("");
        }

        let cut = match text.char_indices().nth(max_chars - 1) {
            Some((byte_idx, _)) => &text[..byte_idx],
            None => text,
        };
        let mut result = String::with_capacity(cut.len() + '…'.len_utf8());
        result.push_str(cut.trim_end());
        result.push('…');
        Cow::Owned(result)
    }

    /// Collapse runs of whitespace into single spaces.
    pub fn normalize_whitespace(text: &str) -> Cow<'_, str> {
        if WHITESPACE_REGEX.is_match(text) {
            Cow::Owned(WHITESPACE_REGEX.replace_all(text, " ").trim().to_string())
        } else {
            Cow::Borrowed(text)
        }
    }
}
