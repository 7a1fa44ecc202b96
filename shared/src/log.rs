//! Truncation helpers for payload logging

use std::borrow::Cow;

/// Maximum characters of a whole frame written to the log
pub const FRAME_LOG_LIMIT: usize = 200;

/// Maximum characters of a params preview written to the log
pub const PARAMS_LOG_LIMIT: usize = 100;

/// Cut `text` to at most `max` characters, marking the cut with `...`
pub fn truncate(text: &str, max: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max) {
        Some((cut, _)) => Cow::Owned(format!("{}...", &text[..cut])),
        None => Cow::Borrowed(text),
    }
}
