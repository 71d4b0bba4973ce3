//! Reply splitting for transports with a per-message size cap
//!
//! Chat transports reject messages over a fixed length (4096 characters for
//! Telegram). Long replies are split preferably at a newline, then at
//! whitespace, and only then at the hard limit. Whitespace at a split point
//! is dropped, so rejoining segments on a newline restores text that was
//! split at line breaks.

use crate::context::char_boundary;

/// Hard cap on characters per transmitted segment
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Split `text` into segments of at most `limit` characters
///
/// When `limit` is 0, [`MAX_MESSAGE_CHARS`] is used. Empty text yields no
/// segments; text that fits is returned as a single segment.
///
/// # Examples
///
/// ```
/// use second_gateway::chunking::split_message;
///
/// let parts = split_message("first line\nsecond line", 12);
/// assert_eq!(parts, vec!["first line", "second line"]);
/// ```
#[must_use]
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = if limit == 0 { MAX_MESSAGE_CHARS } else { limit };

    if text.is_empty() {
        return Vec::new();
    }

    let mut segments = Vec::new();
    let mut remaining = text;

    loop {
        let Some(cut) = char_boundary(remaining, limit) else {
            segments.push(remaining.to_string());
            break;
        };

        let split_at = find_split_point(remaining, cut);
        segments.push(remaining[..split_at].to_string());

        remaining = remaining[split_at..].trim_start();
        if remaining.is_empty() {
            break;
        }
    }

    segments
}

/// Find the byte offset to split at within the first `cut` bytes
///
/// Prefers the last newline, then the last whitespace; falls back to `cut`.
/// A boundary at offset 0 is ignored so every segment is non-empty.
fn find_split_point(text: &str, cut: usize) -> usize {
    let window = &text[..cut];

    if let Some(pos) = window.rfind('\n').filter(|&pos| pos > 0) {
        return pos;
    }

    if let Some(pos) = window.rfind(char::is_whitespace).filter(|&pos| pos > 0) {
        return pos;
    }

    cut
}
