//! Sentence-aware truncation
//!
//! Bounds text to a character count while avoiding cuts in the middle of a
//! sentence or word. A sentence end is preferred, then a word boundary, and
//! only then a hard cut. Boundaries in the first half of the window are
//! ignored so the result is never near-empty.

/// Marker appended when text is cut anywhere other than a sentence end
pub const ELLIPSIS: &str = "...";

/// Punctuation followed by whitespace that ends a sentence
const SENTENCE_TERMINATORS: [&str; 6] = [". ", ".\n", "! ", "!\n", "? ", "?\n"];

/// Truncate `text` to at most `max_chars` characters at a clause boundary
///
/// Text that already fits is returned unchanged. A sentence-end cut keeps the
/// punctuation and never exceeds `max_chars`; word-boundary and hard cuts
/// append [`ELLIPSIS`], which may add up to its own length on top.
///
/// # Examples
///
/// ```
/// use second_gateway::context::truncate_at_sentence;
///
/// let text = "The first sentence is here. The second one runs on and on.";
/// assert_eq!(truncate_at_sentence(text, 40), "The first sentence is here.");
/// ```
#[must_use]
pub fn truncate_at_sentence(text: &str, max_chars: usize) -> String {
    let Some(cut) = char_boundary(text, max_chars) else {
        return text.to_string();
    };

    let prefix = &text[..cut];
    let midpoint = max_chars / 2;

    // Rightmost terminator of any kind
    let sentence_end = SENTENCE_TERMINATORS
        .iter()
        .filter_map(|t| prefix.rfind(t))
        .max();
    if let Some(pos) = sentence_end.filter(|&pos| char_position(prefix, pos) > midpoint) {
        // Terminators are ASCII, so the punctuation is one byte
        return prefix[..=pos].to_string();
    }

    if let Some(pos) = prefix
        .rfind(' ')
        .filter(|&pos| char_position(prefix, pos) > midpoint)
    {
        return format!("{}{ELLIPSIS}", &prefix[..pos]);
    }

    format!("{prefix}{ELLIPSIS}")
}

/// Byte offset just past the first `max_chars` characters
///
/// Returns `None` when the text has no more than `max_chars` characters.
pub(crate) fn char_boundary(text: &str, max_chars: usize) -> Option<usize> {
    text.char_indices().nth(max_chars).map(|(offset, _)| offset)
}

/// Character index of a byte offset
fn char_position(text: &str, byte_offset: usize) -> usize {
    text[..byte_offset].chars().count()
}
