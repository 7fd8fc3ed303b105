use crate::config::settings::MIB;

/// Longest error text surfaced to the requester.
pub const USER_TEXT_LIMIT: usize = 1000;

/// Cuts `text` to at most `max_chars` characters, never splitting a code point.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Whole mebibytes, rounded down.
pub fn mib(bytes: u64) -> u64 {
    bytes / MIB
}
