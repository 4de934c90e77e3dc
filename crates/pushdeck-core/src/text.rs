//! String helpers shared by logging and presentation.

/// Truncate `s` to at most `max_bytes` bytes on a char boundary.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// The part of a device token that is safe to put in logs.
pub fn token_prefix(token: &str) -> &str {
    truncate_str(token, 8)
}

/// Collapse every run of whitespace (including newlines) into one space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
