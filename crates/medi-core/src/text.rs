//! UTF-8 safe string truncation.
//!
//! Previews and titles are cut by character count, matching what a user sees;
//! byte slicing would panic inside multi-byte characters.

/// Truncate a string to at most `max_bytes` bytes at a char boundary.
#[inline]
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

/// First `max_chars` characters of `s`.
pub fn take_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_within_limit() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 5), "hello");
    }

    #[test]
    fn truncate_snaps_to_char_boundary() {
        assert_eq!(truncate_str("ab—cd", 3), "ab");
        assert_eq!(truncate_str("ab—cd", 5), "ab—");
    }

    #[test]
    fn take_chars_counts_characters() {
        assert_eq!(take_chars("héllo", 2), "hé");
        assert_eq!(take_chars("short", 100), "short");
        assert_eq!(take_chars("", 3), "");
        assert_eq!(take_chars("头痛发烧", 2), "头痛");
    }
}
