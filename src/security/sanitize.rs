//! Input sanitization.
//!
//! # Processing order
//! ```text
//! raw
//!     → strip control characters and null bytes
//!     → truncate to max_length characters
//!     → strip denylisted characters (unless allowed)
//!     → trim surrounding whitespace
//! ```
//!
//! Truncation runs before denylist stripping, so the result can be shorter
//! than `max_length` when stripped characters sat inside the kept prefix.

/// Characters removed when special characters are not allowed.
pub const DENYLIST: &[char] = &['<', '>', '"', '\'', ';', '(', ')', '&', '+'];

fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}')
}

/// Sanitize a string value. Never fails; the worst case is an empty string.
pub fn sanitize(raw: Option<&str>, max_length: usize, allow_special_chars: bool) -> String {
    let raw = match raw {
        Some(s) if !s.is_empty() => s,
        _ => return String::new(),
    };

    let truncated: String = raw
        .chars()
        .filter(|c| !is_stripped_control(*c))
        .take(max_length)
        .collect();

    let cleaned = if allow_special_chars {
        truncated
    } else {
        truncated.chars().filter(|c| !DENYLIST.contains(c)).collect()
    };

    cleaned.trim().to_string()
}

/// Shorthand for sanitizing a present value.
pub fn sanitize_str(raw: &str, max_length: usize, allow_special_chars: bool) -> String {
    sanitize(Some(raw), max_length, allow_special_chars)
}
