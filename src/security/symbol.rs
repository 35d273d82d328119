//! Ticker symbol validation.

/// Longest accepted ticker.
pub const MAX_SYMBOL_LEN: usize = 10;

/// A symbol is 1 to 10 ASCII letters or digits. Exchange suffixes, dots and
/// hyphens are rejected.
pub fn is_valid_symbol(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol.len() <= MAX_SYMBOL_LEN
        && symbol.bytes().all(|b| b.is_ascii_alphanumeric())
}
