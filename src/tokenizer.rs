//! Character n-gram tokenization.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ChainError, Result};

static SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,\-./]|\sBD").expect("separator pattern is valid"));

/// Remove the separator characters and the ` BD` marker.
#[must_use]
pub fn clean(text: &str) -> Cow<'_, str> {
    SEPARATORS.replace_all(text, "")
}

/// Split `text` into single characters, borrowing from the input.
fn char_tokens(text: &str) -> Vec<&str> {
    let mut tokens = Vec::with_capacity(text.len());
    let mut iter = text.char_indices().peekable();
    while let Some((start, _)) = iter.next() {
        let end = iter.peek().map_or(text.len(), |&(i, _)| i);
        tokens.push(&text[start..end]);
    }
    tokens
}

/// All contiguous `n`-character substrings of the cleaned `text`, in order.
///
/// Returns an empty vector when the cleaned text is shorter than `n`.
///
/// # Errors
/// [`ChainError::InvalidParameter`] when `n` is zero.
pub fn ngrams(text: &str, n: usize) -> Result<Vec<String>> {
    if n == 0 {
        return Err(ChainError::invalid("n", "n-gram size must be at least 1"));
    }
    let cleaned = clean(text);
    let chars = char_tokens(&cleaned);
    Ok(chars.windows(n).map(|window| window.concat()).collect())
}
