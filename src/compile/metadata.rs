//! Compute derived content metadata.

/// Default reading speed, in words per minute.
pub const DEFAULT_WORDS_PER_MINUTE: u32 = 200;

/// Count whitespace-delimited tokens in a raw markdown body.
///
/// Markdown syntax characters count as part of tokens (e.g. `#` in a heading
/// is a token on its own).
pub fn word_count(body: &str) -> usize {
    body.split_whitespace().count()
}

/// Estimate the reading time in minutes, rounded up.
///
/// Empty content reads in zero minutes.
pub fn reading_time(word_count: usize, words_per_minute: u32) -> usize {
    let words_per_minute = words_per_minute.max(1) as usize;
    word_count.div_ceil(words_per_minute)
}
