// Fancy-formatting detection.
//
// "Fancy" text swaps plain letters for the styled look-alikes in the
// Mathematical Alphanumeric Symbols block (U+1D400..=U+1D7FF): bold, italic,
// script, Fraktur, double-struck and monospace Latin and Greek, plus styled
// digits. Screen readers either skip these or spell them out one code point
// at a time.
//
// Known gap: the letter-like symbols that predate the block (U+212C SCRIPT
// CAPITAL B, U+2102 DOUBLE-STRUCK CAPITAL C, U+210E PLANCK CONSTANT and
// roughly two dozen others) are not matched, so a word like "𝒸𝓊𝓉ℯ" only
// counts its first three letters.

use std::sync::LazyLock;

use regex_lite::Regex;

/// Shortest run of styled code points that counts as fancy formatting.
/// One or two stray symbols are usually legitimate maths.
pub const MIN_RUN: usize = 3;

// Keep the repetition count in step with MIN_RUN.
static FANCY_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x{1D400}-\x{1D7FF}]{3,}").expect("fancy-run pattern is a valid regex")
});

/// True iff `text` contains at least `MIN_RUN` consecutive code points from
/// the Mathematical Alphanumeric Symbols block.
pub fn is_fancy_formatted(text: &str) -> bool {
    FANCY_RUN.is_match(text)
}

/// Length of the longest run of styled code points in `text`. Used by the
/// `check` command to explain its verdict.
pub fn longest_run(text: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for c in text.chars() {
        if is_math_alphanumeric(c) {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

pub fn is_math_alphanumeric(c: char) -> bool {
    ('\u{1D400}'..='\u{1D7FF}').contains(&c)
}
