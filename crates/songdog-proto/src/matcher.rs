//! Guess normalisation.
//!
//! `normalize` lowercases, drops everything that is not an ASCII word
//! character (`[A-Za-z0-9_]`) or whitespace, then trims.  Non-ASCII letters
//! are dropped too, so "Beyoncé" and "Beyonc" compare equal.

use crate::protocol::Track;

pub fn normalize(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Correctness test.  Validity (exact membership in the option list) is a
/// separate, stricter gate owned by the catalog.
pub fn is_correct(guess: &str, track: &Track) -> bool {
    normalize(guess) == normalize(&track.option())
}
