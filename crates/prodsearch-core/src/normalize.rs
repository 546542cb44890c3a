//! Query text canonicalization.
//!
//! Characters other than word characters, whitespace and apostrophes are
//! dropped, whitespace runs collapse to one space, and the result is
//! lower-cased. Normalizing twice yields the same string.

use regex::Regex;
use std::sync::LazyLock;

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s']").expect("static pattern compiles"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static pattern compiles"));

/// Canonicalize raw user input. Empty or whitespace-only input yields `""`,
/// which callers treat as "no results".
pub fn normalize_query(raw: &str) -> String {
    let stripped = DISALLOWED.replace_all(raw, "");
    WHITESPACE
        .replace_all(stripped.trim(), " ")
        .to_lowercase()
}

/// Number of whitespace-separated terms in an already normalized query.
pub fn term_count(normalized: &str) -> usize {
    normalized.split_whitespace().count()
}
