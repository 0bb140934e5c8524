//! Sentence and token splitting for free-text form fields.
//!
//! This is a heuristic, not a parser: "Dr. Smith" becomes two sentences.

use std::sync::LazyLock;

use regex::Regex;

static TERMINATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+").expect("valid regex"));

/// Split text into trimmed, period-terminated sentences.
///
/// Any run of `.`, `!` or `?` ends a sentence; the terminator is normalized
/// to a single `.`.
pub fn normalize(text: &str) -> Vec<String> {
    fragments(text).map(|s| format!("{s}.")).collect()
}

/// Like [`normalize`], but drops fragments that start with `-` (list markers).
pub fn knowledge_lines(text: &str) -> Vec<String> {
    fragments(text)
        .filter(|s| !s.starts_with('-'))
        .map(|s| format!("{s}."))
        .collect()
}

/// Split on whitespace into lowercase single-word tokens.
pub fn split_adjectives(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// Trim a line and make sure it ends in terminal punctuation.
///
/// Returns `None` for blank lines.
pub fn terminate_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        None
    } else if line.ends_with(['.', '!', '?']) {
        Some(line.to_string())
    } else {
        Some(format!("{line}."))
    }
}

/// Trim a line and force it to end in exactly one `.`.
///
/// Any trailing run of `.`, `!` or `?` is replaced. Returns `None` when
/// nothing but punctuation and whitespace is left.
pub fn period_line(line: &str) -> Option<String> {
    let body = line.trim().trim_end_matches(['.', '!', '?']).trim_end();
    (!body.is_empty()).then(|| format!("{body}."))
}

fn fragments(text: &str) -> impl Iterator<Item = &str> {
    TERMINATOR_RE
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
