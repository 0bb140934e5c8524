//! Textual repair pipeline for near-JSON model output.
//!
//! Each repair pass is a function `&str -> String` applied in sequence.
//! Passes are order-sensitive: trailing commas go first so that a dangling
//! `"key": ,}` reduces to `"key": }` before the empty-value pass sees it.

use std::sync::LazyLock;

use regex::Regex;

/// Run the full repair pipeline on a candidate JSON slice.
pub(crate) fn run_pipeline(candidate: &str) -> String {
    let mut result = candidate.to_string();

    result = remove_trailing_commas(&result);
    result = collapse_empty_containers(&result);
    result = replace_undefined(&result);
    result = fill_empty_values(&result);
    result = collapse_whitespace(&result);

    result.trim().to_string()
}

// ---------------------------------------------------------------------------
// Pass 1: Trailing commas
// ---------------------------------------------------------------------------

/// Drop a comma that sits directly before `}` or `]` (whitespace allowed).
fn remove_trailing_commas(json: &str) -> String {
    static TRAILING_COMMA_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("valid regex"));

    TRAILING_COMMA_RE.replace_all(json, "$1").to_string()
}

// ---------------------------------------------------------------------------
// Pass 2: Empty containers
// ---------------------------------------------------------------------------

/// Collapse `{ }` to `{}` and `[ ]` to `[]`.
fn collapse_empty_containers(json: &str) -> String {
    static EMPTY_OBJECT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\{\s+\}").expect("valid regex"));
    static EMPTY_ARRAY_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\[\s+\]").expect("valid regex"));

    let json = EMPTY_OBJECT_RE.replace_all(json, "{}");
    EMPTY_ARRAY_RE.replace_all(&json, "[]").to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: `undefined` values
// ---------------------------------------------------------------------------

/// Replace a bare `undefined` in value position (after `:`, `[` or `,`) with `null`.
fn replace_undefined(json: &str) -> String {
    static UNDEFINED_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"([:\[,])\s*undefined\b").expect("valid regex"));

    UNDEFINED_RE.replace_all(json, "${1} null").to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Missing values
// ---------------------------------------------------------------------------

/// Turn `"key": ,` and `"key": }` into explicit nulls.
fn fill_empty_values(json: &str) -> String {
    static EMPTY_VALUE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r":\s*([,}])").expect("valid regex"));

    EMPTY_VALUE_RE.replace_all(json, ": null$1").to_string()
}

// ---------------------------------------------------------------------------
// Pass 5: Whitespace
// ---------------------------------------------------------------------------

/// Collapse newlines and whitespace runs to single spaces.
fn collapse_whitespace(json: &str) -> String {
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    WS_RE.replace_all(json, " ").to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_trailing_commas_in_objects_and_arrays() {
        assert_eq!(remove_trailing_commas(r#"{"a":1,}"#), r#"{"a":1}"#);
        assert_eq!(remove_trailing_commas("[1, 2,\n  ]"), "[1, 2]");
    }

    #[test]
    fn remove_trailing_commas_keeps_separators() {
        let input = r#"{"a":[1,2],"b":3}"#;
        assert_eq!(remove_trailing_commas(input), input);
    }

    #[test]
    fn collapse_empty_containers_both_kinds() {
        assert_eq!(collapse_empty_containers("{ }"), "{}");
        assert_eq!(collapse_empty_containers("[\n\t]"), "[]");
        assert_eq!(collapse_empty_containers(r#"{"a": [ ]}"#), r#"{"a": []}"#);
    }

    #[test]
    fn replace_undefined_in_value_positions() {
        assert_eq!(replace_undefined(r#"{"a": undefined}"#), r#"{"a": null}"#);
        assert_eq!(replace_undefined("[undefined, undefined]"), "[ null, null]");
    }

    #[test]
    fn replace_undefined_leaves_strings_alone() {
        let input = r#"{"note": "value is undefined"}"#;
        assert_eq!(replace_undefined(input), input);
    }

    #[test]
    fn fill_empty_values_before_comma_and_close() {
        assert_eq!(fill_empty_values(r#"{"a": ,"b": 1}"#), r#"{"a": null,"b": 1}"#);
        assert_eq!(fill_empty_values(r#"{"a": }"#), r#"{"a": null}"#);
    }

    #[test]
    fn collapse_whitespace_flattens_lines() {
        assert_eq!(collapse_whitespace("{\n  \"a\":\t1\n}"), "{ \"a\": 1 }");
    }

    #[test]
    fn full_pipeline_repairs_dangling_key() {
        // The trailing comma goes first, leaving `"people": }` for the empty-value pass.
        let input = "{\n  \"bio\": [\"x.\",],\n  \"people\": ,\n}";
        assert_eq!(run_pipeline(input), r#"{ "bio": ["x."], "people": null}"#);
    }

    #[test]
    fn full_pipeline_is_idempotent() {
        let input = "{ \"a\": [ ], \"b\": undefined, \"c\": {\"d\": 1,}, }";
        let once = run_pipeline(input);
        assert_eq!(run_pipeline(&once), once);
    }
}
