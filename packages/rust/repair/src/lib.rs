//! Best-effort JSON recovery from free-text model responses.
//!
//! Model output often wraps the JSON object in commentary or carries small
//! syntax slips (trailing commas, `undefined`, missing values). [`extract`]
//! locates the outermost brace span and runs a fixed set of textual repair
//! passes before parsing. Unbalanced braces are not repaired.
//!
//! The crate also hosts the sentence splitting helpers in [`sentences`],
//! shared by the document builder and the knowledge extractor.

mod cleanup;
pub mod sentences;

use serde_json::{Map, Value};
use tracing::{debug, instrument};

use chargen_shared::{ChargenError, Result};

/// Recover a JSON object from raw model text.
///
/// 1. Strict parse of the whole input (fast path)
/// 2. Slice from the first `{` to the last `}`
/// 3. Run the repair pipeline
/// 4. Strict parse of the repaired slice
#[instrument(skip_all, fields(len = raw.len()))]
pub fn extract(raw: &str) -> Result<Map<String, Value>> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) {
        debug!("response parsed without repair");
        return Ok(map);
    }

    let candidate = brace_span(raw)
        .ok_or_else(|| ChargenError::malformed("no JSON object found"))?;
    debug!(candidate, "extracted JSON candidate");

    let repaired = cleanup::run_pipeline(candidate);
    debug!(repaired = %repaired, "repaired JSON candidate");

    match serde_json::from_str::<Value>(&repaired) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ChargenError::malformed(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(ChargenError::malformed(format!(
            "failed to parse JSON content: {e}"
        ))),
    }
}

/// The slice from the first `{` through the last `}`, inclusive.
fn brace_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_value(map: Map<String, Value>) -> Value {
        Value::Object(map)
    }

    #[test]
    fn fast_path_for_clean_json() {
        let map = extract(r#"{"a":1}"#).expect("extract");
        assert_eq!(as_value(map), json!({"a": 1}));
    }

    #[test]
    fn repair_path_strips_commentary_and_trailing_comma() {
        let map = extract(r#"Sure! {"a":1,}"#).expect("extract");
        assert_eq!(as_value(map), json!({"a": 1}));
    }

    #[test]
    fn no_braces_is_malformed() {
        let err = extract("no json here").unwrap_err();
        assert!(matches!(err, ChargenError::MalformedResponse(_)));
        assert!(err.to_string().contains("no JSON object found"));
    }

    #[test]
    fn closing_before_opening_is_malformed() {
        let err = extract("} nothing here {").unwrap_err();
        assert!(err.to_string().contains("no JSON object found"));
    }

    #[test]
    fn unbalanced_braces_are_not_fixed() {
        let err = extract(r#"Here: {"a": {"b": 1}"#).unwrap_err();
        assert!(matches!(err, ChargenError::MalformedResponse(_)));
        assert!(err.to_string().contains("failed to parse JSON content"));
    }

    #[test]
    fn top_level_array_is_rejected() {
        let err = extract("[1, 2, 3]").unwrap_err();
        assert!(err.to_string().contains("no JSON object found"));
    }

    #[test]
    fn undefined_and_missing_values_become_null() {
        let map = extract("```json\n{\"a\": undefined, \"b\": , \"c\": [ ]}\n```").expect("extract");
        assert_eq!(as_value(map), json!({"a": null, "b": null, "c": []}));
    }

    #[test]
    fn extraction_is_idempotent() {
        let first = extract("Result:\n{\"bio\": [\"x.\",], \"style\": {\"all\": [ ]},}").expect("extract");
        let reserialized = serde_json::to_string(&first).expect("serialize");
        let second = extract(&reserialized).expect("extract again");
        assert_eq!(first, second);
    }

    #[test]
    fn chatty_fixture_recovers_all_fields() {
        let raw = std::fs::read_to_string("../../../fixtures/responses/chatty-trailing-commas.txt")
            .expect("read fixture");
        let map = extract(&raw).expect("extract fixture");
        assert_eq!(map["bio"], json!(["Mira commands the airship Kestrel."]));
        assert_eq!(map["lore"], json!([]));
        assert_eq!(map["adjectives"], json!(["bold", "wry"]));
        assert_eq!(map["people"], Value::Null);
        assert_eq!(map["messageExamples"][0][1]["content"]["text"], Value::Null);
    }
}
