//! Extraction of the JSON payload from raw model output.

use crate::errors::SchemaMismatchError;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static CODE_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*(.*?)\s*```").ok());

/// Parses the JSON object contained in `raw`.
///
/// Accepts bare JSON, JSON wrapped in a markdown code fence, and JSON
/// surrounded by prose (the outermost `{...}` span is used).
pub fn parse_json_payload(raw: &str) -> Result<Value, SchemaMismatchError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SchemaMismatchError::new("model output is empty"));
    }

    let candidate = CODE_FENCE
        .as_ref()
        .and_then(|re| re.captures(trimmed))
        .and_then(|caps| caps.get(1))
        .map_or(trimmed, |m| m.as_str());

    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return ensure_object(value, raw);
    }

    match (candidate.find('{'), candidate.rfind('}')) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<Value>(&candidate[start..=end])
                .map_err(|e| {
                    SchemaMismatchError::new(format!("model output is not valid JSON: {e}"))
                        .with_raw(raw)
                })
                .and_then(|value| ensure_object(value, raw))
        }
        _ => Err(SchemaMismatchError::new("model output contains no JSON object").with_raw(raw)),
    }
}

fn ensure_object(value: Value, raw: &str) -> Result<Value, SchemaMismatchError> {
    if value.is_object() {
        Ok(value)
    } else {
        Err(SchemaMismatchError::at("$", "expected a JSON object at the top level").with_raw(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_json() {
        let value = parse_json_payload(r#"{"a": 1}"#).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_fenced_json() {
        let raw = "```json\n{\"mainTopic\": \"AI\"}\n```";
        assert_eq!(parse_json_payload(raw).unwrap(), json!({"mainTopic": "AI"}));

        let raw = "```\n{\"x\": true}\n```";
        assert_eq!(parse_json_payload(raw).unwrap(), json!({"x": true}));
    }

    #[test]
    fn test_json_inside_prose() {
        let raw = "Here is your plan:\n{\"tips\": \"post often\"}\nGood luck!";
        assert_eq!(parse_json_payload(raw).unwrap(), json!({"tips": "post often"}));
    }

    #[test]
    fn test_empty_output() {
        let err = parse_json_payload("   ").unwrap_err();
        assert_eq!(err.message, "model output is empty");
    }

    #[test]
    fn test_not_json() {
        let err = parse_json_payload("I cannot help with that.").unwrap_err();
        assert_eq!(err.message, "model output contains no JSON object");
        assert_eq!(err.raw.as_deref(), Some("I cannot help with that."));

        let err = parse_json_payload("{not json}").unwrap_err();
        assert!(err.message.starts_with("model output is not valid JSON"));
    }

    #[test]
    fn test_top_level_array_rejected() {
        let err = parse_json_payload("[1, 2, 3]").unwrap_err();
        assert_eq!(err.path.as_deref(), Some("$"));
    }
}
