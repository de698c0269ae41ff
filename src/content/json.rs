use serde::de::DeserializeOwned;
use tracing::warn;

const FENCE_OPEN_JSON: &str = "```json\n";
const FENCE_OPEN: &str = "```\n";
const FENCE_CLOSE: &str = "\n```";

/// Body of the first fenced block opened by `open`, if it is non-empty
fn fenced_body<'a>(text: &'a str, open: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let len = text[start..].find(FENCE_CLOSE)?;
    let body = &text[start..start + len];
    (!body.is_empty()).then_some(body)
}

/// Parse model output as JSON, unwrapping a ```json (or bare ```) fence if
/// the model added one. Returns `None` on malformed output.
pub fn parse_model_json<T: DeserializeOwned>(text: &str) -> Option<T> {
    let body = fenced_body(text, FENCE_OPEN_JSON)
        .or_else(|| fenced_body(text, FENCE_OPEN))
        .unwrap_or(text);

    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Failed to parse model JSON: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_plain_json() {
        let value: Option<Value> = parse_model_json(r#"{"a":1}"#);
        assert_eq!(value, Some(json!({"a": 1})));
    }

    #[test]
    fn test_json_fence() {
        let text = "Here you go:\n```json\n{\"a\":1}\n```\nEnjoy!";
        let value: Option<Value> = parse_model_json(text);
        assert_eq!(value, Some(json!({"a": 1})));
    }

    #[test]
    fn test_bare_fence() {
        let text = "```\n[1, 2]\n```";
        let value: Option<Value> = parse_model_json(text);
        assert_eq!(value, Some(json!([1, 2])));
    }

    #[test]
    fn test_first_fence_wins() {
        let text = "```json\n{\"a\":1}\n```\n```json\n{\"a\":2}\n```";
        let value: Option<Value> = parse_model_json(text);
        assert_eq!(value, Some(json!({"a": 1})));
    }

    #[test]
    fn test_malformed_returns_none() {
        assert!(parse_model_json::<Value>("not json at all").is_none());
        assert!(parse_model_json::<Value>("```json\n{broken\n```").is_none());
    }

    #[test]
    fn test_unclosed_fence_parses_whole_text() {
        assert!(parse_model_json::<Value>("```json\n{\"a\":1}").is_none());
    }
}
