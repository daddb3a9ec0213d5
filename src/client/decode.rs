//! Result content decoding

use serde_json::Value;

use crate::protocol::Content;

/// Decode a response's content items into a caller-visible value
///
/// Text items are parsed as JSON first; on parse failure the raw text is
/// returned as a string. Note the arity asymmetry: exactly one item
/// decodes to the value itself, several items decode to an array of
/// values, and no items decode to null. Callers that always expect an
/// array must check the item count themselves.
///
/// Because raw text is the fallback, a tool that returns the literal
/// string "123" decodes as the number 123; servers framing strings as raw
/// text accept this ambiguity.
pub fn decode_content(content: &[Content]) -> Value {
    let mut values: Vec<Value> = content.iter().map(decode_item).collect();
    match values.len() {
        0 => Value::Null,
        1 => values.remove(0),
        _ => Value::Array(values),
    }
}

fn decode_item(item: &Content) -> Value {
    match item {
        Content::Text { text } => {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
        }
        Content::Image { data, .. } => Value::String(data.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_roundtrip() {
        let content = vec![Content::text("8")];
        assert_eq!(decode_content(&content), json!(8));
    }

    #[test]
    fn test_structured_roundtrip() {
        let content = vec![Content::text(r#"{"message":"Hello, World!"}"#)];
        assert_eq!(decode_content(&content), json!({"message": "Hello, World!"}));
    }

    #[test]
    fn test_raw_text_fallback() {
        let content = vec![Content::text("not json at all")];
        assert_eq!(decode_content(&content), json!("not json at all"));
    }

    #[test]
    fn test_single_item_unwrapped_but_two_become_array() {
        let one = vec![Content::text("1")];
        assert_eq!(decode_content(&one), json!(1));

        let two = vec![Content::text("1"), Content::text("2")];
        assert_eq!(decode_content(&two), json!([1, 2]));
    }

    #[test]
    fn test_empty_content_is_null() {
        assert_eq!(decode_content(&[]), Value::Null);
    }

    #[test]
    fn test_json_representable_values_reproduce_exactly() {
        for value in [
            json!(42),
            json!(-1.5),
            json!("plain"),
            json!({"nested": {"list": [1, 2, 3]}}),
            json!(true),
            json!(null),
        ] {
            let text = match &value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let decoded = decode_content(&[Content::text(text)]);
            // "plain" is not valid JSON, so it comes back as the raw string
            assert_eq!(decoded, value);
        }
    }
}
