//! Pulling one JSON object out of a free-form model reply.

use serde_json::{Map, Value};

/// Locate the JSON payload in `reply`.
///
/// A ```` ```json ```` fence wins, then any bare fence, then the whole reply.
/// An unterminated fence runs to the end of the text.
pub fn json_payload(reply: &str) -> &str {
    let fenced = move |marker: &str| {
        reply.find(marker).map(|start| {
            let body = &reply[start + marker.len()..];
            let end = body.find("```").unwrap_or(body.len());
            body[..end].trim()
        })
    };
    fenced("```json")
        .or_else(|| fenced("```"))
        .unwrap_or_else(|| reply.trim())
}

/// Why a reply could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    Syntax(String),
    NotAnObject(&'static str),
}

/// Parse the reply's payload, which must be a JSON object.
pub fn parse_object(reply: &str) -> Result<Map<String, Value>, PayloadError> {
    let payload = json_payload(reply);
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(PayloadError::NotAnObject(kind(&other))),
        Err(e) => Err(PayloadError::Syntax(e.to_string())),
    }
}

/// JSON type name for diagnostics.
pub fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_json_fence() {
        let reply = "Here you go:\n```json\n{\"a\": 1}\n```\nand ```{\"b\": 2}```";
        assert_eq!(json_payload(reply), "{\"a\": 1}");
    }

    #[test]
    fn falls_back_to_bare_fence_then_raw_text() {
        assert_eq!(json_payload("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(json_payload("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn unterminated_fence_reads_to_end() {
        assert_eq!(json_payload("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn parse_object_rejects_non_objects_and_garbage() {
        assert!(parse_object("```json\n{\"basic_info\": {}}\n```").is_ok());
        assert_eq!(parse_object("[1, 2]"), Err(PayloadError::NotAnObject("array")));
        assert!(matches!(parse_object("not json"), Err(PayloadError::Syntax(_))));
        assert!(matches!(parse_object(""), Err(PayloadError::Syntax(_))));
    }
}
