//! Invocation body enrichment.
//!
//! The client's JSON object is forwarded as-is with the rendezvous
//! coordinates added as two top-level string fields.

use serde_json::{Map, Value};
use thiserror::Error;

pub const STREAM_HOST_FIELD: &str = "STREAM_HOST";
pub const STREAM_PORT_FIELD: &str = "STREAM_PORT";

#[derive(Debug, Error)]
pub enum InjectError {
    #[error("{0}")]
    Decode(#[from] serde_json::Error),

    #[error("request body must be a JSON object")]
    NotAnObject,
}

/// Decode `body` as a JSON object and add `STREAM_HOST`/`STREAM_PORT`.
///
/// An empty (or all-whitespace) body counts as `{}`. Anything that is not a
/// JSON object fails; nothing is partially merged.
pub fn inject_stream_coordinates(
    body: &[u8],
    host: &str,
    port: &str,
) -> Result<Map<String, Value>, InjectError> {
    let mut object = if body.iter().all(u8::is_ascii_whitespace) {
        Map::new()
    } else {
        match serde_json::from_slice::<Value>(body)? {
            Value::Object(object) => object,
            _ => return Err(InjectError::NotAnObject),
        }
    };

    object.insert(STREAM_HOST_FIELD.to_string(), Value::String(host.to_string()));
    object.insert(STREAM_PORT_FIELD.to_string(), Value::String(port.to_string()));
    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_existing_fields() {
        let body = br#"{"key": "value", "nested": {"n": [1, 2]}}"#;
        let enriched = inject_stream_coordinates(body, "localhost", "8080").unwrap();
        assert_eq!(
            Value::Object(enriched),
            json!({
                "key": "value",
                "nested": {"n": [1, 2]},
                "STREAM_HOST": "localhost",
                "STREAM_PORT": "8080",
            })
        );
    }

    #[test]
    fn empty_object() {
        let enriched = inject_stream_coordinates(b"{}", "localhost", "8080").unwrap();
        assert_eq!(
            Value::Object(enriched),
            json!({"STREAM_HOST": "localhost", "STREAM_PORT": "8080"})
        );
    }

    #[test]
    fn absent_body_is_empty_object() {
        let enriched = inject_stream_coordinates(b"", "h", "1").unwrap();
        assert_eq!(enriched.len(), 2);
        let enriched = inject_stream_coordinates(b" \n", "h", "1").unwrap();
        assert_eq!(enriched.len(), 2);
    }

    #[test]
    fn truncated_json_fails() {
        let err = inject_stream_coordinates(br#"{"key": "value""#, "h", "1").unwrap_err();
        assert!(matches!(err, InjectError::Decode(_)));
        assert!(err.to_string().contains("EOF"));
    }

    #[test]
    fn non_object_fails() {
        for body in [&b"[1, 2]"[..], b"\"text\"", b"42", b"null"] {
            let err = inject_stream_coordinates(body, "h", "1").unwrap_err();
            assert!(matches!(err, InjectError::NotAnObject));
        }
    }

    #[test]
    fn coordinates_override_client_values() {
        let enriched =
            inject_stream_coordinates(br#"{"STREAM_PORT": "1"}"#, "h", "9000").unwrap();
        assert_eq!(enriched[STREAM_PORT_FIELD], "9000");
    }
}
