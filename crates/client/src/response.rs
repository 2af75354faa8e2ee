//! Response body normalization.
//!
//! The API wraps payloads in `{ "success": true, "data": ... }`, but some
//! older endpoints and proxies return bare JSON, and failures may carry
//! either `error` or `message`.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ClientError;

/// Decode a 2xx body into `T`.
pub(crate) fn decode_success<T: DeserializeOwned>(status: u16, body: &[u8]) -> Result<T, ClientError> {
    let value: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(body).map_err(|e| ClientError::Decode(e.to_string()))?
    };

    let payload = match value {
        Value::Object(mut object) if object.get("success").is_some_and(Value::is_boolean) => {
            if object.get("success") == Some(&Value::Bool(false)) {
                return Err(ClientError::Api {
                    status,
                    message: message_from(&Value::Object(object))
                        .unwrap_or_else(|| "request failed".to_owned()),
                });
            }
            object.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };

    serde_json::from_value(payload).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Human-readable message from an error body.
pub(crate) fn error_message(status: u16, body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body)
        && let Some(message) = message_from(&value)
    {
        return message;
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("unknown error")
            .to_owned()
    } else {
        text.to_owned()
    }
}

fn message_from(value: &Value) -> Option<String> {
    ["error", "message"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_owned)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_envelope_and_bare_payloads() {
        let enveloped: Vec<i32> = decode_success(200, br#"{"success":true,"data":[1,2]}"#).unwrap();
        assert_eq!(enveloped, vec![1, 2]);

        let bare: Vec<i32> = decode_success(200, b"[3]").unwrap();
        assert_eq!(bare, vec![3]);

        // An object that merely has a `success` field of another type is a payload.
        let value: Value = decode_success(200, br#"{"success":"yes"}"#).unwrap();
        assert_eq!(value, json!({ "success": "yes" }));

        let empty: Option<i32> = decode_success(204, b"").unwrap();
        assert!(empty.is_none());
    }

    #[test]
    fn test_failed_envelope_in_success_status() {
        let err = decode_success::<Value>(200, br#"{"success":false,"message":"quota exceeded"}"#)
            .unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 200, ref message } if message == "quota exceeded"));
    }

    #[test]
    fn test_error_message_sources() {
        assert_eq!(error_message(409, br#"{"success":false,"error":"stale"}"#), "stale");
        assert_eq!(error_message(400, br#"{"message":"bad input"}"#), "bad input");
        assert_eq!(error_message(429, b"Too Many Requests! Wait for 2s"), "Too Many Requests! Wait for 2s");
        assert_eq!(error_message(502, b""), "Bad Gateway");
    }

    #[test]
    fn test_decode_shape_mismatch() {
        let err = decode_success::<Vec<i32>>(200, br#"{"success":true,"data":{"a":1}}"#).unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }
}
