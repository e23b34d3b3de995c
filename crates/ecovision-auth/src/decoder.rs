//! Response normalization.
//!
//! Turns a backend response into either its JSON payload or a typed
//! [`AuthError`] carrying a human-readable message. Backend error bodies come
//! in several shapes; the message is picked in this order:
//!
//! 1. `detail`
//! 2. `message`
//! 3. `error`
//! 4. first entry of `non_field_errors`
//! 5. first field holding a non-empty list of strings, as `"<field>: <error>"`
//! 6. `"Server error: <status>"`

use reqwest::StatusCode;
use serde_json::{Map, Value};

use crate::errors::{AuthError, DecodedError};

const MESSAGE_KEYS: [&str; 3] = ["detail", "message", "error"];
const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Decodes backend responses.
#[derive(Clone, Debug, Default)]
pub struct ResponseDecoder {
    field_order: Vec<String>,
}

impl ResponseDecoder {
    /// Decoder scanning validation fields in map order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that checks the named fields first when building per-field messages.
    pub fn with_field_order(fields: &[&str]) -> Self {
        Self {
            field_order: fields.iter().map(|f| (*f).to_string()).collect(),
        }
    }

    /// Consume a response. `Ok(None)` for 204.
    pub async fn decode(&self, response: reqwest::Response) -> Result<Option<Value>, AuthError> {
        let status = response.status();
        let body = response.bytes().await?;
        self.decode_parts(status, &body)
    }

    /// Decode an already-read status and body.
    pub fn decode_parts(&self, status: StatusCode, body: &[u8]) -> Result<Option<Value>, AuthError> {
        if !status.is_success() {
            return Err(self.error_for(status, body));
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        serde_json::from_slice(body).map(Some).map_err(|e| {
            AuthError::Decode(format!(
                "expected JSON in {} response: {e}",
                status.as_u16()
            ))
        })
    }

    /// Build the error for a non-2xx response.
    pub fn error_for(&self, status: StatusCode, body: &[u8]) -> AuthError {
        let code = status.as_u16();
        let decoded = match serde_json::from_slice::<Value>(body) {
            Ok(raw) => DecodedError {
                message: self
                    .extract_message(&raw)
                    .unwrap_or_else(|| format!("Server error: {code}")),
                http_status: Some(code),
                raw: Some(raw),
            },
            Err(_) => DecodedError {
                message: format!(
                    "request failed: {code} {}",
                    status.canonical_reason().unwrap_or("Unknown Status")
                ),
                http_status: Some(code),
                raw: None,
            },
        };

        tracing::debug!(status = code, message = %decoded.message, "backend returned an error");

        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                AuthError::Validation(decoded)
            }
            _ => AuthError::Server(decoded),
        }
    }

    /// Pick a message out of a JSON error body.
    pub fn extract_message(&self, body: &Value) -> Option<String> {
        let obj = body.as_object()?;

        for key in MESSAGE_KEYS {
            if let Some(msg) = obj.get(key).and_then(message_text) {
                return Some(msg);
            }
        }

        if let Some(msg) = obj
            .get(NON_FIELD_ERRORS)
            .and_then(Value::as_array)
            .and_then(|errors| errors.first())
            .and_then(message_text)
        {
            return Some(msg);
        }

        self.field_message(obj)
    }

    fn field_message(&self, obj: &Map<String, Value>) -> Option<String> {
        let preferred = self
            .field_order
            .iter()
            .filter_map(|f| obj.get_key_value(f.as_str()));
        let rest = obj.iter().filter(|(k, _)| {
            !self.field_order.iter().any(|f| f == *k)
                && !MESSAGE_KEYS.contains(&k.as_str())
                && k.as_str() != NON_FIELD_ERRORS
        });

        preferred.chain(rest).find_map(|(field, value)| {
            let first = value
                .as_array()?
                .first()?
                .as_str()
                .filter(|s| !s.trim().is_empty())?;
            Some(format!("{field}: {first}"))
        })
    }
}

/// Text of a message-bearing value: a non-empty string, or the first usable
/// entry of a list (`[{"msg": ...}]` validation lists included).
fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => items.first().and_then(message_text),
        Value::Object(obj) => obj
            .get("msg")
            .or_else(|| obj.get("message"))
            .and_then(message_text),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
