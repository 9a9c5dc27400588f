//! Payload redaction for outbound webhooks.
//!
//! Applied once, at dispatch time, before the payload is serialized into
//! the attempt row. Nothing downstream ever sees the unredacted value.

use serde_json::Value;

/// Replacement written over redacted values.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Key fragments whose values must never leave the system. Matching is
/// case-insensitive and by substring, so `api_key`, `ApiKey` and
/// `swiftpay_api_key` all hit.
const DENY_LIST: &[&str] = &[
    "password",
    "secret",
    "token",
    "api_key",
    "apikey",
    "private_key",
    "authorization",
    "card_number",
];

fn is_sensitive(key: &str) -> bool {
    let key = key.to_lowercase();
    DENY_LIST.iter().any(|deny| key.contains(deny))
}

/// Returns a copy of the payload with every sensitive value replaced by
/// [`REDACTION_MARKER`]. Recurses through objects and arrays; scalar
/// payloads pass through untouched.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, val)| {
                    if is_sensitive(key) {
                        (key.clone(), Value::String(REDACTION_MARKER.into()))
                    } else {
                        (key.clone(), redact(val))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}
