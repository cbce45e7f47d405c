//! Reversible request fingerprints for cache addressing
//!
//! A key is the base64 encoding of the canonical JSON of the request's
//! method, URL, body, and tenant. Reversible on purpose: debugging and
//! invalidation tooling can recover the inputs from a stored key.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The four inputs a cache key is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFingerprint {
    pub method: String,
    pub url: String,
    pub body: Option<String>,
    pub seller_id: Option<String>,
}

/// Generate a deterministic cache key from the request quadruple.
///
/// Pure: identical inputs (including a `None` body) always produce the same
/// key, and varying any one input changes it. The JSON object is serialized
/// with sorted keys, so the encoding is canonical.
pub fn fingerprint(
    method: &str,
    url: &str,
    body: Option<&Value>,
    seller_id: Option<&str>,
) -> String {
    let canonical = serde_json::json!({
        "method": method.to_uppercase(),
        "url": url,
        "body": body.map(Value::to_string),
        "sellerId": seller_id,
    });
    STANDARD.encode(canonical.to_string())
}

/// Recover the fingerprint inputs from a stored key.
pub fn decode(key: &str) -> Option<RequestFingerprint> {
    let bytes = STANDARD.decode(key).ok()?;
    serde_json::from_slice(&bytes).ok()
}
