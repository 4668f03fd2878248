//! Shared newtypes and helpers used across all modules.
//!
//! These types are serialization-transparent: they serialize/deserialize as
//! the plain strings wallet extensions hand back, so they can be passed to JS
//! without conversion.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

// ─── BtcAddress ──────────────────────────────────────────────────────────────

/// A Bitcoin address as reported by the wallet. Not validated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BtcAddress(String);

impl BtcAddress {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Pull the first address out of a provider response.
    ///
    /// Accepts a bare string, an array whose first element is a string, or an
    /// array whose first element is an object with an `address` field.
    pub fn from_response(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
            Value::Array(items) => match items.first()? {
                Value::String(s) if !s.is_empty() => Some(Self(s.clone())),
                Value::Object(map) => match map.get("address") {
                    Some(Value::String(s)) if !s.is_empty() => Some(Self(s.clone())),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        }
    }
}

impl std::fmt::Display for BtcAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BtcAddress {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BtcAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Serialize for BtcAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for BtcAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(BtcAddress(s))
    }
}

// ─── Signature ───────────────────────────────────────────────────────────────

/// A message signature in whatever encoding the wallet chose (usually base64).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(String);

impl Signature {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Normalize a provider's signing result.
    ///
    /// Strings are taken as-is, `null` becomes an empty signature, and any
    /// structured result (some wallets return `{ signature, publicKey }`)
    /// prefers its `signature` field, falling back to the JSON text.
    pub fn from_response(value: Value) -> Self {
        match value {
            Value::String(s) => Self(s),
            Value::Null => Self(String::new()),
            Value::Object(ref map) => match map.get("signature") {
                Some(Value::String(s)) => Self(s.clone()),
                _ => Self(value.to_string()),
            },
            other => Self(other.to_string()),
        }
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Signature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Signature(s))
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Render any thrown value as a human-readable message. Never panics.
pub fn safe_error_message(error: &Value) -> String {
    match error {
        Value::Null => "Unknown error".to_string(),
        Value::String(s) if s.is_empty() => "Unknown error".to_string(),
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("message") {
            Some(Value::String(m)) if !m.is_empty() => m.clone(),
            _ => serde_json::to_string(error).unwrap_or_else(|_| "Unknown error".to_string()),
        },
        other => serde_json::to_string(other).unwrap_or_else(|_| "Unknown error".to_string()),
    }
}

/// JS truthiness for a property value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_address_from_array() {
        let addr = BtcAddress::from_response(&json!(["bc1qabc", "bc1qdef"]));
        assert_eq!(addr, Some(BtcAddress::from("bc1qabc")));
    }

    #[test]
    fn test_address_from_scalar_and_object() {
        assert_eq!(
            BtcAddress::from_response(&json!("bc1qxyz")),
            Some(BtcAddress::from("bc1qxyz"))
        );
        assert_eq!(
            BtcAddress::from_response(&json!([{ "address": "tb1qq", "publicKey": "02ab" }])),
            Some(BtcAddress::from("tb1qq"))
        );
    }

    #[test]
    fn test_address_empty_responses() {
        assert_eq!(BtcAddress::from_response(&json!([])), None);
        assert_eq!(BtcAddress::from_response(&json!([""])), None);
        assert_eq!(BtcAddress::from_response(&json!("")), None);
        assert_eq!(BtcAddress::from_response(&Value::Null), None);
        assert_eq!(BtcAddress::from_response(&json!({ "accounts": [] })), None);
    }

    #[test]
    fn test_signature_from_response() {
        assert_eq!(Signature::from_response(json!("H1sig==")).as_str(), "H1sig==");
        assert!(Signature::from_response(Value::Null).is_empty());
        assert_eq!(
            Signature::from_response(json!({ "signature": "Hx", "publicKey": "02" })).as_str(),
            "Hx"
        );
        assert_eq!(Signature::from_response(json!([1, 2])).as_str(), "[1,2]");
    }

    #[test]
    fn test_safe_error_message_never_fails() {
        assert_eq!(safe_error_message(&Value::Null), "Unknown error");
        assert_eq!(safe_error_message(&json!("boom")), "boom");
        assert_eq!(safe_error_message(&json!({ "message": "denied" })), "denied");
        assert_eq!(safe_error_message(&json!({ "code": 4001 })), r#"{"code":4001}"#);
        assert_eq!(safe_error_message(&json!(42)), "42");
        assert_eq!(safe_error_message(&json!(false)), "false");
        assert_eq!(safe_error_message(&json!({ "message": 7 })), r#"{"message":7}"#);
    }

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!({})));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&Value::Null));
    }
}
