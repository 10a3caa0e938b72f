//! Typed value codec, replacing the original's `interface{}`-switch
//! `BytesToAny`/`AnyToBytes`: scalars encode as their raw UTF-8 textual
//! form, everything else encodes as JSON.

use serde::Serialize;

/// The value arms a caller may encode to or decode from raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Json(serde_json::Value),
}

/// Errors converting bytes to a requested arm.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("invalid UTF-8 in value bytes")]
    InvalidUtf8,
    #[error("'{0}' is not a valid integer")]
    InvalidInt(String),
    #[error("'{0}' is not a valid float")]
    InvalidFloat(String),
    #[error("'{0}' is not a valid bool")]
    InvalidBool(String),
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
}

impl Value {
    /// Encode to the wire representation: decimal/textual for scalars,
    /// JSON for everything else.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Value::Int(v) => v.to_string().into_bytes(),
            Value::Float(v) => v.to_string().into_bytes(),
            Value::Bool(v) => v.to_string().into_bytes(),
            Value::String(v) => v.clone().into_bytes(),
            Value::Json(v) => serde_json::to_vec(v).expect("Value::Json always serializes"),
        }
    }

    pub fn decode_int(bytes: &[u8]) -> Result<i64, CodecError> {
        let s = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
        s.trim().parse().map_err(|_| CodecError::InvalidInt(s.to_owned()))
    }

    pub fn decode_float(bytes: &[u8]) -> Result<f64, CodecError> {
        let s = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
        s.trim().parse().map_err(|_| CodecError::InvalidFloat(s.to_owned()))
    }

    pub fn decode_bool(bytes: &[u8]) -> Result<bool, CodecError> {
        let s = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
        s.trim().parse().map_err(|_| CodecError::InvalidBool(s.to_owned()))
    }

    pub fn decode_string(bytes: &[u8]) -> Result<String, CodecError> {
        std::str::from_utf8(bytes).map(str::to_owned).map_err(|_| CodecError::InvalidUtf8)
    }

    pub fn decode_json(bytes: &[u8]) -> Result<serde_json::Value, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::InvalidJson(e.to_string()))
    }
}

/// Encode any `Serialize` value as a `Value::Json` arm's bytes — the
/// fallback path the original takes for anything that isn't a bare
/// scalar or string.
pub fn encode_json<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("caller-provided value must serialize")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_round_trips_as_decimal_text() {
        let v = Value::Int(-42);
        let bytes = v.encode();
        assert_eq!(bytes, b"-42");
        assert_eq!(Value::decode_int(&bytes).unwrap(), -42);
    }

    #[test]
    fn bool_round_trips() {
        let v = Value::Bool(true);
        assert_eq!(v.encode(), b"true");
        assert!(Value::decode_bool(b"true").unwrap());
    }

    #[test]
    fn json_arm_serializes_arbitrary_values() {
        let v = Value::Json(serde_json::json!({"a": 1}));
        let bytes = v.encode();
        let back = Value::decode_json(&bytes).unwrap();
        assert_eq!(back["a"], 1);
    }

    #[test]
    fn decode_int_rejects_non_numeric_text() {
        assert!(matches!(Value::decode_int(b"not-a-number"), Err(CodecError::InvalidInt(_))));
    }
}
