//! Wire types shared by both transport backends.
//!
//! `Value` is self-describing by construction (a plain derived enum, not
//! `serde_json::Value`) so it round-trips through both the DIRECT codec
//! (bincode, non-self-describing) and the BROKERED codec (YAML,
//! self-describing) without special casing.

use crate::error::ErrorEnvelope;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A value that can cross the wire: an argument, a keyword argument, a
/// return value, or (via the `Error` variant) a marshalled exception.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Seq(Vec<Value>),
    Map(Vec<(String, Value)>),
    Error(ErrorEnvelope),
}

impl Value {
    pub fn as_error(&self) -> Option<&ErrorEnvelope> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// The request record carried by both backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub function: String,
    pub args: Vec<Value>,
    pub kwargs: HashMap<String, Value>,
    pub reply_to: Option<String>,
}

impl Request {
    pub fn call(function: impl Into<String>, args: Vec<Value>, kwargs: HashMap<String, Value>, reply_to: String) -> Self {
        Self {
            function: function.into(),
            args,
            kwargs,
            reply_to: Some(reply_to),
        }
    }

    pub fn fire_and_forget(function: impl Into<String>, args: Vec<Value>, kwargs: HashMap<String, Value>) -> Self {
        Self {
            function: function.into(),
            args,
            kwargs,
            reply_to: None,
        }
    }
}

/// Encode a value with the DIRECT backend's codec (bincode).
pub fn encode_direct<T: Serialize>(value: &T) -> Result<Vec<u8>, bincode::Error> {
    bincode::serialize(value)
}

/// Decode a value with the DIRECT backend's codec (bincode).
pub fn decode_direct<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, bincode::Error> {
    bincode::deserialize(bytes)
}

/// Encode a value with the BROKERED backend's codec (YAML).
pub fn encode_brokered<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_yaml::Error> {
    serde_yaml::to_string(value).map(|s| s.into_bytes())
}

/// Decode a value with the BROKERED backend's codec (YAML).
pub fn decode_brokered<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, serde_yaml::Error> {
    serde_yaml::from_slice(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn sample_request() -> Request {
        let mut kwargs = HashMap::new();
        kwargs.insert("verbose".to_string(), Value::Bool(true));
        Request::call(
            "echo",
            vec![Value::Str("hi".into()), Value::Int(42), Value::Seq(vec![Value::Null])],
            kwargs,
            "tcp://127.0.0.1:9999".into(),
        )
    }

    #[test]
    fn direct_codec_round_trips_request() {
        let req = sample_request();
        let bytes = encode_direct(&req).unwrap();
        let back: Request = decode_direct(&bytes).unwrap();
        assert_eq!(back.function, "echo");
        assert_eq!(back.args.len(), 3);
        assert_eq!(back.reply_to.as_deref(), Some("tcp://127.0.0.1:9999"));
    }

    #[test]
    fn brokered_codec_round_trips_request() {
        let req = sample_request();
        let bytes = encode_brokered(&req).unwrap();
        let back: Request = decode_brokered(&bytes).unwrap();
        assert_eq!(back.function, "echo");
        assert_eq!(back.kwargs.get("verbose"), Some(&Value::Bool(true)));
    }

    #[test]
    fn error_envelope_round_trips_both_codecs() {
        let value = Value::Error(ErrorEnvelope::new(ErrorKind::NotFound, "nope"));
        let direct_bytes = encode_direct(&value).unwrap();
        let direct_back: Value = decode_direct(&direct_bytes).unwrap();
        assert_eq!(direct_back.as_error().unwrap().kind, ErrorKind::NotFound);

        let yaml_bytes = encode_brokered(&value).unwrap();
        let yaml_back: Value = decode_brokered(&yaml_bytes).unwrap();
        assert_eq!(yaml_back.as_error().unwrap().message, "nope");
    }

    proptest::proptest! {
        #[test]
        fn value_str_round_trips(s in ".*") {
            let v = Value::Str(s.clone());
            let bytes = encode_direct(&v).unwrap();
            let back: Value = decode_direct(&bytes).unwrap();
            proptest::prop_assert_eq!(back, Value::Str(s));
        }
    }
}
