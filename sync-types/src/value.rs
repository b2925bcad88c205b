//! Wire atoms.
//!
//! A [`Value`] is the tagged representation of a field value as it travels
//! between replica and authority. Booleans, strings and floats are bare JSON
//! scalars; integers, timestamps and binary blobs are wrapped in single-key
//! objects so they stay distinguishable from floats and strings:
//!
//! ```text
//! {"I": "42"}            integer, decimal string
//! {"T": "1409029942719"} timestamp, epoch milliseconds
//! {"B": "3q2-7w"}        binary, unpadded URL-safe base64
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value as Json};

use crate::WireError;

/// Wrapper key for integers.
pub const INT_TAG: &str = "I";
/// Wrapper key for timestamps.
pub const TIMESTAMP_TAG: &str = "T";
/// Wrapper key for binary blobs.
pub const BINARY_TAG: &str = "B";

/// A tagged wire atom.
///
/// Equality requires an identical variant: `Int(1)` never equals
/// `Float(1.0)`, and lists compare element-wise in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean, bare JSON.
    Bool(bool),
    /// String, bare JSON.
    String(String),
    /// Floating point number, bare JSON.
    Float(f64),
    /// Integer, wrapped as `{"I": "<decimal>"}`.
    Int(i64),
    /// Epoch milliseconds, wrapped as `{"T": "<decimal>"}`.
    Timestamp(i64),
    /// Binary blob, wrapped as `{"B": "<base64url-no-pad>"}`.
    Binary(Vec<u8>),
    /// Ordered list of atoms, bare JSON array.
    List(Vec<Value>),
}

impl Value {
    /// Encode this atom as JSON.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Bool(b) => Json::Bool(*b),
            Value::String(s) => Json::String(s.clone()),
            // Non-finite floats are rejected by the codec before they get here.
            Value::Float(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
            Value::Int(i) => wrapped(INT_TAG, i.to_string()),
            Value::Timestamp(ms) => wrapped(TIMESTAMP_TAG, ms.to_string()),
            Value::Binary(bytes) => wrapped(BINARY_TAG, URL_SAFE_NO_PAD.encode(bytes)),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
        }
    }

    /// Decode an atom from JSON.
    ///
    /// Fails with [`WireError::MalformedAtom`] for `null`, plain objects and
    /// wrappers with an unrecognized tag or an unparsable payload.
    pub fn from_json(json: &Json) -> Result<Self, WireError> {
        match json {
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::String(s) => Ok(Value::String(s.clone())),
            Json::Number(n) => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| WireError::MalformedAtom(n.to_string())),
            Json::Array(items) => items
                .iter()
                .map(Value::from_json)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Json::Object(map) => unwrap_atom(map),
            Json::Null => Err(WireError::MalformedAtom("null".into())),
        }
    }
}

fn wrapped(tag: &str, payload: String) -> Json {
    let mut map = Map::with_capacity(1);
    map.insert(tag.to_string(), Json::String(payload));
    Json::Object(map)
}

fn unwrap_atom(map: &Map<String, Json>) -> Result<Value, WireError> {
    let mut entries = map.iter();
    let (tag, payload) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        _ => return Err(WireError::MalformedAtom(Json::Object(map.clone()).to_string())),
    };
    let text = payload
        .as_str()
        .ok_or_else(|| WireError::MalformedAtom(format!("{}: {}", tag, payload)))?;

    match tag.as_str() {
        INT_TAG => text
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| WireError::MalformedAtom(format!("I: {}", e))),
        TIMESTAMP_TAG => text
            .parse::<i64>()
            .map(Value::Timestamp)
            .map_err(|e| WireError::MalformedAtom(format!("T: {}", e))),
        BINARY_TAG => URL_SAFE_NO_PAD
            .decode(text.trim_end_matches('='))
            .map(Value::Binary)
            .map_err(|e| WireError::MalformedAtom(format!("B: {}", e))),
        other => Err(WireError::MalformedAtom(format!(
            "unknown wrapped atom type {}",
            other
        ))),
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = Json::deserialize(deserializer)?;
        Value::from_json(&json).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_are_bare_json() {
        assert_eq!(Value::Bool(true).to_json(), json!(true));
        assert_eq!(Value::String("hi".into()).to_json(), json!("hi"));
        assert_eq!(Value::Float(2.1).to_json(), json!(2.1));
    }

    #[test]
    fn wrapped_atoms_use_single_key_objects() {
        assert_eq!(Value::Int(1).to_json(), json!({"I": "1"}));
        assert_eq!(Value::Int(-12).to_json(), json!({"I": "-12"}));
        assert_eq!(Value::Timestamp(0).to_json(), json!({"T": "0"}));
        assert_eq!(
            Value::Binary(vec![0xfb, 0xff]).to_json(),
            json!({"B": "-_8"})
        );
    }

    #[test]
    fn lists_recurse() {
        let list = Value::List(vec![Value::Int(1), Value::String("a".into())]);
        assert_eq!(list.to_json(), json!([{"I": "1"}, "a"]));
        assert_eq!(Value::from_json(&json!([{"I": "1"}, "a"])).unwrap(), list);
    }

    #[test]
    fn decodes_wrapped_atoms() {
        assert_eq!(
            Value::from_json(&json!({"T": "1409029942719"})).unwrap(),
            Value::Timestamp(1409029942719)
        );
        assert_eq!(
            Value::from_json(&json!({"B": "-_8"})).unwrap(),
            Value::Binary(vec![0xfb, 0xff])
        );
    }

    #[test]
    fn padded_base64_is_tolerated() {
        assert_eq!(
            Value::from_json(&json!({"B": "AQ=="})).unwrap(),
            Value::Binary(vec![1])
        );
    }

    #[test]
    fn unknown_wrapper_is_malformed() {
        let err = Value::from_json(&json!({"X": "1"})).unwrap_err();
        assert!(matches!(err, WireError::MalformedAtom(_)));
    }

    #[test]
    fn null_and_plain_objects_are_malformed() {
        assert!(matches!(
            Value::from_json(&Json::Null),
            Err(WireError::MalformedAtom(_))
        ));
        assert!(matches!(
            Value::from_json(&json!({"I": "1", "T": "2"})),
            Err(WireError::MalformedAtom(_))
        ));
        assert!(matches!(
            Value::from_json(&json!({"I": 1})),
            Err(WireError::MalformedAtom(_))
        ));
    }

    #[test]
    fn equality_requires_same_tag() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Int(5), Value::Timestamp(5));
        assert_ne!(
            Value::List(vec![Value::Int(1), Value::Int(2)]),
            Value::List(vec![Value::Int(2), Value::Int(1)])
        );
    }

    #[test]
    fn serde_uses_wire_shape() {
        let text = serde_json::to_string(&Value::Int(7)).unwrap();
        assert_eq!(text, r#"{"I":"7"}"#);
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, Value::Int(7));
        assert!(serde_json::from_str::<Value>(r#"{"Z":"7"}"#).is_err());
    }
}
