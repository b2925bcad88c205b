//! Domain value codec.
//!
//! [`Datum`] is what applications read and write; [`Value`] is what goes on
//! the wire. [`serialize`] and [`deserialize`] convert between the two.
//! Absence of a field is expressed by leaving it out of a record, so
//! [`Datum::Null`] has no wire form.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Number, Value as Json};

use crate::{Value, WireError};

/// A domain value held in a record field.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// No value. Deletes the field on update, skipped on insert.
    Null,
    /// Boolean.
    Bool(bool),
    /// UTF-8 text.
    Text(String),
    /// Floating point number.
    Float(f64),
    /// Signed integer.
    Integer(i64),
    /// Point in time, millisecond precision on the wire.
    Timestamp(DateTime<Utc>),
    /// Binary blob.
    Bytes(Vec<u8>),
    /// Ordered list.
    List(Vec<Datum>),
}

impl Datum {
    /// True for [`Datum::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Build a binary datum.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Datum::Bytes(bytes.into())
    }

    /// Convert plain JSON into a datum.
    ///
    /// Integral numbers become [`Datum::Integer`], other numbers
    /// [`Datum::Float`]. Nested objects have no datum form.
    pub fn from_plain_json(json: &Json) -> Result<Self, WireError> {
        match json {
            Json::Null => Ok(Datum::Null),
            Json::Bool(b) => Ok(Datum::Bool(*b)),
            Json::String(s) => Ok(Datum::Text(s.clone())),
            Json::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Ok(Datum::Integer(i)),
                (None, Some(f)) => Ok(Datum::Float(f)),
                _ => Err(WireError::UnsupportedType(format!("number {}", n))),
            },
            Json::Array(items) => items
                .iter()
                .map(Datum::from_plain_json)
                .collect::<Result<Vec<_>, _>>()
                .map(Datum::List),
            Json::Object(_) => Err(WireError::UnsupportedType("nested object".into())),
        }
    }

    /// Render as plain JSON for display.
    ///
    /// Timestamps become RFC 3339 strings and binary blobs base64 strings,
    /// so this is lossy and not meant to be fed back into
    /// [`Datum::from_plain_json`].
    pub fn to_plain_json(&self) -> Json {
        match self {
            Datum::Null => Json::Null,
            Datum::Bool(b) => Json::Bool(*b),
            Datum::Text(s) => Json::String(s.clone()),
            Datum::Float(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
            Datum::Integer(i) => Json::Number((*i).into()),
            Datum::Timestamp(t) => Json::String(t.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Datum::Bytes(b) => Json::String(URL_SAFE_NO_PAD.encode(b)),
            Datum::List(items) => Json::Array(items.iter().map(Datum::to_plain_json).collect()),
        }
    }
}

impl From<bool> for Datum {
    fn from(b: bool) -> Self {
        Datum::Bool(b)
    }
}

impl From<&str> for Datum {
    fn from(s: &str) -> Self {
        Datum::Text(s.to_string())
    }
}

impl From<String> for Datum {
    fn from(s: String) -> Self {
        Datum::Text(s)
    }
}

impl From<i64> for Datum {
    fn from(i: i64) -> Self {
        Datum::Integer(i)
    }
}

impl From<i32> for Datum {
    fn from(i: i32) -> Self {
        Datum::Integer(i.into())
    }
}

impl From<f64> for Datum {
    fn from(f: f64) -> Self {
        Datum::Float(f)
    }
}

impl From<DateTime<Utc>> for Datum {
    fn from(t: DateTime<Utc>) -> Self {
        Datum::Timestamp(t)
    }
}

impl From<Vec<Datum>> for Datum {
    fn from(items: Vec<Datum>) -> Self {
        Datum::List(items)
    }
}

impl<T: Into<Datum>> From<Option<T>> for Datum {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Datum::Null)
    }
}

/// Convert a domain value to its wire atom.
///
/// Fails with [`WireError::UnsupportedType`] for `Null` (anywhere, including
/// inside lists) and for non-finite floats, which JSON cannot carry.
pub fn serialize(datum: &Datum) -> Result<Value, WireError> {
    match datum {
        Datum::Null => Err(WireError::UnsupportedType("null".into())),
        Datum::Bool(b) => Ok(Value::Bool(*b)),
        Datum::Text(s) => Ok(Value::String(s.clone())),
        Datum::Float(f) if f.is_finite() => Ok(Value::Float(*f)),
        Datum::Float(f) => Err(WireError::UnsupportedType(format!("float {}", f))),
        Datum::Integer(i) => Ok(Value::Int(*i)),
        Datum::Timestamp(t) => Ok(Value::Timestamp(t.timestamp_millis())),
        Datum::Bytes(b) => Ok(Value::Binary(b.clone())),
        Datum::List(items) => items
            .iter()
            .map(serialize)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
    }
}

/// Convert a wire atom back to a domain value.
pub fn deserialize(value: &Value) -> Result<Datum, WireError> {
    match value {
        Value::Bool(b) => Ok(Datum::Bool(*b)),
        Value::String(s) => Ok(Datum::Text(s.clone())),
        Value::Float(f) => Ok(Datum::Float(*f)),
        Value::Int(i) => Ok(Datum::Integer(*i)),
        Value::Timestamp(ms) => Utc
            .timestamp_millis_opt(*ms)
            .single()
            .map(Datum::Timestamp)
            .ok_or_else(|| WireError::MalformedAtom(format!("timestamp out of range: {}", ms))),
        Value::Binary(b) => Ok(Datum::Bytes(b.clone())),
        Value::List(items) => items
            .iter()
            .map(deserialize)
            .collect::<Result<Vec<_>, _>>()
            .map(Datum::List),
    }
}

/// Structural equality of two atoms, used by the diff.
pub fn equal(a: &Value, b: &Value) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn scalars_map_to_matching_atoms() {
        assert_eq!(serialize(&Datum::Bool(false)).unwrap(), Value::Bool(false));
        assert_eq!(serialize(&"hello".into()).unwrap(), Value::String("hello".into()));
        assert_eq!(serialize(&Datum::Integer(1)).unwrap(), Value::Int(1));
        assert_eq!(serialize(&Datum::Float(2.1)).unwrap(), Value::Float(2.1));
    }

    #[test]
    fn timestamps_become_epoch_millis() {
        let epoch = Utc.timestamp_millis_opt(0).single().unwrap();
        assert_eq!(serialize(&epoch.into()).unwrap(), Value::Timestamp(0));

        let t = Utc.timestamp_millis_opt(1409029942719).single().unwrap();
        let atom = serialize(&Datum::Timestamp(t)).unwrap();
        assert_eq!(atom.to_json(), json!({"T": "1409029942719"}));
        assert_eq!(deserialize(&atom).unwrap(), Datum::Timestamp(t));
    }

    #[test]
    fn null_is_unsupported() {
        assert!(matches!(
            serialize(&Datum::Null),
            Err(WireError::UnsupportedType(_))
        ));
        assert!(matches!(
            serialize(&Datum::List(vec![Datum::Integer(1), Datum::Null])),
            Err(WireError::UnsupportedType(_))
        ));
    }

    #[test]
    fn non_finite_floats_are_unsupported() {
        assert!(serialize(&Datum::Float(f64::NAN)).is_err());
        assert!(serialize(&Datum::Float(f64::INFINITY)).is_err());
    }

    #[test]
    fn equal_is_tag_sensitive() {
        assert!(equal(&Value::Int(3), &Value::Int(3)));
        assert!(!equal(&Value::Int(3), &Value::Float(3.0)));
        assert!(!equal(&Value::String("1".into()), &Value::Int(1)));
    }

    #[test]
    fn plain_json_conversion() {
        let datum = Datum::from_plain_json(&json!([1, 2.5, "x", true, null])).unwrap();
        assert_eq!(
            datum,
            Datum::List(vec![
                Datum::Integer(1),
                Datum::Float(2.5),
                Datum::Text("x".into()),
                Datum::Bool(true),
                Datum::Null,
            ])
        );
        assert!(Datum::from_plain_json(&json!({"a": 1})).is_err());
    }

    #[test]
    fn option_none_is_null() {
        let missing: Option<i64> = None;
        assert!(Datum::from(missing).is_null());
        assert_eq!(Datum::from(Some(4i64)), Datum::Integer(4));
    }

    fn arbitrary_datum() -> impl Strategy<Value = Datum> {
        let leaf = prop_oneof![
            any::<bool>().prop_map(Datum::Bool),
            ".{0,12}".prop_map(Datum::Text),
            (-1.0e12..1.0e12f64).prop_map(Datum::Float),
            any::<i64>().prop_map(Datum::Integer),
            (-8_000_000_000_000i64..8_000_000_000_000i64).prop_map(|ms| {
                Datum::Timestamp(Utc.timestamp_millis_opt(ms).single().unwrap())
            }),
            prop::collection::vec(any::<u8>(), 0..16).prop_map(Datum::Bytes),
        ];
        leaf.prop_recursive(3, 24, 6, |inner| {
            prop::collection::vec(inner, 0..6).prop_map(Datum::List)
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Every representable datum survives the codec, including a trip
        /// through JSON text.
        #[test]
        fn codec_roundtrip(datum in arbitrary_datum()) {
            let atom = serialize(&datum).unwrap();
            prop_assert_eq!(deserialize(&atom).unwrap(), datum.clone());

            let text = serde_json::to_string(&atom).unwrap();
            let parsed: Value = serde_json::from_str(&text).unwrap();
            prop_assert_eq!(deserialize(&parsed).unwrap(), datum);
        }
    }
}
