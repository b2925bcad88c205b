//! Records stored in row tables.
//!
//! A [`Record`] is anything that can expose its fields as a [`FieldMap`] and
//! be rebuilt from one. Typed structs implement it over their own fixed set
//! of fields; [`Document`] covers records whose shape is only known at
//! runtime.

use rowsync_types::{Datum, WireError};
use serde_json::{Map, Value as Json};
use std::collections::BTreeMap;

/// Field name to domain value.
///
/// A [`Datum::Null`] entry means "this field is absent".
pub type FieldMap = BTreeMap<String, Datum>;

/// Name of the id field used by [`Document`].
pub const DEFAULT_ID_FIELD: &str = "id";

/// A domain object that can live in a row table.
pub trait Record: Sized {
    /// The row id, if the record has one.
    fn id(&self) -> Option<&str>;

    /// Assign a freshly generated row id.
    fn set_id(&mut self, id: &str);

    /// All fields of the record, including the id field if it is stored.
    fn fields(&self) -> FieldMap;

    /// Rebuild a record from a row id and its stored fields.
    fn from_fields(id: &str, fields: FieldMap) -> Result<Self, WireError>;
}

/// A record with a dynamic set of fields.
///
/// The id lives in the `"id"` text field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    fields: FieldMap,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document with the given id.
    pub fn with_id(id: &str) -> Self {
        let mut doc = Self::new();
        doc.set_id(id);
        doc
    }

    /// Builder-style field assignment.
    pub fn with(mut self, name: &str, value: impl Into<Datum>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a field. Setting [`Datum::Null`] marks the field for deletion.
    pub fn set(&mut self, name: &str, value: impl Into<Datum>) {
        self.fields.insert(name.to_string(), value.into());
    }

    /// Read a field.
    pub fn get(&self, name: &str) -> Option<&Datum> {
        self.fields.get(name)
    }

    /// Drop a field from the document entirely, leaving the stored value alone
    /// on update.
    pub fn unset(&mut self, name: &str) -> Option<Datum> {
        self.fields.remove(name)
    }

    /// Build a document from a plain JSON object.
    pub fn from_json(json: &Json) -> Result<Self, WireError> {
        let object = json
            .as_object()
            .ok_or_else(|| WireError::InvalidData(format!("expected a JSON object: {}", json)))?;
        let fields = object
            .iter()
            .map(|(k, v)| Ok((k.clone(), Datum::from_plain_json(v)?)))
            .collect::<Result<FieldMap, WireError>>()?;
        Ok(Self { fields })
    }

    /// Render as a plain JSON object.
    pub fn to_json(&self) -> Json {
        Json::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_plain_json()))
                .collect::<Map<_, _>>(),
        )
    }
}

impl Record for Document {
    fn id(&self) -> Option<&str> {
        match self.fields.get(DEFAULT_ID_FIELD) {
            Some(Datum::Text(id)) if !id.is_empty() => Some(id.as_str()),
            _ => None,
        }
    }

    fn set_id(&mut self, id: &str) {
        self.set(DEFAULT_ID_FIELD, id);
    }

    fn fields(&self) -> FieldMap {
        self.fields.clone()
    }

    fn from_fields(id: &str, mut fields: FieldMap) -> Result<Self, WireError> {
        fields
            .entry(DEFAULT_ID_FIELD.to_string())
            .or_insert_with(|| Datum::Text(id.to_string()));
        Ok(Self { fields })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_comes_from_id_field() {
        let doc = Document::with_id("abc").with("title", "hello");
        assert_eq!(doc.id(), Some("abc"));
        assert_eq!(Document::new().id(), None);
        assert_eq!(Document::new().with("id", "").id(), None);
        assert_eq!(Document::new().with("id", 5i64).id(), None);
    }

    #[test]
    fn from_fields_attaches_missing_id() {
        let mut fields = FieldMap::new();
        fields.insert("Id".into(), Datum::Text("1".into()));
        let doc = Document::from_fields("1", fields).unwrap();
        assert_eq!(doc.id(), Some("1"));
        assert_eq!(doc.get("Id"), Some(&Datum::Text("1".into())));
    }

    #[test]
    fn from_fields_keeps_stored_id() {
        let mut fields = FieldMap::new();
        fields.insert("id".into(), Datum::Text("stored".into()));
        let doc = Document::from_fields("row", fields).unwrap();
        assert_eq!(doc.id(), Some("stored"));
    }

    #[test]
    fn json_conversion() {
        let doc = Document::from_json(&json!({"id": "x", "n": 3, "tags": ["a"]})).unwrap();
        assert_eq!(doc.get("n"), Some(&Datum::Integer(3)));
        assert_eq!(doc.to_json(), json!({"id": "x", "n": 3, "tags": ["a"]}));
        assert!(Document::from_json(&json!([1])).is_err());
    }
}
