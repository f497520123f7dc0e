//! Documents, field values, and the metadata-stripped identity used for fusion.
//!
//! A [`Document`] is an ordered mapping from field name to [`Value`]. Search
//! backends attach transient metadata to the documents they return (a vector
//! distance, a text relevance score); fusion attaches `rrf_score`. None of
//! those fields are part of a document's identity, so two hits for the same
//! record coming from different modalities compare equal through
//! [`Document::key`].
//!
//! # Metadata fields
//!
//! | Field          | Origin                              |
//! |----------------|-------------------------------------|
//! | `_distance`    | vector search (any `_`-prefixed)    |
//! | `_score`       | text search (any `_`-prefixed)      |
//! | `rrf_score`    | a previous fusion pass              |

use serde::{Deserialize, Deserializer, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Field-name prefix reserved for metadata attached by search modalities.
pub const METADATA_PREFIX: &str = "_";

/// Field name carrying the Reciprocal Rank Fusion score.
pub const FUSION_SCORE_FIELD: &str = "rrf_score";

/// Returns `true` when `name` is transient metadata rather than record data.
#[must_use]
pub fn is_metadata_field(name: &str) -> bool {
    name.starts_with(METADATA_PREFIX) || name == FUSION_SCORE_FIELD
}

/// A scalar or vector field value.
///
/// Serializes untagged, so a document round-trips through plain JSON objects.
/// JSON arrays are always read as [`Value::List`], keeping integers and
/// floats exact. [`Value::Vector`] only comes from typed embeddings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Vector(Vec<f32>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Short type name, used in error messages.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "string",
            Self::Vector(_) => "vector",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Embedding view of this value.
    ///
    /// A non-empty list made only of numbers is converted on demand, so
    /// embeddings loaded from JSON are searchable without being rewritten.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_vector(&self) -> Option<Cow<'_, [f32]>> {
        match self {
            Self::Vector(v) => Some(Cow::Borrowed(v)),
            Self::List(items) if !items.is_empty() => items
                .iter()
                .map(|item| item.as_f64().map(|f| f as f32))
                .collect::<Option<Vec<_>>>()
                .map(Cow::Owned),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn normalized(&self) -> KeyValue {
        match self {
            Self::Null => KeyValue::Null,
            Self::Bool(b) => KeyValue::Bool(*b),
            Self::Int(i) => KeyValue::Int(*i),
            Self::Float(f) => KeyValue::Float(float_bits(*f)),
            Self::Text(s) => KeyValue::Text(s.clone()),
            Self::Vector(v) => KeyValue::Vector(v.iter().map(|x| f32_bits(*x)).collect()),
            Self::List(items) => KeyValue::List(items.iter().map(Self::normalized).collect()),
            Self::Map(map) => KeyValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.normalized()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(raw: serde_json::Value) -> Self {
        match raw {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Vec<f32>> for Value {
    fn from(v: Vec<f32>) -> Self {
        Self::Vector(v)
    }
}

// -0.0 and 0.0 are the same value; every NaN is the same value.
fn float_bits(f: f64) -> u64 {
    if f == 0.0 {
        0
    } else if f.is_nan() {
        f64::NAN.to_bits()
    } else {
        f.to_bits()
    }
}

fn f32_bits(f: f32) -> u32 {
    if f == 0.0 {
        0
    } else if f.is_nan() {
        f32::NAN.to_bits()
    } else {
        f.to_bits()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(String),
    Vector(Vec<u32>),
    List(Vec<KeyValue>),
    Map(Vec<(String, KeyValue)>),
}

/// Metadata-stripped identity of a [`Document`].
///
/// Only used for equality and hashing while fusing; never surfaced.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey(Vec<(String, KeyValue)>);

impl DocumentKey {
    /// Number of identity-bearing fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One retrievable record: an ordered mapping from field name to value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: BTreeMap<String, Value>,
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Set a field, returning the previous value if there was one.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    #[must_use]
    pub fn contains_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The fusion score previously attached to this document, if any.
    #[must_use]
    pub fn fusion_score(&self) -> Option<f64> {
        self.get(FUSION_SCORE_FIELD).and_then(Value::as_f64)
    }

    /// Derive the identity key: every field except metadata, in name order.
    #[must_use]
    pub fn key(&self) -> DocumentKey {
        DocumentKey(
            self.fields
                .iter()
                .filter(|(name, _)| !is_metadata_field(name))
                .map(|(name, value)| (name.clone(), value.normalized()))
                .collect(),
        )
    }

    /// Copy of this document with all metadata fields removed.
    #[must_use]
    pub fn stripped(&self) -> Self {
        self.fields
            .iter()
            .filter(|(name, _)| !is_metadata_field(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

impl From<BTreeMap<String, Value>> for Document {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Document {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_fields_are_recognised() {
        assert!(is_metadata_field("_distance"));
        assert!(is_metadata_field("_score"));
        assert!(is_metadata_field("rrf_score"));
        assert!(!is_metadata_field("score"));
        assert!(!is_metadata_field("id"));
    }

    #[test]
    fn key_ignores_metadata() {
        let from_vector = Document::new()
            .with("id", 7)
            .with("title", "auth timeout")
            .with("_distance", 0.25);
        let from_text = Document::new()
            .with("id", 7)
            .with("title", "auth timeout")
            .with("_score", 3.5)
            .with("rrf_score", 0.03);

        assert_eq!(from_vector.key(), from_text.key());
        assert_eq!(from_vector.key().len(), 2);
    }

    #[test]
    fn key_distinguishes_data_fields() {
        let a = Document::new().with("id", 1);
        let b = Document::new().with("id", 2);
        let c = Document::new().with("id", 1).with("title", "x");
        assert_ne!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn key_treats_int_and_float_as_distinct() {
        let a = Document::new().with("n", 1);
        let b = Document::new().with("n", 1.0);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn key_normalises_signed_zero_and_nan() {
        let pos = Document::new().with("x", 0.0);
        let neg = Document::new().with("x", -0.0);
        assert_eq!(pos.key(), neg.key());

        let nan_a = Document::new().with("x", f64::NAN);
        let nan_b = Document::new().with("x", -f64::NAN);
        assert_eq!(nan_a.key(), nan_b.key());
        assert_ne!(nan_a.key(), Document::new().with("x", Value::Null).key());
    }

    #[test]
    fn stripped_drops_only_metadata() {
        let doc = Document::new()
            .with("id", 1)
            .with("_distance", 0.5)
            .with("rrf_score", 0.1);
        let stripped = doc.stripped();
        assert_eq!(stripped.len(), 1);
        assert!(stripped.contains_field("id"));
    }

    #[test]
    fn json_number_arrays_stay_exact_lists() {
        let raw = json!({"embedding": [1, 2.5, 3], "ids": [9_007_199_254_740_993_i64, 3]});
        let doc: Document = serde_json::from_value(raw.clone()).expect("valid document");
        assert_eq!(
            doc.get("embedding"),
            Some(&Value::List(vec![Value::Int(1), Value::Float(2.5), Value::Int(3)]))
        );
        assert_eq!(serde_json::to_value(&doc).expect("serialize"), raw);
    }

    #[test]
    fn numeric_lists_read_as_vectors() {
        let doc: Document =
            serde_json::from_value(json!({"embedding": [1, 2.5], "tags": ["a"], "empty": []}))
                .expect("valid document");
        assert_eq!(
            doc.get("embedding").and_then(Value::as_vector).as_deref(),
            Some(&[1.0_f32, 2.5][..])
        );
        assert!(doc.get("tags").and_then(Value::as_vector).is_none());
        assert!(doc.get("empty").and_then(Value::as_vector).is_none());
        let typed = Value::from(vec![0.5_f32]);
        assert_eq!(typed.as_vector().as_deref(), Some(&[0.5_f32][..]));
    }

    #[test]
    fn key_keeps_large_integer_arrays_apart() {
        let a: Document = serde_json::from_value(json!({"tags": [16_777_217]})).expect("doc");
        let b: Document = serde_json::from_value(json!({"tags": [16_777_216]})).expect("doc");
        assert_ne!(a.key(), b.key());

        let int: Document = serde_json::from_value(json!({"tags": [1]})).expect("doc");
        let float: Document = serde_json::from_value(json!({"tags": [1.0]})).expect("doc");
        assert_ne!(int.key(), float.key());
    }

    #[test]
    fn document_serializes_as_flat_object() {
        let doc = Document::new().with("id", 3).with("title", "hello");
        let value = serde_json::to_value(&doc).expect("serialize");
        assert_eq!(value, json!({"id": 3, "title": "hello"}));
    }

    #[test]
    fn fusion_score_reads_attached_field() {
        let doc = Document::new().with("rrf_score", 0.5);
        assert_eq!(doc.fusion_score(), Some(0.5));
        assert_eq!(Document::new().fusion_score(), None);
    }
}
