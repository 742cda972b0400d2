//! Values held in documents.

use crate::blob::Blob;
use crate::collection::{Array, Dictionary};
use crate::context::RootContext;
use crate::error::{CoreError, CoreResult};
use foliodb_codec::{CanonicalEncoder, Classified, RawValue, Value};
use std::sync::Arc;

/// A value read from or written to a document.
///
/// Arrays and dictionaries are shared handles onto lazy overlays: cloning
/// the `DocValue` clones the handle, not the content. Equality compares
/// content.
#[derive(Debug, Clone)]
pub enum DocValue {
    /// Null, or an absent value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating-point number.
    Float(f64),
    /// Text.
    Text(String),
    /// Binary data.
    Blob(Blob),
    /// Ordered collection.
    Array(Array),
    /// Keyed collection.
    Dictionary(Dictionary),
}

impl DocValue {
    /// Decodes one stored item into a value owned by `context`.
    ///
    /// Nested arrays and dictionaries come back as overlays whose own
    /// elements stay encoded.
    pub(crate) fn from_raw(raw: &RawValue, context: &Arc<RootContext>, mutable: bool) -> CoreResult<Self> {
        Ok(match raw.classify()? {
            Classified::Null => DocValue::Null,
            Classified::Bool(b) => DocValue::Bool(b),
            Classified::Integer(n) => DocValue::Integer(n),
            Classified::Float(f) => DocValue::Float(f),
            Classified::Text(s) => DocValue::Text(s),
            Classified::Bytes(b) => DocValue::Blob(Blob::new(b)),
            Classified::Array(array) => DocValue::Array(Array::from_raw(array, Arc::clone(context), mutable)),
            Classified::Map(map) => {
                DocValue::Dictionary(Dictionary::from_raw(map, Arc::clone(context), mutable)?)
            }
        })
    }

    /// Converts a plain value, building standalone mutable collections.
    ///
    /// # Errors
    ///
    /// Returns a data format error if a map has a non-text key.
    pub fn from_value(value: Value) -> CoreResult<Self> {
        Ok(match value {
            Value::Null => DocValue::Null,
            Value::Bool(b) => DocValue::Bool(b),
            Value::Integer(n) => DocValue::Integer(n),
            Value::Float(f) => DocValue::Float(f),
            Value::Text(s) => DocValue::Text(s),
            Value::Bytes(b) => DocValue::Blob(Blob::new(b)),
            Value::Array(items) => {
                let array = Array::new();
                for item in items {
                    array.push(DocValue::from_value(item)?)?;
                }
                DocValue::Array(array)
            }
            Value::Map(pairs) => {
                let dict = Dictionary::new();
                for (key, item) in pairs {
                    let Value::Text(key) = key else {
                        return Err(CoreError::data_format(format!(
                            "dictionary keys must be text, found {key:?}"
                        )));
                    };
                    dict.set(&key, DocValue::from_value(item)?)?;
                }
                DocValue::Dictionary(dict)
            }
        })
    }

    /// Fully materializes the value.
    ///
    /// # Errors
    ///
    /// Returns an error if a nested stored item fails to decode.
    pub fn to_value(&self) -> CoreResult<Value> {
        Ok(match self {
            DocValue::Null => Value::Null,
            DocValue::Bool(b) => Value::Bool(*b),
            DocValue::Integer(n) => Value::Integer(*n),
            DocValue::Float(f) => Value::Float(*f),
            DocValue::Text(s) => Value::Text(s.clone()),
            DocValue::Blob(blob) => Value::Bytes(blob.content().to_vec()),
            DocValue::Array(array) => array.to_value()?,
            DocValue::Dictionary(dict) => dict.to_value()?,
        })
    }

    /// True for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, DocValue::Null)
    }

    /// The boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DocValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            DocValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// The float, if this is one.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            DocValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// True for integers and floats.
    pub fn is_number(&self) -> bool {
        matches!(self, DocValue::Integer(_) | DocValue::Float(_))
    }

    /// The text, if this is text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DocValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The blob, if this is one.
    pub fn as_blob(&self) -> Option<&Blob> {
        match self {
            DocValue::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// The array handle, if this is an array.
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            DocValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The dictionary handle, if this is a dictionary.
    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            DocValue::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// Integer view: floats are rounded (saturating, NaN is 0), booleans
    /// are 1 or 0, anything non-numeric is 0.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_int(&self) -> i64 {
        match self {
            DocValue::Integer(n) => *n,
            DocValue::Float(f) => f.round() as i64,
            DocValue::Bool(b) => i64::from(*b),
            _ => 0,
        }
    }

    /// Float view: integers are widened, booleans are 1.0 or 0.0,
    /// anything non-numeric is 0.0.
    #[allow(clippy::cast_precision_loss)]
    pub fn to_double(&self) -> f64 {
        match self {
            DocValue::Integer(n) => *n as f64,
            DocValue::Float(f) => *f,
            DocValue::Bool(b) => f64::from(u8::from(*b)),
            _ => 0.0,
        }
    }

    /// Boolean view: numbers are true when non-zero, null is false,
    /// anything else is true.
    pub fn to_bool(&self) -> bool {
        match self {
            DocValue::Null => false,
            DocValue::Bool(b) => *b,
            DocValue::Integer(n) => *n != 0,
            DocValue::Float(f) => *f != 0.0,
            _ => true,
        }
    }

    pub(crate) fn is_read_only_collection(&self) -> bool {
        match self {
            DocValue::Array(a) => !a.is_mutable(),
            DocValue::Dictionary(d) => !d.is_mutable(),
            _ => false,
        }
    }

    pub(crate) fn is_mutable_collection(&self) -> bool {
        match self {
            DocValue::Array(a) => a.is_mutable(),
            DocValue::Dictionary(d) => d.is_mutable(),
            _ => false,
        }
    }

    /// A mutable copy owned by `context`; scalars are returned as is.
    ///
    /// The caller must already hold the lock guarding `self`.
    pub(crate) fn mutable_copy(&self, context: &Arc<RootContext>) -> DocValue {
        match self {
            DocValue::Array(a) => DocValue::Array(a.copy_into(context)),
            DocValue::Dictionary(d) => DocValue::Dictionary(d.copy_into(context)),
            other => other.clone(),
        }
    }

    /// Prepares a value for storage in a collection owned by `context`.
    ///
    /// Collections are stored by value: the container keeps its own
    /// mutable copy, so later writes through the caller's handle do not
    /// reach it and a collection can never contain itself.
    pub(crate) fn adopt(self, context: &Arc<RootContext>) -> DocValue {
        match self {
            DocValue::Array(a) => {
                let _guard = a.context().lock();
                DocValue::Array(a.copy_into(context))
            }
            DocValue::Dictionary(d) => {
                let _guard = d.context().lock();
                DocValue::Dictionary(d.copy_into(context))
            }
            other => other,
        }
    }

    pub(crate) fn is_changed(&self) -> bool {
        match self {
            DocValue::Array(a) => a.overlay_changed(),
            DocValue::Dictionary(d) => d.overlay_changed(),
            _ => false,
        }
    }

    pub(crate) fn encode_into(&self, encoder: &mut CanonicalEncoder) -> CoreResult<()> {
        match self {
            DocValue::Null => encoder.encode_null(),
            DocValue::Bool(b) => encoder.encode_bool(*b),
            DocValue::Integer(n) => encoder.encode_integer(*n),
            DocValue::Float(f) => encoder.encode_float(*f),
            DocValue::Text(s) => encoder.encode_text(s),
            DocValue::Blob(blob) => encoder.encode_bytes(blob.content()),
            DocValue::Array(a) => return a.encode_overlay(encoder),
            DocValue::Dictionary(d) => return d.encode_overlay(encoder),
        }
        Ok(())
    }
}

impl PartialEq for DocValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DocValue::Null, DocValue::Null) => true,
            (DocValue::Bool(a), DocValue::Bool(b)) => a == b,
            (DocValue::Integer(a), DocValue::Integer(b)) => a == b,
            (DocValue::Float(a), DocValue::Float(b)) => a == b,
            (DocValue::Text(a), DocValue::Text(b)) => a == b,
            (DocValue::Blob(a), DocValue::Blob(b)) => a == b,
            (DocValue::Array(a), DocValue::Array(b)) => a == b,
            (DocValue::Dictionary(a), DocValue::Dictionary(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for DocValue {
    fn from(b: bool) -> Self {
        DocValue::Bool(b)
    }
}

impl From<i64> for DocValue {
    fn from(n: i64) -> Self {
        DocValue::Integer(n)
    }
}

impl From<i32> for DocValue {
    fn from(n: i32) -> Self {
        DocValue::Integer(i64::from(n))
    }
}

impl From<f64> for DocValue {
    fn from(f: f64) -> Self {
        DocValue::Float(f)
    }
}

impl From<&str> for DocValue {
    fn from(s: &str) -> Self {
        DocValue::Text(s.to_string())
    }
}

impl From<String> for DocValue {
    fn from(s: String) -> Self {
        DocValue::Text(s)
    }
}

impl From<Blob> for DocValue {
    fn from(blob: Blob) -> Self {
        DocValue::Blob(blob)
    }
}

impl From<Array> for DocValue {
    fn from(array: Array) -> Self {
        DocValue::Array(array)
    }
}

impl From<Dictionary> for DocValue {
    fn from(dict: Dictionary) -> Self {
        DocValue::Dictionary(dict)
    }
}

impl From<()> for DocValue {
    fn from((): ()) -> Self {
        DocValue::Null
    }
}

impl<T: Into<DocValue>> From<Option<T>> for DocValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(DocValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_views() {
        assert_eq!(DocValue::Bool(true).to_int(), 1);
        assert_eq!(DocValue::Bool(false).to_int(), 0);
        assert_eq!(DocValue::from("12").to_int(), 0);
        assert_eq!(DocValue::Null.to_int(), 0);
        assert!(DocValue::Integer(-3).to_bool());
        assert!(!DocValue::Integer(0).to_bool());
        assert!(!DocValue::Null.to_bool());
        assert!(DocValue::from("").to_bool());
    }

    #[test]
    fn float_views() {
        assert_eq!(DocValue::Float(2.5).to_int(), 3);
        assert_eq!(DocValue::Float(-2.4).to_int(), -2);
        assert_eq!(DocValue::Float(f64::NAN).to_int(), 0);
        assert_eq!(DocValue::Float(1e300).to_int(), i64::MAX);
        assert_eq!(DocValue::Integer(7).to_double(), 7.0);
        assert_eq!(DocValue::Bool(true).to_double(), 1.0);
        assert_eq!(DocValue::from("1.5").to_double(), 0.0);
        assert!(DocValue::Float(0.5).to_bool());
        assert!(!DocValue::Float(0.0).to_bool());
        assert!(DocValue::Float(0.5).is_number());
        assert_ne!(DocValue::Float(1.0), DocValue::Integer(1));
    }

    #[test]
    fn floats_encode_in_narrowest_width() {
        let mut encoder = CanonicalEncoder::new();
        DocValue::from(1.5).encode_into(&mut encoder).unwrap();
        assert_eq!(encoder.into_bytes(), vec![0xf9, 0x3e, 0x00]);
    }

    #[test]
    fn from_value_builds_mutable_collections() {
        let value = Value::text_map([
            ("list", Value::Array(vec![Value::Integer(1), Value::from("two")])),
            ("blob", Value::Bytes(vec![7])),
            ("ratio", Value::Float(0.25)),
        ]);
        let doc_value = DocValue::from_value(value.clone()).unwrap();
        let dict = doc_value.as_dictionary().unwrap();
        assert!(dict.is_mutable());
        assert!(dict.get_array("list").unwrap().unwrap().is_mutable());
        assert_eq!(doc_value.to_value().unwrap(), value);
    }

    #[test]
    fn from_value_rejects_non_text_keys() {
        let value = Value::Map(vec![(Value::Integer(1), Value::Null)]);
        let err = DocValue::from_value(value).unwrap_err();
        assert!(err.is_data_format());
    }

    #[test]
    fn equality_is_by_content() {
        let a = DocValue::from_value(Value::Array(vec![Value::Integer(1)])).unwrap();
        let b = DocValue::from_value(Value::Array(vec![Value::Integer(1)])).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, DocValue::Integer(1));
        assert_eq!(DocValue::from(None::<i64>), DocValue::Null);
    }
}
