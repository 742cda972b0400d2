//! Lazy views over encoded items.
//!
//! A [`RawValue`] is a zero-copy window onto exactly one encoded item
//! inside a reference-counted buffer. [`RawValue::classify`] reads just
//! enough of the item to say what it is: scalars are decoded, while
//! arrays and maps are split into raw element windows whose own contents
//! stay encoded until someone asks for them.

use crate::decoder::CanonicalDecoder;
use crate::encoder::CanonicalEncoder;
use crate::error::{CodecError, CodecResult};
use crate::value::{cmp_encoded_keys, cmp_text_keys, Value};
use bytes::Bytes;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// One encoded item inside an immutable buffer.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RawValue {
    bytes: Bytes,
}

/// The kind of an encoded item along with its shallow payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// Null (or undefined).
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Floating-point number.
    Float(f64),
    /// Byte string, sharing the underlying buffer.
    Bytes(Bytes),
    /// Text string.
    Text(String),
    /// Array whose elements are still encoded.
    Array(RawArray),
    /// Map whose values are still encoded.
    Map(RawMap),
}

/// An encoded array split into element windows.
#[derive(Clone, PartialEq)]
pub struct RawArray {
    raw: RawValue,
    items: Arc<[RawValue]>,
}

/// An encoded map split into decoded keys and encoded values.
///
/// Entries keep the canonical order they were stored in.
#[derive(Clone, PartialEq)]
pub struct RawMap {
    raw: RawValue,
    entries: Arc<[RawEntry]>,
}

#[derive(Clone, PartialEq)]
struct RawEntry {
    key: Value,
    key_raw: RawValue,
    value: RawValue,
}

impl RawValue {
    /// Wraps a buffer holding exactly one encoded item.
    ///
    /// Only the framing is checked; nested text and key order are
    /// validated when the item is classified or decoded.
    ///
    /// # Errors
    ///
    /// Returns an error if the framing is broken or bytes are left over.
    pub fn new(bytes: impl Into<Bytes>) -> CodecResult<Self> {
        let bytes = bytes.into();
        let mut decoder = CanonicalDecoder::new(&bytes);
        decoder.skip()?;
        decoder.finish()?;
        Ok(Self { bytes })
    }

    /// The encoded bytes of this item.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// A shared handle to the encoded bytes.
    pub fn to_bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; an item is at least one byte.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Fully decodes the item.
    pub fn to_value(&self) -> CodecResult<Value> {
        crate::from_cbor(&self.bytes)
    }

    /// Reads the item's kind and shallow payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the item is structurally invalid at this
    /// level (bad UTF-8, unsorted or duplicate map keys, truncation).
    pub fn classify(&self) -> CodecResult<Classified> {
        let mut decoder = CanonicalDecoder::new(&self.bytes);
        let (mut major_type, mut additional_info) = decoder.read_header()?;
        while major_type == 6 {
            decoder.decode_unsigned(additional_info)?;
            (major_type, additional_info) = decoder.read_header()?;
        }

        match major_type {
            2 => {
                let len = decoder.decode_length(additional_info)?;
                let start = decoder.position();
                decoder.read_bytes(len)?;
                Ok(Classified::Bytes(self.bytes.slice(start..start + len)))
            }
            4 => {
                let len = decoder.decode_container_len(additional_info)?;
                let mut items = Vec::new();
                for _ in 0..len {
                    items.push(self.next_item(&mut decoder)?);
                }
                Ok(Classified::Array(RawArray {
                    raw: self.clone(),
                    items: items.into(),
                }))
            }
            5 => {
                let len = decoder.decode_container_len(additional_info)?;
                let mut entries = Vec::new();
                let mut prev_key: Option<RawValue> = None;
                for _ in 0..len {
                    let key_raw = self.next_item(&mut decoder)?;
                    if let Some(prev) = &prev_key {
                        if cmp_encoded_keys(prev.as_bytes(), key_raw.as_bytes()) != Ordering::Less {
                            return Err(CodecError::invalid_structure(
                                "non-canonical: map keys not in sorted order",
                            ));
                        }
                    }
                    let key = key_raw.to_value()?;
                    let value = self.next_item(&mut decoder)?;
                    entries.push(RawEntry {
                        key,
                        key_raw: key_raw.clone(),
                        value,
                    });
                    prev_key = Some(key_raw);
                }
                Ok(Classified::Map(RawMap {
                    raw: self.clone(),
                    entries: entries.into(),
                }))
            }
            _ => Ok(match self.to_value()? {
                Value::Null => Classified::Null,
                Value::Bool(b) => Classified::Bool(b),
                Value::Integer(n) => Classified::Integer(n),
                Value::Float(f) => Classified::Float(f),
                Value::Text(s) => Classified::Text(s),
                other => {
                    return Err(CodecError::invalid_structure(format!(
                        "scalar header decoded as {other:?}"
                    )))
                }
            }),
        }
    }

    fn next_item(&self, decoder: &mut CanonicalDecoder<'_>) -> CodecResult<RawValue> {
        let start = decoder.position();
        decoder.skip()?;
        Ok(RawValue {
            bytes: self.bytes.slice(start..decoder.position()),
        })
    }
}

impl fmt::Debug for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawValue({} bytes)", self.bytes.len())
    }
}

impl RawArray {
    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The still-encoded element at `index`.
    pub fn get(&self, index: usize) -> Option<&RawValue> {
        self.items.get(index)
    }

    /// Elements in stored order.
    pub fn iter(&self) -> impl Iterator<Item = &RawValue> {
        self.items.iter()
    }

    /// The whole encoded array.
    pub fn as_raw(&self) -> &RawValue {
        &self.raw
    }
}

impl fmt::Debug for RawArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawArray").field("len", &self.items.len()).finish()
    }
}

impl RawMap {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up the still-encoded value stored under a text key.
    ///
    /// Entries are in canonical order, so this is a binary search. Text
    /// keys compare without encoding the probe; the rare non-text key is
    /// compared by its stored encoding.
    pub fn get(&self, key: &str) -> Option<&RawValue> {
        let mut probe: Option<Vec<u8>> = None;
        self.entries
            .binary_search_by(|entry| match &entry.key {
                Value::Text(text) => cmp_text_keys(text, key),
                _ => {
                    let probe = probe.get_or_insert_with(|| {
                        let mut encoder = CanonicalEncoder::new();
                        encoder.encode_text(key);
                        encoder.into_bytes()
                    });
                    cmp_encoded_keys(entry.key_raw.as_bytes(), probe)
                }
            })
            .ok()
            .map(|index| &self.entries[index].value)
    }

    /// Entries in stored (canonical) order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value, &RawValue)> {
        self.entries.iter().map(|entry| (&entry.key, &entry.value))
    }

    /// The whole encoded map.
    pub fn as_raw(&self) -> &RawValue {
        &self.raw
    }
}

impl fmt::Debug for RawMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawMap").field("len", &self.entries.len()).finish()
    }
}
