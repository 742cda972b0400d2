//! Canonical CBOR encoder.

use crate::error::CodecResult;
use crate::raw::RawValue;
use crate::value::{cmp_encoded_keys, Value};

/// Encode a value to canonical CBOR bytes.
///
/// Output follows RFC 8949 Section 4.2.1: map keys sorted by their
/// encoded form (length-first, then bytewise), shortest integer and
/// float encodings, no indefinite lengths.
///
/// # Errors
///
/// Returns an error if the value cannot be encoded.
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// A canonical CBOR encoder.
///
/// Besides whole values, the encoder accepts streamed container headers
/// and raw items spliced verbatim from an existing canonical buffer. The
/// caller is responsible for emitting map keys in canonical order when it
/// streams a map.
pub struct CanonicalEncoder {
    buffer: Vec<u8>,
}

impl CanonicalEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode a value.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => self.encode_null(),
            Value::Bool(b) => self.encode_bool(*b),
            Value::Integer(n) => self.encode_integer(*n),
            Value::Float(f) => self.encode_float(*f),
            Value::Bytes(b) => self.encode_bytes(b),
            Value::Text(s) => self.encode_text(s),
            Value::Array(arr) => return self.encode_array(arr),
            Value::Map(pairs) => return self.encode_map(pairs),
        }
        Ok(())
    }

    /// Copy an already-encoded item into the output unchanged.
    pub fn encode_raw(&mut self, raw: &RawValue) {
        self.buffer.extend_from_slice(raw.as_bytes());
    }

    /// Start an array of `len` items; the items follow as separate calls.
    pub fn begin_array(&mut self, len: usize) {
        self.encode_unsigned(4, len as u64);
    }

    /// Start a map of `len` entries; keys and values follow alternately.
    pub fn begin_map(&mut self, len: usize) {
        self.encode_unsigned(5, len as u64);
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Encode a null.
    pub fn encode_null(&mut self) {
        self.buffer.push(0xf6);
    }

    /// Encode a boolean.
    pub fn encode_bool(&mut self, b: bool) {
        self.buffer.push(if b { 0xf5 } else { 0xf4 });
    }

    /// Encode a signed integer in its shortest form.
    #[allow(clippy::cast_sign_loss)]
    pub fn encode_integer(&mut self, n: i64) {
        if n >= 0 {
            self.encode_unsigned(0, n as u64);
        } else {
            // -1 encodes as 0, -2 as 1, ...
            self.encode_unsigned(1, (-(n + 1)) as u64);
        }
    }

    /// Encode a float in the narrowest width that holds it exactly.
    ///
    /// NaN is always written as the half-precision quiet NaN.
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode_float(&mut self, f: f64) {
        if f.is_nan() {
            self.buffer.extend_from_slice(&[0xf9, 0x7e, 0x00]);
            return;
        }
        match float_width(f) {
            2 => {
                self.buffer.push(0xf9);
                self.buffer.extend_from_slice(&half_bits(f as f32).unwrap_or(0x7e00).to_be_bytes());
            }
            4 => {
                self.buffer.push(0xfa);
                self.buffer.extend_from_slice(&(f as f32).to_be_bytes());
            }
            _ => {
                self.buffer.push(0xfb);
                self.buffer.extend_from_slice(&f.to_be_bytes());
            }
        }
    }

    /// Encode a byte string.
    pub fn encode_bytes(&mut self, bytes: &[u8]) {
        self.encode_unsigned(2, bytes.len() as u64);
        self.buffer.extend_from_slice(bytes);
    }

    /// Encode a text string.
    pub fn encode_text(&mut self, text: &str) {
        self.encode_unsigned(3, text.len() as u64);
        self.buffer.extend_from_slice(text.as_bytes());
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_unsigned(&mut self, major_type: u8, value: u64) {
        let mt = major_type << 5;

        if value < 24 {
            self.buffer.push(mt | (value as u8));
        } else if u8::try_from(value).is_ok() {
            self.buffer.push(mt | 24);
            self.buffer.push(value as u8);
        } else if u16::try_from(value).is_ok() {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
        } else if u32::try_from(value).is_ok() {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn encode_array(&mut self, arr: &[Value]) -> CodecResult<()> {
        self.begin_array(arr.len());
        for item in arr {
            self.encode(item)?;
        }
        Ok(())
    }

    fn encode_map(&mut self, pairs: &[(Value, Value)]) -> CodecResult<()> {
        let mut encoded_pairs = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let mut key_encoder = CanonicalEncoder::new();
            key_encoder.encode(key)?;
            encoded_pairs.push((key_encoder.into_bytes(), value));
        }
        encoded_pairs.sort_by(|a, b| cmp_encoded_keys(&a.0, &b.0));

        self.begin_map(pairs.len());
        for (encoded_key, value) in encoded_pairs {
            self.buffer.extend_from_slice(&encoded_key);
            self.encode(value)?;
        }
        Ok(())
    }
}

/// Number of payload bytes the canonical encoding of `f` uses.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn float_width(f: f64) -> usize {
    if f.is_nan() {
        return 2;
    }
    let single = f as f32;
    if f64::from(single).to_bits() != f.to_bits() {
        8
    } else if half_bits(single).is_some() {
        2
    } else {
        4
    }
}

/// The half-precision pattern for `f`, if it converts without loss.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn half_bits(f: f32) -> Option<u16> {
    let bits = f.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exponent = ((bits >> 23) & 0xff) as i32;
    let mantissa = bits & 0x7f_ffff;

    if exponent == 0xff {
        // infinities only; NaN is handled by the caller
        return (mantissa == 0).then_some(sign | 0x7c00);
    }
    if exponent == 0 {
        // single subnormals are far below the half range
        return (mantissa == 0).then_some(sign);
    }
    let unbiased = exponent - 127;
    match unbiased {
        -14..=15 if mantissa & 0x1fff == 0 => {
            Some(sign | (((unbiased + 15) as u16) << 10) | (mantissa >> 13) as u16)
        }
        -24..=-15 => {
            let full = mantissa | 0x80_0000;
            let shift = (-(unbiased + 1)) as u32;
            (full & ((1 << shift) - 1) == 0).then(|| sign | (full >> shift) as u16)
        }
        _ => None,
    }
}

impl Default for CanonicalEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_scalars() {
        assert_eq!(to_canonical_cbor(&Value::Null).unwrap(), vec![0xf6]);
        assert_eq!(to_canonical_cbor(&Value::Bool(false)).unwrap(), vec![0xf4]);
        assert_eq!(to_canonical_cbor(&Value::Bool(true)).unwrap(), vec![0xf5]);
    }

    #[test]
    fn encode_integers_shortest_form() {
        assert_eq!(to_canonical_cbor(&Value::Integer(23)).unwrap(), vec![0x17]);
        assert_eq!(to_canonical_cbor(&Value::Integer(24)).unwrap(), vec![0x18, 24]);
        assert_eq!(
            to_canonical_cbor(&Value::Integer(256)).unwrap(),
            vec![0x19, 0x01, 0x00]
        );
        assert_eq!(
            to_canonical_cbor(&Value::Integer(65536)).unwrap(),
            vec![0x1a, 0x00, 0x01, 0x00, 0x00]
        );
        assert_eq!(to_canonical_cbor(&Value::Integer(-1)).unwrap(), vec![0x20]);
        assert_eq!(to_canonical_cbor(&Value::Integer(-100)).unwrap(), vec![0x38, 99]);
        assert_eq!(
            to_canonical_cbor(&Value::Integer(i64::MIN)).unwrap(),
            vec![0x3b, 0x7f, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn encode_floats_in_narrowest_width() {
        assert_eq!(to_canonical_cbor(&Value::Float(1.5)).unwrap(), vec![0xf9, 0x3e, 0x00]);
        assert_eq!(to_canonical_cbor(&Value::Float(0.0)).unwrap(), vec![0xf9, 0x00, 0x00]);
        assert_eq!(to_canonical_cbor(&Value::Float(-0.0)).unwrap(), vec![0xf9, 0x80, 0x00]);
        assert_eq!(to_canonical_cbor(&Value::Float(65504.0)).unwrap(), vec![0xf9, 0x7b, 0xff]);
        assert_eq!(
            to_canonical_cbor(&Value::Float(2f64.powi(-24))).unwrap(),
            vec![0xf9, 0x00, 0x01]
        );
        assert_eq!(
            to_canonical_cbor(&Value::Float(f64::INFINITY)).unwrap(),
            vec![0xf9, 0x7c, 0x00]
        );
        assert_eq!(to_canonical_cbor(&Value::Float(f64::NAN)).unwrap(), vec![0xf9, 0x7e, 0x00]);
        assert_eq!(
            to_canonical_cbor(&Value::Float(100_000.0)).unwrap(),
            vec![0xfa, 0x47, 0xc3, 0x50, 0x00]
        );
        assert_eq!(
            to_canonical_cbor(&Value::Float(0.1)).unwrap(),
            vec![0xfb, 0x3f, 0xb9, 0x99, 0x99, 0x99, 0x99, 0x99, 0x9a]
        );
    }

    #[test]
    fn encode_text_and_bytes() {
        assert_eq!(to_canonical_cbor(&Value::Text(String::new())).unwrap(), vec![0x60]);
        assert_eq!(
            to_canonical_cbor(&Value::from("hello")).unwrap(),
            vec![0x65, b'h', b'e', b'l', b'l', b'o']
        );
        assert_eq!(
            to_canonical_cbor(&Value::Bytes(vec![1, 2, 3])).unwrap(),
            vec![0x43, 1, 2, 3]
        );
    }

    #[test]
    fn encode_map_sorted() {
        let map = Value::Map(vec![
            (Value::from("bb"), Value::Integer(2)),
            (Value::from("a"), Value::Integer(1)),
        ]);
        let bytes = to_canonical_cbor(&map).unwrap();
        assert_eq!(bytes, vec![0xa2, 0x61, b'a', 0x01, 0x62, b'b', b'b', 0x02]);
    }

    #[test]
    fn streamed_array_with_spliced_item() {
        let raw = RawValue::new(to_canonical_cbor(&Value::from("kept")).unwrap()).unwrap();

        let mut encoder = CanonicalEncoder::new();
        encoder.begin_array(2);
        encoder.encode_integer(7);
        encoder.encode_raw(&raw);

        let expected =
            to_canonical_cbor(&Value::Array(vec![Value::Integer(7), Value::from("kept")])).unwrap();
        assert_eq!(encoder.into_bytes(), expected);
    }

    #[test]
    fn interoperates_with_ciborium() {
        let value = Value::text_map([
            ("list", Value::Array(vec![Value::Integer(1), Value::Integer(-2)])),
            ("blob", Value::Bytes(vec![9, 8])),
            ("ok", Value::Bool(true)),
            ("pi", Value::Float(3.25)),
        ]);
        let bytes = to_canonical_cbor(&value).unwrap();

        let decoded: ciborium::Value = ciborium::de::from_reader(bytes.as_slice()).unwrap();
        let map = decoded.as_map().unwrap();
        assert_eq!(map.len(), 4);
        assert_eq!(map[0].0.as_text(), Some("ok"));
        assert_eq!(map[1].0.as_text(), Some("pi"));
        assert_eq!(map[1].1.as_float(), Some(3.25));
        assert_eq!(map[2].0.as_text(), Some("blob"));
        assert_eq!(map[3].0.as_text(), Some("list"));
    }
}
