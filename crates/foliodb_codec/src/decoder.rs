//! Canonical CBOR decoder.

use crate::encoder::float_width;
use crate::error::{CodecError, CodecResult};
use crate::value::{cmp_encoded_keys, Value};
use std::cmp::Ordering;

/// Decode a value from CBOR bytes.
///
/// The input must hold exactly one item.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR, contain forbidden
/// constructs (indefinite-length, non-shortest floats), or carry trailing
/// bytes.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = CanonicalDecoder::new(bytes);
    let value = decoder.decode()?;
    decoder.finish()?;
    Ok(value)
}

/// Maximum allowed element count for arrays and maps.
const MAX_CONTAINER_ELEMENTS: u64 = 16 * 1024 * 1024;

/// Maximum allowed byte/string length.
const MAX_BYTES_LENGTH: u64 = 256 * 1024 * 1024;

/// A canonical CBOR decoder.
///
/// This decoder validates that input follows canonical CBOR rules
/// and rejects forbidden constructs. Besides full decoding it can skip
/// over items without materializing them, which is what lazy views use
/// to find element boundaries.
pub struct CanonicalDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> CanonicalDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Decode the next value.
    #[allow(clippy::cast_possible_wrap)]
    pub fn decode(&mut self) -> CodecResult<Value> {
        let (major_type, additional_info) = self.read_header()?;

        match major_type {
            0 => {
                let n = self.decode_unsigned(additional_info)?;
                i64::try_from(n)
                    .map(Value::Integer)
                    .map_err(|_| CodecError::unsupported_type("unsigned integer above i64::MAX"))
            }
            1 => {
                let n = self.decode_unsigned(additional_info)?;
                // Negative integer: value is -(n+1)
                i64::try_from(n)
                    .map(|n| Value::Integer(-n - 1))
                    .map_err(|_| CodecError::unsupported_type("negative integer below i64::MIN"))
            }
            2 => {
                let len = self.decode_length(additional_info)?;
                Ok(Value::Bytes(self.read_bytes(len)?.to_vec()))
            }
            3 => {
                let len = self.decode_length(additional_info)?;
                let bytes = self.read_bytes(len)?;
                let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
                Ok(Value::Text(text.to_string()))
            }
            4 => self.decode_array(additional_info),
            5 => self.decode_map(additional_info),
            6 => {
                // Tagged value - skip the tag and decode the value
                let _tag = self.decode_unsigned(additional_info)?;
                self.decode()
            }
            _ => self.decode_simple(additional_info),
        }
    }

    /// Skip over the next item without building a [`Value`].
    ///
    /// Only framing is validated here: lengths, reserved encodings and
    /// forbidden simple values. UTF-8 and map key order are checked when
    /// the item is actually decoded.
    pub fn skip(&mut self) -> CodecResult<()> {
        let mut pending: u64 = 1;
        while pending > 0 {
            pending -= 1;
            let (major_type, additional_info) = self.read_header()?;
            let nested = match major_type {
                0 | 1 => {
                    self.decode_unsigned(additional_info)?;
                    0
                }
                2 | 3 => {
                    let len = self.decode_length(additional_info)?;
                    self.read_bytes(len)?;
                    0
                }
                4 => self.decode_container_len(additional_info)?,
                5 => self.decode_container_len(additional_info)? * 2,
                6 => {
                    self.decode_unsigned(additional_info)?;
                    1
                }
                _ => {
                    self.decode_simple(additional_info)?;
                    0
                }
            };
            pending = pending
                .checked_add(nested)
                .ok_or_else(|| CodecError::invalid_structure("item count overflow"))?;
        }
        Ok(())
    }

    /// Fails unless every byte has been consumed.
    pub fn finish(&self) -> CodecResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes {
                remaining: self.data.len() - self.pos,
            })
        }
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    /// Current read offset into the input.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Reads an initial byte, split into major type and additional info.
    pub(crate) fn read_header(&mut self) -> CodecResult<(u8, u8)> {
        let initial_byte = self.read_byte()?;
        Ok((initial_byte >> 5, initial_byte & 0x1f))
    }

    /// Reads the element count of an array or map header.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn decode_container_len(&mut self, additional_info: u8) -> CodecResult<u64> {
        let len = self.decode_unsigned(additional_info)?;
        if len > MAX_CONTAINER_ELEMENTS {
            return Err(CodecError::SizeLimitExceeded {
                claimed: len,
                max_allowed: MAX_CONTAINER_ELEMENTS,
            });
        }
        Ok(len)
    }

    /// Reads a byte/text string length header.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn decode_length(&mut self, additional_info: u8) -> CodecResult<usize> {
        let len = self.decode_unsigned(additional_info)?;
        if len > MAX_BYTES_LENGTH {
            return Err(CodecError::SizeLimitExceeded {
                claimed: len,
                max_allowed: MAX_BYTES_LENGTH,
            });
        }
        Ok(len as usize)
    }

    #[inline]
    fn read_byte(&mut self) -> CodecResult<u8> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    #[inline]
    pub(crate) fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(CodecError::UnexpectedEof)?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    #[inline]
    pub(crate) fn decode_unsigned(&mut self, additional_info: u8) -> CodecResult<u64> {
        const NON_CANONICAL: &str = "non-canonical: value could be encoded in fewer bytes";
        match additional_info {
            0..=23 => Ok(u64::from(additional_info)),
            24 => {
                let byte = self.read_byte()?;
                if byte < 24 {
                    return Err(CodecError::invalid_structure(NON_CANONICAL));
                }
                Ok(u64::from(byte))
            }
            25 => {
                let bytes = self.read_bytes(2)?;
                let value = u16::from_be_bytes([bytes[0], bytes[1]]);
                if u8::try_from(value).is_ok() {
                    return Err(CodecError::invalid_structure(NON_CANONICAL));
                }
                Ok(u64::from(value))
            }
            26 => {
                let bytes = self.read_bytes(4)?;
                let value = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                if u16::try_from(value).is_ok() {
                    return Err(CodecError::invalid_structure(NON_CANONICAL));
                }
                Ok(u64::from(value))
            }
            27 => {
                let bytes = self.read_bytes(8)?;
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                let value = u64::from_be_bytes(buf);
                if u32::try_from(value).is_ok() {
                    return Err(CodecError::invalid_structure(NON_CANONICAL));
                }
                Ok(value)
            }
            31 => Err(CodecError::IndefiniteLengthForbidden),
            _ => Err(CodecError::invalid_structure("reserved additional info")),
        }
    }

    fn decode_array(&mut self, additional_info: u8) -> CodecResult<Value> {
        let len = self.decode_container_len(additional_info)?;
        let mut items = Vec::new();
        for _ in 0..len {
            items.push(self.decode()?);
        }
        Ok(Value::Array(items))
    }

    fn decode_map(&mut self, additional_info: u8) -> CodecResult<Value> {
        let len = self.decode_container_len(additional_info)?;
        let mut pairs = Vec::new();
        let mut prev_key: Option<&'a [u8]> = None;

        for _ in 0..len {
            let key_start = self.pos;
            let key = self.decode()?;
            let key_bytes = &self.data[key_start..self.pos];

            // Keys must be strictly increasing
            if let Some(prev) = prev_key {
                if cmp_encoded_keys(prev, key_bytes) != Ordering::Less {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: map keys not in sorted order",
                    ));
                }
            }
            prev_key = Some(key_bytes);

            let value = self.decode()?;
            pairs.push((key, value));
        }

        Ok(Value::Map(pairs))
    }

    pub(crate) fn decode_simple(&mut self, additional_info: u8) -> CodecResult<Value> {
        match additional_info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            // undefined is read as null
            22 | 23 => Ok(Value::Null),
            24 => {
                let simple = self.read_byte()?;
                if simple < 32 {
                    Err(CodecError::invalid_structure(
                        "non-canonical: simple value should use direct encoding",
                    ))
                } else {
                    Err(CodecError::unsupported_type(format!("simple value {simple}")))
                }
            }
            25..=27 => self.decode_float(additional_info),
            28..=30 => Err(CodecError::invalid_structure("reserved additional info")),
            31 => Err(CodecError::invalid_structure("break without indefinite")),
            _ => Err(CodecError::unsupported_type(format!(
                "simple value {additional_info}"
            ))),
        }
    }

    /// Reads a half, single or double float and checks that no narrower
    /// width could have held it.
    fn decode_float(&mut self, additional_info: u8) -> CodecResult<Value> {
        const NON_CANONICAL: &str = "non-canonical: float could be encoded in fewer bytes";
        let (value, width) = match additional_info {
            25 => {
                let bytes = self.read_bytes(2)?;
                let bits = u16::from_be_bytes([bytes[0], bytes[1]]);
                let value = half_to_f64(bits);
                // NaN has exactly one accepted spelling
                if value.is_nan() && bits != 0x7e00 {
                    return Err(CodecError::invalid_structure(NON_CANONICAL));
                }
                (value, 2)
            }
            26 => {
                let bytes = self.read_bytes(4)?;
                let single = f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                (f64::from(single), 4)
            }
            _ => {
                let bytes = self.read_bytes(8)?;
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                (f64::from_be_bytes(buf), 8)
            }
        };
        if float_width(value) != width {
            return Err(CodecError::invalid_structure(NON_CANONICAL));
        }
        Ok(Value::Float(value))
    }
}

/// Widens an IEEE 754 half-precision bit pattern.
fn half_to_f64(bits: u16) -> f64 {
    let exponent = i32::from((bits >> 10) & 0x1f);
    let mantissa = f64::from(bits & 0x3ff);
    let magnitude = match exponent {
        0 => mantissa * 2f64.powi(-24),
        31 if mantissa == 0.0 => f64::INFINITY,
        31 => f64::NAN,
        _ => (mantissa + 1024.0) * 2f64.powi(exponent - 25),
    };
    if bits & 0x8000 == 0 {
        magnitude
    } else {
        -magnitude
    }
}
