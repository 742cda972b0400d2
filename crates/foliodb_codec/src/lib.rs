//! # FolioDB Codec
//!
//! Canonical CBOR encoding/decoding for FolioDB document bodies.
//!
//! Document bodies are stored as canonical CBOR: identical content always
//! produces identical bytes, which keeps revision digests stable and lets
//! unchanged regions of a body be copied verbatim into a new revision.
//!
//! ## Canonical CBOR Rules
//!
//! - Maps are sorted by key (length-first, then bytewise on the encoding)
//! - Integers and floats use their shortest exact encoding
//! - Strings must be UTF-8
//! - No indefinite-length items
//!
//! ## Lazy access
//!
//! [`RawValue`] wraps one encoded item and classifies it on demand, so a
//! reader can walk into a large body without decoding the parts it never
//! touches. [`CanonicalEncoder::encode_raw`] splices such items back out.
//!
//! ```
//! use foliodb_codec::{to_canonical_cbor, Classified, RawValue, Value};
//!
//! let body = to_canonical_cbor(&Value::text_map([("n", Value::Integer(42))])).unwrap();
//! let raw = RawValue::new(body).unwrap();
//! let Classified::Map(map) = raw.classify().unwrap() else { unreachable!() };
//! assert_eq!(map.get("n").unwrap().to_value().unwrap(), Value::Integer(42));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod raw;
mod value;

pub use decoder::{from_cbor, CanonicalDecoder};
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use raw::{Classified, RawArray, RawMap, RawValue};
pub use value::{cmp_text_keys, Value};

/// Trait for types that can be encoded to canonical CBOR.
pub trait Encode {
    /// Encode this value to canonical CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from CBOR.
pub trait Decode: Sized {
    /// Decode this value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Value {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_canonical_cbor(self)
    }
}

impl Decode for Value {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}
