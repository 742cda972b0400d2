//! Lazy slots: one array element or dictionary entry of an overlay.

use crate::context::RootContext;
use crate::error::CoreResult;
use crate::value::DocValue;
use foliodb_codec::{CanonicalEncoder, RawValue};
use std::sync::Arc;

/// A single position in an overlay.
///
/// A slot starts out pointing at encoded bytes and is decoded the first
/// time it is read. Later reads return the cached value, so a nested
/// collection handed out twice is the same handle both times.
#[derive(Debug, Clone)]
pub(crate) enum Slot {
    /// No value. In a dictionary's override table this hides the stored
    /// entry of the same key.
    Empty,
    /// Stored bytes not yet decoded.
    Unresolved(RawValue),
    /// Decoded (or freshly written) value. `origin` is the stored
    /// encoding the value was decoded from; writes have none.
    Resolved {
        value: DocValue,
        origin: Option<RawValue>,
    },
}

impl Slot {
    /// A slot holding a newly written value.
    pub(crate) fn written(value: DocValue) -> Self {
        Slot::Resolved {
            value,
            origin: None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    /// Decodes the slot if needed and returns its value.
    ///
    /// In a mutable overlay a read-only nested collection is swapped for a
    /// mutable copy before it is returned, so callers of a mutable parent
    /// always see mutable children. A decode failure leaves the slot
    /// unresolved.
    pub(crate) fn resolve(&mut self, context: &Arc<RootContext>, mutable: bool) -> CoreResult<DocValue> {
        match self {
            Slot::Empty => Ok(DocValue::Null),
            Slot::Unresolved(raw) => {
                let raw = raw.clone();
                let value = DocValue::from_raw(&raw, context, mutable)?;
                *self = Slot::Resolved {
                    value: value.clone(),
                    origin: Some(raw),
                };
                Ok(value)
            }
            Slot::Resolved { value, .. } => {
                if mutable && value.is_read_only_collection() {
                    *value = value.mutable_copy(context);
                }
                Ok(value.clone())
            }
        }
    }

    /// True if encoding this slot cannot reuse its stored bytes.
    pub(crate) fn is_changed(&self) -> bool {
        match self {
            Slot::Empty | Slot::Unresolved(_) => false,
            Slot::Resolved { origin: None, .. } => true,
            Slot::Resolved { value, .. } => value.is_changed(),
        }
    }

    /// Copies the slot into an overlay owned by `context`.
    ///
    /// Stored bytes and read-only children are shared. Mutable children
    /// are copied so the two overlays never write through to each other.
    pub(crate) fn copy_for(&self, context: &Arc<RootContext>) -> Slot {
        match self {
            Slot::Resolved { value, origin } if value.is_mutable_collection() => Slot::Resolved {
                value: value.mutable_copy(context),
                origin: origin.clone(),
            },
            other => other.clone(),
        }
    }

    pub(crate) fn encode(&self, encoder: &mut CanonicalEncoder) -> CoreResult<()> {
        match self {
            Slot::Empty => encoder.encode_null(),
            Slot::Unresolved(raw) => encoder.encode_raw(raw),
            Slot::Resolved {
                value,
                origin: Some(raw),
            } if !value.is_changed() => encoder.encode_raw(raw),
            Slot::Resolved { value, .. } => value.encode_into(encoder)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foliodb_codec::{to_canonical_cbor, Value};

    fn raw(value: &Value) -> RawValue {
        RawValue::new(to_canonical_cbor(value).unwrap()).unwrap()
    }

    #[test]
    fn resolves_once_and_caches() {
        let ctx = RootContext::detached();
        let mut slot = Slot::Unresolved(raw(&Value::Array(vec![Value::Integer(1)])));
        let first = slot.resolve(&ctx, false).unwrap();
        let second = slot.resolve(&ctx, false).unwrap();
        assert!(first.as_array().unwrap().ptr_eq(second.as_array().unwrap()));
        assert!(!slot.is_changed());
    }

    #[test]
    fn corrupt_bytes_stay_unresolved() {
        let ctx = RootContext::detached();
        // text header claiming two bytes of invalid UTF-8
        let bad = RawValue::new(vec![0x62, 0xff, 0xfe]).unwrap();
        let mut slot = Slot::Unresolved(bad);
        assert!(slot.resolve(&ctx, false).is_err());
        assert!(matches!(slot, Slot::Unresolved(_)));
    }

    #[test]
    fn written_slots_are_changed() {
        assert!(Slot::written(DocValue::Integer(3)).is_changed());
        assert!(!Slot::Empty.is_changed());
        assert_eq!(
            Slot::Empty.resolve(&RootContext::detached(), true).unwrap(),
            DocValue::Null
        );
    }

    #[test]
    fn mutable_owner_copies_read_only_child() {
        let ctx = RootContext::detached();
        let mut slot = Slot::Unresolved(raw(&Value::Array(vec![Value::Integer(1)])));
        let read_only = slot.resolve(&ctx, false).unwrap();
        assert!(!read_only.as_array().unwrap().is_mutable());

        let mutable = slot.resolve(&ctx, true).unwrap();
        assert!(mutable.as_array().unwrap().is_mutable());
        assert!(!mutable.as_array().unwrap().ptr_eq(read_only.as_array().unwrap()));
        assert!(!slot.is_changed());
    }
}
