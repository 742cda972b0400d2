//! Array overlay.

use crate::blob::Blob;
use crate::collection::Dictionary;
use crate::context::RootContext;
use crate::error::{CoreError, CoreResult};
use crate::slot::Slot;
use crate::value::DocValue;
use foliodb_codec::{CanonicalEncoder, RawArray, Value};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

struct ArrayOverlay {
    context: Arc<RootContext>,
    mutable: bool,
    state: Mutex<ArrayState>,
}

struct ArrayState {
    /// Stored encoding this overlay was read from.
    base: Option<RawArray>,
    /// One slot per current element, in order.
    ///
    /// Dense rather than a sparse map of overrides over `base`: removal
    /// shifts the later slots instead of leaving a tombstone, so index
    /// lookup stays a plain `Vec` access. The stored bytes are never
    /// touched; slots that were not written still hold their stored
    /// window and are spliced back verbatim on encode.
    slots: Vec<Slot>,
    /// Set once the element sequence differs from `base`.
    dirty: bool,
}

impl ArrayState {
    fn out_of_range(&self, index: usize) -> CoreError {
        CoreError::IndexOutOfRange {
            index,
            count: self.slots.len(),
        }
    }
}

/// An ordered collection of [`DocValue`]s.
///
/// Cloning an `Array` clones the handle; both clones see the same
/// elements. Use [`Array::to_mutable`] for an independent copy.
#[derive(Clone)]
pub struct Array {
    overlay: Arc<ArrayOverlay>,
}

impl Array {
    /// Creates an empty mutable array that belongs to no database.
    pub fn new() -> Self {
        Self::with_slots(RootContext::detached(), true, None, Vec::new(), false)
    }

    /// Creates a mutable array holding `values`.
    pub fn from_values<V: Into<DocValue>>(values: impl IntoIterator<Item = V>) -> Self {
        let context = RootContext::detached();
        let slots = values
            .into_iter()
            .map(|v| Slot::written(v.into().adopt(&context)))
            .collect();
        Self::with_slots(context, true, None, slots, true)
    }

    /// Wraps a stored array without decoding any element.
    pub(crate) fn from_raw(raw: RawArray, context: Arc<RootContext>, mutable: bool) -> Self {
        let slots = raw.iter().cloned().map(Slot::Unresolved).collect();
        Self::with_slots(context, mutable, Some(raw), slots, false)
    }

    fn with_slots(
        context: Arc<RootContext>,
        mutable: bool,
        base: Option<RawArray>,
        slots: Vec<Slot>,
        dirty: bool,
    ) -> Self {
        Self {
            overlay: Arc::new(ArrayOverlay {
                context,
                mutable,
                state: Mutex::new(ArrayState { base, slots, dirty }),
            }),
        }
    }

    /// The context this array belongs to.
    pub fn context(&self) -> &Arc<RootContext> {
        &self.overlay.context
    }

    /// True if this array accepts writes.
    pub fn is_mutable(&self) -> bool {
        self.overlay.mutable
    }

    /// True if both handles refer to the same overlay.
    pub fn ptr_eq(&self, other: &Array) -> bool {
        Arc::ptr_eq(&self.overlay, &other.overlay)
    }

    /// Number of elements.
    pub fn count(&self) -> usize {
        let _guard = self.overlay.context.lock();
        self.overlay.state.lock().slots.len()
    }

    /// True if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// True if encoding would differ from the stored bytes.
    pub fn is_changed(&self) -> bool {
        let _guard = self.overlay.context.lock();
        self.overlay_changed()
    }

    /// Returns the element at `index`, decoding it on first access.
    ///
    /// # Errors
    ///
    /// Returns `IndexOutOfRange` if `index >= count()`, or a codec error
    /// if the stored element is corrupt.
    pub fn get(&self, index: usize) -> CoreResult<DocValue> {
        let _guard = self.overlay.context.lock();
        let mut state = self.overlay.state.lock();
        let err = state.out_of_range(index);
        let slot = state.slots.get_mut(index).ok_or(err)?;
        slot.resolve(&self.overlay.context, self.overlay.mutable)
    }

    /// Text at `index`, or `None` if the element is not text.
    pub fn get_string(&self, index: usize) -> CoreResult<Option<String>> {
        Ok(match self.get(index)? {
            DocValue::Text(s) => Some(s),
            _ => None,
        })
    }

    /// Integer at `index`; floats are rounded, booleans read as 1 or 0,
    /// other kinds as 0.
    pub fn get_int(&self, index: usize) -> CoreResult<i64> {
        Ok(self.get(index)?.to_int())
    }

    /// Float at `index`; integers are widened, booleans read as 1.0 or
    /// 0.0, other kinds as 0.0.
    pub fn get_double(&self, index: usize) -> CoreResult<f64> {
        Ok(self.get(index)?.to_double())
    }

    /// Number at `index`, or `None` if the element is not an integer or
    /// float.
    pub fn get_number(&self, index: usize) -> CoreResult<Option<DocValue>> {
        Ok(Some(self.get(index)?).filter(DocValue::is_number))
    }

    /// Boolean at `index`; see [`DocValue::to_bool`].
    pub fn get_bool(&self, index: usize) -> CoreResult<bool> {
        Ok(self.get(index)?.to_bool())
    }

    /// Blob at `index`, or `None` if the element is not a blob.
    pub fn get_blob(&self, index: usize) -> CoreResult<Option<Blob>> {
        Ok(match self.get(index)? {
            DocValue::Blob(b) => Some(b),
            _ => None,
        })
    }

    /// Nested array at `index`, or `None` if the element is not an array.
    pub fn get_array(&self, index: usize) -> CoreResult<Option<Array>> {
        Ok(match self.get(index)? {
            DocValue::Array(a) => Some(a),
            _ => None,
        })
    }

    /// Nested dictionary at `index`, or `None` if the element is not one.
    pub fn get_dictionary(&self, index: usize) -> CoreResult<Option<Dictionary>> {
        Ok(match self.get(index)? {
            DocValue::Dictionary(d) => Some(d),
            _ => None,
        })
    }

    /// Replaces the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns `Immutable` on a read-only array and `IndexOutOfRange` if
    /// `index >= count()`.
    pub fn set(&self, index: usize, value: impl Into<DocValue>) -> CoreResult<()> {
        self.check_mutable()?;
        let value = value.into().adopt(&self.overlay.context);
        let _guard = self.overlay.context.lock();
        let mut state = self.overlay.state.lock();
        if index >= state.slots.len() {
            return Err(state.out_of_range(index));
        }
        state.slots[index] = Slot::written(value);
        state.dirty = true;
        Ok(())
    }

    /// Appends an element.
    pub fn push(&self, value: impl Into<DocValue>) -> CoreResult<()> {
        self.check_mutable()?;
        let value = value.into().adopt(&self.overlay.context);
        let _guard = self.overlay.context.lock();
        let mut state = self.overlay.state.lock();
        state.slots.push(Slot::written(value));
        state.dirty = true;
        Ok(())
    }

    /// Inserts an element before `index`; `index == count()` appends.
    pub fn insert(&self, index: usize, value: impl Into<DocValue>) -> CoreResult<()> {
        self.check_mutable()?;
        let value = value.into().adopt(&self.overlay.context);
        let _guard = self.overlay.context.lock();
        let mut state = self.overlay.state.lock();
        if index > state.slots.len() {
            return Err(state.out_of_range(index));
        }
        state.slots.insert(index, Slot::written(value));
        state.dirty = true;
        Ok(())
    }

    /// Removes the element at `index`, shifting later elements down.
    pub fn remove(&self, index: usize) -> CoreResult<()> {
        self.check_mutable()?;
        let _guard = self.overlay.context.lock();
        let mut state = self.overlay.state.lock();
        if index >= state.slots.len() {
            return Err(state.out_of_range(index));
        }
        state.slots.remove(index);
        state.dirty = true;
        Ok(())
    }

    /// An independent mutable copy sharing this array's context.
    ///
    /// Stored elements and read-only children are shared with the source
    /// until written.
    pub fn to_mutable(&self) -> Array {
        let _guard = self.overlay.context.lock();
        self.copy_into(&self.overlay.context)
    }

    /// Fully decodes the array.
    pub fn to_value(&self) -> CoreResult<Value> {
        let count = self.count();
        let mut items = Vec::with_capacity(count);
        for index in 0..count {
            items.push(self.get(index)?.to_value()?);
        }
        Ok(Value::Array(items))
    }

    /// Encodes the array, reusing stored bytes for untouched elements.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let _guard = self.overlay.context.lock();
        let mut encoder = CanonicalEncoder::new();
        self.encode_overlay(&mut encoder)?;
        Ok(encoder.into_bytes())
    }

    /// Iterates over the elements present when the iterator was created.
    pub fn iter(&self) -> ArrayIter<'_> {
        ArrayIter {
            array: self,
            index: 0,
            count: self.count(),
        }
    }

    fn check_mutable(&self) -> CoreResult<()> {
        if self.overlay.mutable {
            Ok(())
        } else {
            Err(CoreError::Immutable)
        }
    }

    /// Copies this overlay into `context`. Caller holds this array's lock.
    pub(crate) fn copy_into(&self, context: &Arc<RootContext>) -> Array {
        let state = self.overlay.state.lock();
        let slots = state.slots.iter().map(|s| s.copy_for(context)).collect();
        Self::with_slots(
            Arc::clone(context),
            true,
            state.base.clone(),
            slots,
            state.dirty,
        )
    }

    pub(crate) fn overlay_changed(&self) -> bool {
        let state = self.overlay.state.lock();
        state.dirty || state.slots.iter().any(Slot::is_changed)
    }

    pub(crate) fn encode_overlay(&self, encoder: &mut CanonicalEncoder) -> CoreResult<()> {
        let state = self.overlay.state.lock();
        if let Some(base) = &state.base {
            if !state.dirty && !state.slots.iter().any(Slot::is_changed) {
                encoder.encode_raw(base.as_raw());
                return Ok(());
            }
        }
        encoder.begin_array(state.slots.len());
        for slot in &state.slots {
            slot.encode(encoder)?;
        }
        Ok(())
    }
}

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        match (self.to_value(), other.to_value()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("count", &self.count())
            .field("mutable", &self.overlay.mutable)
            .finish()
    }
}

/// Iterator over an [`Array`], yielding each element or its decode error.
pub struct ArrayIter<'a> {
    array: &'a Array,
    index: usize,
    count: usize,
}

impl Iterator for ArrayIter<'_> {
    type Item = CoreResult<DocValue>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }
        let item = self.array.get(self.index);
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count.saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl<'a> IntoIterator for &'a Array {
    type Item = CoreResult<DocValue>;
    type IntoIter = ArrayIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foliodb_codec::{to_canonical_cbor, Classified, RawValue};

    fn stored(value: &Value) -> Array {
        let raw = RawValue::new(to_canonical_cbor(value).unwrap()).unwrap();
        let Classified::Array(array) = raw.classify().unwrap() else {
            panic!("expected array");
        };
        Array::from_raw(array, RootContext::detached(), false)
    }

    fn numbers() -> Value {
        Value::Array(vec![Value::Integer(10), Value::Integer(20), Value::Integer(30)])
    }

    #[test]
    fn reads_stored_elements() {
        let array = stored(&numbers());
        assert_eq!(array.count(), 3);
        assert_eq!(array.get_int(1).unwrap(), 20);
        assert!(!array.is_mutable());
        assert!(!array.is_changed());
    }

    #[test]
    fn out_of_range_is_an_error() {
        let array = stored(&numbers());
        assert!(matches!(
            array.get(3),
            Err(CoreError::IndexOutOfRange { index: 3, count: 3 })
        ));
    }

    #[test]
    fn read_only_rejects_writes() {
        let array = stored(&numbers());
        assert!(matches!(array.set(0, 1), Err(CoreError::Immutable)));
        assert!(matches!(array.push(1), Err(CoreError::Immutable)));
        assert!(matches!(array.remove(0), Err(CoreError::Immutable)));
    }

    #[test]
    fn writes_to_copy_leave_source_untouched() {
        let source = stored(&numbers());
        let copy = source.to_mutable();
        copy.set(1, 99).unwrap();
        copy.push("tail").unwrap();

        assert_eq!(source.to_value().unwrap(), numbers());
        assert_eq!(copy.count(), 4);
        assert_eq!(copy.get_int(1).unwrap(), 99);
        assert_eq!(copy.get_string(3).unwrap().as_deref(), Some("tail"));
    }

    #[test]
    fn remove_shifts_later_elements() {
        let source = stored(&numbers());
        let array = source.to_mutable();
        array.remove(0).unwrap();
        assert_eq!(array.count(), 2);
        assert_eq!(array.get_int(0).unwrap(), 20);
        assert_eq!(array.get_int(1).unwrap(), 30);
        assert!(matches!(array.get(2), Err(CoreError::IndexOutOfRange { .. })));
        assert_eq!(source.to_value().unwrap(), numbers());
    }

    #[test]
    fn insert_and_bounds() {
        let array = Array::new();
        array.insert(0, 2).unwrap();
        array.insert(0, 1).unwrap();
        array.insert(2, 3).unwrap();
        assert!(matches!(array.insert(5, 0), Err(CoreError::IndexOutOfRange { .. })));
        assert_eq!(
            array.to_value().unwrap(),
            Value::Array(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)])
        );
    }

    #[test]
    fn untouched_copy_encodes_to_stored_bytes() {
        let bytes = to_canonical_cbor(&numbers()).unwrap();
        let copy = stored(&numbers()).to_mutable();
        copy.get(0).unwrap();
        assert_eq!(copy.encode().unwrap(), bytes);
    }

    #[test]
    fn edited_copy_encodes_new_content() {
        let copy = stored(&numbers()).to_mutable();
        copy.set(2, "x").unwrap();
        let expected = Value::Array(vec![Value::Integer(10), Value::Integer(20), Value::from("x")]);
        assert_eq!(copy.encode().unwrap(), to_canonical_cbor(&expected).unwrap());
    }

    #[test]
    fn nested_child_of_mutable_parent_is_mutable() {
        let nested = Value::Array(vec![Value::Array(vec![Value::Integer(1)])]);
        let source = stored(&nested);
        let inner = source.get_array(0).unwrap().unwrap();
        assert!(!inner.is_mutable());

        let copy = source.to_mutable();
        let inner_copy = copy.get_array(0).unwrap().unwrap();
        assert!(inner_copy.is_mutable());
        inner_copy.push(2).unwrap();

        assert!(copy.is_changed());
        assert_eq!(inner.count(), 1);
        assert_eq!(
            copy.to_value().unwrap(),
            Value::Array(vec![Value::Array(vec![Value::Integer(1), Value::Integer(2)])])
        );
    }

    #[test]
    fn stored_collection_is_copied_by_value() {
        let outer = Array::new();
        let inner = Array::from_values([1, 2]);
        outer.push(inner.clone()).unwrap();
        inner.push(3).unwrap();
        assert_eq!(outer.get_array(0).unwrap().unwrap().count(), 2);

        outer.push(outer.clone()).unwrap();
        assert_eq!(outer.count(), 2);
        assert_eq!(outer.get_array(1).unwrap().unwrap().count(), 1);
    }

    #[test]
    fn iteration_snapshots_count() {
        let array = Array::from_values(["a", "b"]);
        let mut iter = array.iter();
        array.push("c").unwrap();
        assert_eq!(iter.next().unwrap().unwrap(), DocValue::from("a"));
        assert_eq!(iter.next().unwrap().unwrap(), DocValue::from("b"));
        assert!(iter.next().is_none());
        assert_eq!(array.iter().count(), 3);
    }

    #[test]
    fn equality_ignores_representation() {
        let a = stored(&numbers());
        let b = Array::from_values([10, 20, 30]);
        assert_eq!(a, b);
        b.push(40).unwrap();
        assert_ne!(a, b);
    }
}
