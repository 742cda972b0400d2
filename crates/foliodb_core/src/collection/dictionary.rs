//! Dictionary overlay.

use crate::blob::Blob;
use crate::collection::Array;
use crate::config::KeyOrder;
use crate::context::RootContext;
use crate::error::{CoreError, CoreResult};
use crate::slot::Slot;
use crate::value::DocValue;
use foliodb_codec::{cmp_text_keys, CanonicalEncoder, Classified, RawMap, RawValue, Value};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

struct DictOverlay {
    context: Arc<RootContext>,
    mutable: bool,
    state: Mutex<DictState>,
}

struct DictState {
    /// Stored encoding this overlay was read from.
    base: Option<RawMap>,
    /// Entries decoded or written since. `Slot::Empty` hides a stored key.
    overrides: HashMap<String, Slot>,
    /// Keys absent from `base` that were set, in first-set order.
    added: Vec<String>,
    count: usize,
    dirty: bool,
}

impl DictState {
    fn stored(&self, key: &str) -> Option<&RawValue> {
        self.base.as_ref().and_then(|base| base.get(key))
    }

    fn contains(&self, key: &str) -> bool {
        match self.overrides.get(key) {
            Some(slot) => !slot.is_empty(),
            None => self.stored(key).is_some(),
        }
    }

    fn keys(&self, order: KeyOrder) -> Vec<String> {
        let mut keys: Vec<String> = self
            .base
            .iter()
            .flat_map(RawMap::iter)
            .filter_map(|(key, _)| key.as_text())
            .filter(|key| self.overrides.get(*key).map_or(true, |slot| !slot.is_empty()))
            .map(str::to_owned)
            .collect();
        keys.extend(self.added.iter().cloned());
        if order == KeyOrder::Canonical {
            keys.sort_by(|a, b| cmp_text_keys(a, b));
        }
        keys
    }

    fn is_changed(&self) -> bool {
        self.dirty || self.overrides.values().any(Slot::is_changed)
    }
}

/// A collection of [`DocValue`]s keyed by text.
///
/// Cloning a `Dictionary` clones the handle; both clones see the same
/// entries. Use [`Dictionary::to_mutable`] for an independent copy.
#[derive(Clone)]
pub struct Dictionary {
    overlay: Arc<DictOverlay>,
}

impl Dictionary {
    /// Creates an empty mutable dictionary that belongs to no database.
    pub fn new() -> Self {
        Self::with_state(RootContext::detached(), true, DictState {
            base: None,
            overrides: HashMap::new(),
            added: Vec::new(),
            count: 0,
            dirty: false,
        })
    }

    /// Creates a mutable dictionary holding `entries`.
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> CoreResult<Self>
    where
        K: AsRef<str>,
        V: Into<DocValue>,
    {
        let dict = Self::new();
        for (key, value) in entries {
            dict.set(key.as_ref(), value)?;
        }
        Ok(dict)
    }

    /// Wraps a stored map without decoding any value.
    ///
    /// # Errors
    ///
    /// Returns a data format error if a stored key is not text.
    pub(crate) fn from_raw(raw: RawMap, context: Arc<RootContext>, mutable: bool) -> CoreResult<Self> {
        if let Some((key, _)) = raw.iter().find(|(key, _)| key.as_text().is_none()) {
            return Err(CoreError::data_format(format!(
                "dictionary keys must be text, found {key:?}"
            )));
        }
        let count = raw.len();
        Ok(Self::with_state(context, mutable, DictState {
            base: Some(raw),
            overrides: HashMap::new(),
            added: Vec::new(),
            count,
            dirty: false,
        }))
    }

    /// Wraps a stored document body, which must be a map.
    pub(crate) fn from_body(
        body: impl Into<bytes::Bytes>,
        context: Arc<RootContext>,
        mutable: bool,
    ) -> CoreResult<Self> {
        match RawValue::new(body)?.classify()? {
            Classified::Map(map) => Self::from_raw(map, context, mutable),
            other => Err(CoreError::data_format(format!(
                "document body must be a map, found {other:?}"
            ))),
        }
    }

    /// An empty dictionary bound to `context`.
    pub(crate) fn empty_in(context: Arc<RootContext>, mutable: bool) -> Self {
        Self::with_state(context, mutable, DictState {
            base: None,
            overrides: HashMap::new(),
            added: Vec::new(),
            count: 0,
            dirty: false,
        })
    }

    fn with_state(context: Arc<RootContext>, mutable: bool, state: DictState) -> Self {
        Self {
            overlay: Arc::new(DictOverlay {
                context,
                mutable,
                state: Mutex::new(state),
            }),
        }
    }

    /// The context this dictionary belongs to.
    pub fn context(&self) -> &Arc<RootContext> {
        &self.overlay.context
    }

    /// True if this dictionary accepts writes.
    pub fn is_mutable(&self) -> bool {
        self.overlay.mutable
    }

    /// True if both handles refer to the same overlay.
    pub fn ptr_eq(&self, other: &Dictionary) -> bool {
        Arc::ptr_eq(&self.overlay, &other.overlay)
    }

    /// Number of entries.
    pub fn count(&self) -> usize {
        let _guard = self.overlay.context.lock();
        self.overlay.state.lock().count
    }

    /// True if the dictionary has no entries.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// True if encoding would differ from the stored bytes.
    pub fn is_changed(&self) -> bool {
        let _guard = self.overlay.context.lock();
        self.overlay_changed()
    }

    /// Current keys, in the context's [`KeyOrder`].
    pub fn keys(&self) -> Vec<String> {
        let _guard = self.overlay.context.lock();
        self.overlay.state.lock().keys(self.overlay.context.key_order())
    }

    /// True if `key` has a value, including an explicit null.
    pub fn contains(&self, key: &str) -> bool {
        let _guard = self.overlay.context.lock();
        self.overlay.state.lock().contains(key)
    }

    /// Returns the value under `key`, decoding it on first access.
    ///
    /// # Errors
    ///
    /// Returns a codec error if the stored value is corrupt.
    pub fn get(&self, key: &str) -> CoreResult<Option<DocValue>> {
        let _guard = self.overlay.context.lock();
        let mut state = self.overlay.state.lock();
        let (context, mutable) = (&self.overlay.context, self.overlay.mutable);
        if let Some(slot) = state.overrides.get_mut(key) {
            if slot.is_empty() {
                return Ok(None);
            }
            return slot.resolve(context, mutable).map(Some);
        }
        let Some(raw) = state.stored(key).cloned() else {
            return Ok(None);
        };
        let mut slot = Slot::Unresolved(raw);
        let value = slot.resolve(context, mutable)?;
        state.overrides.insert(key.to_owned(), slot);
        Ok(Some(value))
    }

    /// Text under `key`, or `None` if absent or not text.
    pub fn get_string(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(match self.get(key)? {
            Some(DocValue::Text(s)) => Some(s),
            _ => None,
        })
    }

    /// Integer under `key`; floats are rounded, booleans read as 1 or 0,
    /// anything else as 0.
    pub fn get_int(&self, key: &str) -> CoreResult<i64> {
        Ok(self.get(key)?.map_or(0, |v| v.to_int()))
    }

    /// Float under `key`; see [`DocValue::to_double`]. Absent reads as 0.0.
    pub fn get_double(&self, key: &str) -> CoreResult<f64> {
        Ok(self.get(key)?.map_or(0.0, |v| v.to_double()))
    }

    /// Number under `key`, or `None` if absent or not an integer or float.
    pub fn get_number(&self, key: &str) -> CoreResult<Option<DocValue>> {
        Ok(self.get(key)?.filter(DocValue::is_number))
    }

    /// Boolean under `key`; absent reads as false.
    pub fn get_bool(&self, key: &str) -> CoreResult<bool> {
        Ok(self.get(key)?.is_some_and(|v| v.to_bool()))
    }

    /// Blob under `key`, or `None` if absent or not a blob.
    pub fn get_blob(&self, key: &str) -> CoreResult<Option<Blob>> {
        Ok(match self.get(key)? {
            Some(DocValue::Blob(b)) => Some(b),
            _ => None,
        })
    }

    /// Nested array under `key`, or `None` if absent or not an array.
    pub fn get_array(&self, key: &str) -> CoreResult<Option<Array>> {
        Ok(match self.get(key)? {
            Some(DocValue::Array(a)) => Some(a),
            _ => None,
        })
    }

    /// Nested dictionary under `key`, or `None` if absent or not one.
    pub fn get_dictionary(&self, key: &str) -> CoreResult<Option<Dictionary>> {
        Ok(match self.get(key)? {
            Some(DocValue::Dictionary(d)) => Some(d),
            _ => None,
        })
    }

    /// Sets `key` to `value`, adding the key if it is new.
    ///
    /// # Errors
    ///
    /// Returns `Immutable` on a read-only dictionary.
    pub fn set(&self, key: &str, value: impl Into<DocValue>) -> CoreResult<()> {
        self.check_mutable()?;
        let value = value.into().adopt(&self.overlay.context);
        let _guard = self.overlay.context.lock();
        let mut state = self.overlay.state.lock();
        if !state.contains(key) {
            state.count += 1;
            if state.stored(key).is_none() {
                state.added.push(key.to_owned());
            }
        }
        state.overrides.insert(key.to_owned(), Slot::written(value));
        state.dirty = true;
        Ok(())
    }

    /// Removes `key`. Removing an absent key does nothing.
    pub fn remove(&self, key: &str) -> CoreResult<()> {
        self.check_mutable()?;
        let _guard = self.overlay.context.lock();
        let mut state = self.overlay.state.lock();
        if !state.contains(key) {
            return Ok(());
        }
        state.count -= 1;
        if state.stored(key).is_some() {
            state.overrides.insert(key.to_owned(), Slot::Empty);
        } else {
            state.overrides.remove(key);
            state.added.retain(|k| k != key);
        }
        state.dirty = true;
        Ok(())
    }

    /// An independent mutable copy sharing this dictionary's context.
    pub fn to_mutable(&self) -> Dictionary {
        let _guard = self.overlay.context.lock();
        self.copy_into(&self.overlay.context)
    }

    /// Fully decodes the dictionary; entries come out in canonical order.
    pub fn to_value(&self) -> CoreResult<Value> {
        let _guard = self.overlay.context.lock();
        let keys = self.overlay.state.lock().keys(KeyOrder::Canonical);
        let mut pairs = Vec::with_capacity(keys.len());
        for key in keys {
            let value = match self.get(&key)? {
                Some(value) => value.to_value()?,
                None => Value::Null,
            };
            pairs.push((Value::Text(key), value));
        }
        Ok(Value::Map(pairs))
    }

    /// Encodes the dictionary, reusing stored bytes for untouched entries.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let _guard = self.overlay.context.lock();
        let mut encoder = CanonicalEncoder::new();
        self.encode_overlay(&mut encoder)?;
        Ok(encoder.into_bytes())
    }

    /// Iterates over the keys present when the iterator was created.
    pub fn iter(&self) -> DictIter<'_> {
        DictIter {
            dict: self,
            keys: self.keys().into_iter(),
        }
    }

    fn check_mutable(&self) -> CoreResult<()> {
        if self.overlay.mutable {
            Ok(())
        } else {
            Err(CoreError::Immutable)
        }
    }

    /// Copies this overlay into `context`. Caller holds this dictionary's lock.
    pub(crate) fn copy_into(&self, context: &Arc<RootContext>) -> Dictionary {
        let state = self.overlay.state.lock();
        let overrides = state
            .overrides
            .iter()
            .map(|(key, slot)| (key.clone(), slot.copy_for(context)))
            .collect();
        Self::with_state(Arc::clone(context), true, DictState {
            base: state.base.clone(),
            overrides,
            added: state.added.clone(),
            count: state.count,
            dirty: state.dirty,
        })
    }

    pub(crate) fn overlay_changed(&self) -> bool {
        self.overlay.state.lock().is_changed()
    }

    pub(crate) fn encode_overlay(&self, encoder: &mut CanonicalEncoder) -> CoreResult<()> {
        let state = self.overlay.state.lock();
        if let Some(base) = &state.base {
            if !state.is_changed() {
                encoder.encode_raw(base.as_raw());
                return Ok(());
            }
        }
        let keys = state.keys(KeyOrder::Canonical);
        encoder.begin_map(keys.len());
        for key in &keys {
            encoder.encode_text(key);
            match (state.overrides.get(key), state.stored(key)) {
                (Some(slot), _) => slot.encode(encoder)?,
                (None, Some(raw)) => encoder.encode_raw(raw),
                (None, None) => {
                    return Err(CoreError::data_format(format!("key {key:?} lost its value")));
                }
            }
        }
        Ok(())
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Dictionary {
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

impl fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dictionary")
            .field("count", &self.count())
            .field("mutable", &self.overlay.mutable)
            .finish()
    }
}

/// Iterator over a [`Dictionary`], yielding each entry or its decode error.
///
/// Keys removed after the iterator was created are skipped.
pub struct DictIter<'a> {
    dict: &'a Dictionary,
    keys: std::vec::IntoIter<String>,
}

impl Iterator for DictIter<'_> {
    type Item = CoreResult<(String, DocValue)>;

    fn next(&mut self) -> Option<Self::Item> {
        for key in self.keys.by_ref() {
            match self.dict.get(&key) {
                Ok(Some(value)) => return Some(Ok((key, value))),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = CoreResult<(String, DocValue)>;
    type IntoIter = DictIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foliodb_codec::to_canonical_cbor;

    fn body() -> Value {
        Value::text_map([
            ("name", Value::from("folio")),
            ("pages", Value::Integer(12)),
            ("tags", Value::Array(vec![Value::from("a"), Value::from("b")])),
        ])
    }

    fn stored(value: &Value) -> Dictionary {
        Dictionary::from_body(to_canonical_cbor(value).unwrap(), RootContext::detached(), false).unwrap()
    }

    #[test]
    fn reads_stored_entries() {
        let dict = stored(&body());
        assert_eq!(dict.count(), 3);
        assert_eq!(dict.get_string("name").unwrap().as_deref(), Some("folio"));
        assert_eq!(dict.get_int("pages").unwrap(), 12);
        assert!(dict.get("missing").unwrap().is_none());
        assert_eq!(dict.get_int("missing").unwrap(), 0);
        assert_eq!(dict.keys(), ["name", "tags", "pages"]);
    }

    #[test]
    fn repeated_reads_return_same_child() {
        let dict = stored(&body());
        let first = dict.get_array("tags").unwrap().unwrap();
        let second = dict.get_array("tags").unwrap().unwrap();
        assert!(first.ptr_eq(&second));
    }

    #[test]
    fn read_only_rejects_writes() {
        let dict = stored(&body());
        assert!(matches!(dict.set("x", 1), Err(CoreError::Immutable)));
        assert!(matches!(dict.remove("name"), Err(CoreError::Immutable)));
    }

    #[test]
    fn tombstone_hides_stored_key() {
        let dict = stored(&body()).to_mutable();
        dict.remove("pages").unwrap();
        assert_eq!(dict.count(), 2);
        assert!(!dict.contains("pages"));
        assert!(dict.get("pages").unwrap().is_none());
        assert_eq!(dict.keys(), ["name", "tags"]);

        dict.set("pages", 13).unwrap();
        assert_eq!(dict.count(), 3);
        assert_eq!(dict.get_int("pages").unwrap(), 13);
    }

    #[test]
    fn removing_absent_key_is_a_no_op() {
        let dict = stored(&body()).to_mutable();
        dict.remove("nope").unwrap();
        assert_eq!(dict.count(), 3);
        assert!(!dict.is_changed());
    }

    #[test]
    fn null_counts_as_present() {
        let dict = Dictionary::new();
        dict.set("k", DocValue::Null).unwrap();
        assert!(dict.contains("k"));
        assert_eq!(dict.count(), 1);
        assert_eq!(dict.get("k").unwrap(), Some(DocValue::Null));
    }

    #[test]
    fn encoding_is_canonical_regardless_of_insert_order() {
        let a = Dictionary::from_entries([("zz", 1), ("a", 2)]).unwrap();
        let b = Dictionary::from_entries([("a", 2), ("zz", 1)]).unwrap();
        assert_eq!(a.encode().unwrap(), b.encode().unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn untouched_copy_reuses_stored_bytes() {
        let bytes = to_canonical_cbor(&body()).unwrap();
        let copy = stored(&body()).to_mutable();
        copy.get("tags").unwrap();
        assert!(!copy.is_changed());
        assert_eq!(copy.encode().unwrap(), bytes);
    }

    #[test]
    fn edits_encode_merged_content() {
        let copy = stored(&body()).to_mutable();
        copy.set("pages", 13).unwrap();
        copy.remove("name").unwrap();
        copy.set("new", true).unwrap();
        let expected = Value::text_map([
            ("new", Value::Bool(true)),
            ("pages", Value::Integer(13)),
            ("tags", Value::Array(vec![Value::from("a"), Value::from("b")])),
        ]);
        assert_eq!(copy.encode().unwrap(), to_canonical_cbor(&expected).unwrap());
    }

    #[test]
    fn nested_edit_marks_parent_changed() {
        let copy = stored(&body()).to_mutable();
        copy.get_array("tags").unwrap().unwrap().push("c").unwrap();
        assert!(copy.is_changed());
        let tags = Value::Array(vec![Value::from("a"), Value::from("b"), Value::from("c")]);
        assert_eq!(copy.to_value().unwrap().get("tags"), Some(&tags));
    }

    #[test]
    fn non_map_body_is_rejected() {
        let bytes = to_canonical_cbor(&Value::Integer(1)).unwrap();
        let err = Dictionary::from_body(bytes, RootContext::detached(), false).unwrap_err();
        assert!(err.is_data_format());
    }

    #[test]
    fn iteration_yields_entries() {
        let dict = stored(&body());
        let keys: Vec<String> = dict.iter().map(|entry| entry.unwrap().0).collect();
        assert_eq!(keys, dict.keys());
    }
}
