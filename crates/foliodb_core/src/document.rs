//! Documents: a selected revision plus its lazily decoded properties.

use crate::blob::Blob;
use crate::collection::{Array, Dictionary};
use crate::context::RootContext;
use crate::error::CoreResult;
use crate::revision::{RevisionHandle, RevisionId};
use crate::types::SequenceNumber;
use crate::value::DocValue;
use bytes::Bytes;
use foliodb_codec::Value;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Where a document's selection stands relative to its revision tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentState {
    /// No revision loaded; the document has never been saved.
    Unloaded,
    /// The selected revision is the document's current revision.
    Current,
    /// The selected revision is live but not current.
    Superseded,
    /// The selected revision is a deletion.
    Deleted,
}

/// A read-only view of one revision of a document.
///
/// Properties are decoded lazily from the revision's stored body. The
/// selection can be moved to another leaf or to a common ancestor; each
/// move rebuilds the property tree under a fresh root context, so values
/// read before the move keep showing the old revision.
#[derive(Clone)]
pub struct Document {
    id: String,
    handle: Option<RevisionHandle>,
    properties: Dictionary,
    include_deleted_leaves: bool,
    unsaved: bool,
}

impl Document {
    pub(crate) fn from_handle(
        context: Arc<RootContext>,
        id: impl Into<String>,
        handle: Option<RevisionHandle>,
        include_deleted_leaves: bool,
    ) -> CoreResult<Self> {
        let properties = Self::root_for(context, handle.as_ref())?;
        Ok(Self {
            id: id.into(),
            handle,
            properties,
            include_deleted_leaves,
            unsaved: false,
        })
    }

    /// A not-yet-saved body edited from `base`, as presented to a
    /// conflict resolver.
    pub(crate) fn unsaved(
        context: Arc<RootContext>,
        id: impl Into<String>,
        base: Option<RevisionHandle>,
        body: Bytes,
    ) -> CoreResult<Self> {
        let properties = Dictionary::from_body(body, context, false)?;
        Ok(Self {
            id: id.into(),
            handle: base,
            properties,
            include_deleted_leaves: false,
            unsaved: true,
        })
    }

    fn root_for(context: Arc<RootContext>, handle: Option<&RevisionHandle>) -> CoreResult<Dictionary> {
        match handle.filter(|h| !h.is_deleted()).and_then(RevisionHandle::body) {
            Some(body) => Dictionary::from_body(body.clone(), context, false),
            None => Ok(Dictionary::empty_in(context, false)),
        }
    }

    /// Swaps in another selection of the same document, rebuilding the
    /// property tree. Nothing changes if the new body fails to decode.
    fn adopt_selection(&mut self, handle: RevisionHandle) -> CoreResult<()> {
        let context = self.properties.context().sibling();
        let properties = Self::root_for(context, Some(&handle))?;
        self.handle = Some(handle);
        self.properties = properties;
        self.unsaved = false;
        Ok(())
    }

    /// The document's ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The revision handle, if a revision is loaded.
    pub fn handle(&self) -> Option<&RevisionHandle> {
        self.handle.as_ref()
    }

    /// The selected revision's ID.
    pub fn rev_id(&self) -> Option<&RevisionId> {
        self.handle.as_ref().map(RevisionHandle::rev_id)
    }

    /// The selected revision's sequence, or zero if none is loaded.
    pub fn sequence(&self) -> SequenceNumber {
        self.handle
            .as_ref()
            .map_or(SequenceNumber::default(), RevisionHandle::sequence)
    }

    /// The selected revision's generation.
    ///
    /// For an unsaved edit this is one past the revision it was based on.
    /// Zero when no revision is loaded or the ID has no valid prefix.
    pub fn generation(&self) -> u64 {
        let base = self.handle.as_ref().map_or(0, RevisionHandle::generation);
        base + u64::from(self.unsaved)
    }

    /// True if the selected revision is a deletion.
    pub fn is_deleted(&self) -> bool {
        self.handle.as_ref().is_some_and(RevisionHandle::is_deleted)
    }

    /// True if the document has been saved at least once.
    pub fn exists(&self) -> bool {
        self.handle.is_some()
    }

    /// Where the selection stands.
    pub fn state(&self) -> DocumentState {
        match &self.handle {
            None => DocumentState::Unloaded,
            Some(h) if h.is_deleted() => DocumentState::Deleted,
            Some(h) if h.is_current() => DocumentState::Current,
            Some(_) => DocumentState::Superseded,
        }
    }

    /// The stored body of the selected revision.
    pub fn encode(&self) -> Option<Bytes> {
        self.handle.as_ref().and_then(RevisionHandle::body).cloned()
    }

    /// The root dictionary of the selected revision.
    pub fn properties(&self) -> &Dictionary {
        &self.properties
    }

    /// Number of top-level properties.
    pub fn count(&self) -> usize {
        self.properties.count()
    }

    /// Top-level property names.
    pub fn keys(&self) -> Vec<String> {
        self.properties.keys()
    }

    /// True if the property exists.
    pub fn contains(&self, key: &str) -> bool {
        self.properties.contains(key)
    }

    /// A top-level property; see [`Dictionary::get`].
    pub fn get(&self, key: &str) -> CoreResult<Option<DocValue>> {
        self.properties.get(key)
    }

    /// See [`Dictionary::get_string`].
    pub fn get_string(&self, key: &str) -> CoreResult<Option<String>> {
        self.properties.get_string(key)
    }

    /// See [`Dictionary::get_int`].
    pub fn get_int(&self, key: &str) -> CoreResult<i64> {
        self.properties.get_int(key)
    }

    /// See [`Dictionary::get_double`].
    pub fn get_double(&self, key: &str) -> CoreResult<f64> {
        self.properties.get_double(key)
    }

    /// See [`Dictionary::get_number`].
    pub fn get_number(&self, key: &str) -> CoreResult<Option<DocValue>> {
        self.properties.get_number(key)
    }

    /// See [`Dictionary::get_bool`].
    pub fn get_bool(&self, key: &str) -> CoreResult<bool> {
        self.properties.get_bool(key)
    }

    /// See [`Dictionary::get_blob`].
    pub fn get_blob(&self, key: &str) -> CoreResult<Option<Blob>> {
        self.properties.get_blob(key)
    }

    /// See [`Dictionary::get_array`].
    pub fn get_array(&self, key: &str) -> CoreResult<Option<Array>> {
        self.properties.get_array(key)
    }

    /// See [`Dictionary::get_dictionary`].
    pub fn get_dictionary(&self, key: &str) -> CoreResult<Option<Dictionary>> {
        self.properties.get_dictionary(key)
    }

    /// Fully decodes the properties.
    pub fn to_value(&self) -> CoreResult<Value> {
        self.properties.to_value()
    }

    /// An editable copy based on the selected revision.
    pub fn to_mutable(&self) -> MutableDocument {
        let context = self.properties.context().sibling();
        let properties = {
            let _guard = self.properties.context().lock();
            self.properties.copy_into(&context)
        };
        MutableDocument {
            id: self.id.clone(),
            base: self.handle.clone(),
            properties,
        }
    }

    /// Moves the selection to the next leaf revision.
    ///
    /// Deleted leaves are visited only if the database was configured to
    /// include them. Returns false, leaving the document unchanged, if
    /// there is no further leaf or its body cannot be decoded.
    pub fn select_next_leaf_revision(&mut self) -> bool {
        self.select_next_leaf(self.include_deleted_leaves)
    }

    /// Moves the selection to the next live leaf: the revision that
    /// conflicts with the current one, if any.
    pub fn select_conflicting_revision(&mut self) -> bool {
        self.select_next_leaf(false)
    }

    fn select_next_leaf(&mut self, include_deleted: bool) -> bool {
        let Some(mut handle) = self.handle.clone() else {
            return false;
        };
        if !handle.select_next_leaf(include_deleted) {
            return false;
        }
        match self.adopt_selection(handle) {
            Ok(()) => true,
            Err(error) => {
                warn!(doc_id = %self.id, %error, "failed to select next leaf revision");
                false
            }
        }
    }

    /// Selects the nearest common ancestor of the revisions selected in
    /// `a` and `b`.
    ///
    /// Returns false, leaving the document unchanged, if either has no
    /// revision or the two share no ancestor in this document's history.
    pub fn select_common_ancestor(&mut self, a: &Document, b: &Document) -> bool {
        let (Some(mut handle), Some(rev_a), Some(rev_b)) = (self.handle.clone(), a.rev_id(), b.rev_id()) else {
            return false;
        };
        if !handle.select_common_ancestor(rev_a, rev_b) {
            return false;
        }
        match self.adopt_selection(handle) {
            Ok(()) => true,
            Err(error) => {
                warn!(doc_id = %self.id, %error, "failed to select common ancestor");
                false
            }
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("id", &self.id)
            .field("rev_id", &self.rev_id())
            .field("state", &self.state())
            .finish()
    }
}

/// An editable document, either new or based on a loaded revision.
///
/// Edits stay local until the document is saved through
/// [`Database::save`](crate::Database::save).
pub struct MutableDocument {
    id: String,
    base: Option<RevisionHandle>,
    properties: Dictionary,
}

impl MutableDocument {
    /// Creates a new, never-saved document with no properties.
    ///
    /// The document belongs to no database until it is saved, so its keys
    /// come back in canonical order until then. Use
    /// [`Database::new_document`](crate::Database::new_document) to get
    /// the database's key order from the start.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base: None,
            properties: Dictionary::new(),
        }
    }

    /// Creates a new, never-saved document whose tree lives in `context`.
    pub(crate) fn in_context(id: impl Into<String>, context: Arc<RootContext>) -> Self {
        Self {
            id: id.into(),
            base: None,
            properties: Dictionary::empty_in(context, true),
        }
    }

    /// Creates a new document holding a copy of `properties`.
    pub fn with_properties(id: impl Into<String>, properties: &Dictionary) -> Self {
        let context = RootContext::detached();
        let copy = {
            let _guard = properties.context().lock();
            properties.copy_into(&context)
        };
        Self {
            id: id.into(),
            base: None,
            properties: copy,
        }
    }

    /// The document's ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The revision these edits are based on.
    pub fn base(&self) -> Option<&RevisionHandle> {
        self.base.as_ref()
    }

    /// ID of the revision these edits are based on.
    pub fn base_rev_id(&self) -> Option<&RevisionId> {
        self.base.as_ref().map(RevisionHandle::rev_id)
    }

    /// Generation the next save will produce if it does not conflict.
    pub fn generation(&self) -> u64 {
        self.base.as_ref().map_or(0, RevisionHandle::generation) + u64::from(self.is_changed())
    }

    /// True if the properties differ from the base revision.
    pub fn is_changed(&self) -> bool {
        self.base.is_none() || self.properties.is_changed()
    }

    /// The editable root dictionary.
    pub fn properties(&self) -> &Dictionary {
        &self.properties
    }

    /// See [`Dictionary::get`].
    pub fn get(&self, key: &str) -> CoreResult<Option<DocValue>> {
        self.properties.get(key)
    }

    /// See [`Dictionary::set`].
    pub fn set(&self, key: &str, value: impl Into<DocValue>) -> CoreResult<()> {
        self.properties.set(key, value)
    }

    /// See [`Dictionary::remove`].
    pub fn remove(&self, key: &str) -> CoreResult<()> {
        self.properties.remove(key)
    }

    /// Encodes the properties as a document body.
    pub fn encode(&self) -> CoreResult<Bytes> {
        Ok(Bytes::from(self.properties.encode()?))
    }

    /// Rebases the document onto a freshly saved revision.
    pub(crate) fn rebase(&mut self, handle: RevisionHandle) -> CoreResult<()> {
        let context = self.properties.context().sibling();
        self.properties = match handle.body().filter(|_| !handle.is_deleted()) {
            Some(body) => Dictionary::from_body(body.clone(), context, true)?,
            None => Dictionary::empty_in(context, true),
        };
        self.base = Some(handle);
        Ok(())
    }

    /// Re-binds a detached document to a database's lock.
    pub(crate) fn attach(&mut self, context: &Arc<RootContext>) {
        if self.properties.context().shares_lock_with(context) {
            return;
        }
        let own = Arc::clone(self.properties.context());
        let _guard = own.lock();
        self.properties = self.properties.copy_into(context);
    }
}

impl fmt::Debug for MutableDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutableDocument")
            .field("id", &self.id)
            .field("base", &self.base_rev_id())
            .finish()
    }
}
