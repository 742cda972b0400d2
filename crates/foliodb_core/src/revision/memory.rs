//! In-memory revision store.

use super::handle::RevisionHandle;
use super::rev_id::RevisionId;
use super::store::RevisionStore;
use super::tree::{Revision, RevisionTree};
use crate::error::{CoreError, CoreResult};
use crate::types::SequenceNumber;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Default number of hex digits in a derived revision ID.
pub const DEFAULT_DIGEST_LEN: usize = 16;

/// A revision store held entirely in memory.
///
/// Useful for tests and for databases that never need to outlive the
/// process.
///
/// # Example
///
/// ```
/// use foliodb_core::{MemoryRevisionStore, RevisionStore};
///
/// let store = MemoryRevisionStore::new();
/// let handle = store.put("doc", None, Some(vec![0xa0].into()), false).unwrap();
/// assert_eq!(handle.generation(), 1);
/// ```
pub struct MemoryRevisionStore {
    docs: RwLock<HashMap<String, Arc<RevisionTree>>>,
    last_sequence: AtomicU64,
    digest_len: usize,
}

impl MemoryRevisionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::with_digest_len(DEFAULT_DIGEST_LEN)
    }

    /// Creates an empty store whose revision IDs keep `digest_len` hex
    /// digits.
    pub fn with_digest_len(digest_len: usize) -> Self {
        Self {
            docs: RwLock::new(HashMap::new()),
            last_sequence: AtomicU64::new(0),
            digest_len,
        }
    }

    /// Number of documents with at least one revision.
    pub fn document_count(&self) -> usize {
        self.docs.read().len()
    }

    fn next_sequence(&self) -> SequenceNumber {
        SequenceNumber::new(self.last_sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Copy of the stored tree for `doc_id`, ready to extend.
    fn working_tree(docs: &HashMap<String, Arc<RevisionTree>>, doc_id: &str) -> RevisionTree {
        docs.get(doc_id)
            .map_or_else(|| RevisionTree::new(doc_id), |tree| RevisionTree::clone(tree))
    }

    fn leaf_index(tree: &RevisionTree, rev_id: &RevisionId) -> CoreResult<usize> {
        let index = tree
            .find(rev_id)
            .ok_or_else(|| CoreError::revision_not_found(tree.doc_id(), rev_id.as_str()))?;
        if tree.is_leaf(index) {
            Ok(index)
        } else {
            Err(CoreError::conflict(tree.doc_id()))
        }
    }

    fn append(&self, tree: &mut RevisionTree, parent: Option<usize>, body: Option<Bytes>, deleted: bool) -> usize {
        let parent_id = parent.map(|i| tree.rev(i).rev_id.clone());
        let rev_id = RevisionId::derive(
            parent_id.as_ref(),
            deleted,
            body.as_deref().unwrap_or_default(),
            self.digest_len,
        );
        tree.push(Revision {
            rev_id,
            parent,
            sequence: self.next_sequence(),
            deleted,
            body,
        })
    }
}

impl Default for MemoryRevisionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RevisionStore for MemoryRevisionStore {
    fn load(&self, doc_id: &str) -> CoreResult<Option<RevisionHandle>> {
        let docs = self.docs.read();
        Ok(docs.get(doc_id).and_then(|tree| RevisionHandle::current(Arc::clone(tree))))
    }

    fn conflicting_leaves(&self, doc_id: &str) -> CoreResult<Vec<RevisionHandle>> {
        let Some(current) = self.load(doc_id)? else {
            return Ok(Vec::new());
        };
        let live: Vec<RevisionHandle> = current
            .leaves()
            .into_iter()
            .filter(|leaf| !leaf.is_deleted())
            .collect();
        Ok(if live.len() > 1 { live } else { Vec::new() })
    }

    fn put(
        &self,
        doc_id: &str,
        parent: Option<&RevisionId>,
        body: Option<Bytes>,
        deleted: bool,
    ) -> CoreResult<RevisionHandle> {
        let mut docs = self.docs.write();
        let mut tree = Self::working_tree(&docs, doc_id);

        let parent_index = match parent {
            Some(rev_id) => Some(Self::leaf_index(&tree, rev_id)?),
            None => match tree.current() {
                None if deleted => {
                    return Err(CoreError::DocumentNotFound {
                        id: doc_id.to_owned(),
                    })
                }
                None => None,
                Some(current) if tree.rev(current).deleted => Some(current),
                Some(_) => return Err(CoreError::conflict(doc_id)),
            },
        };

        let index = self.append(&mut tree, parent_index, body, deleted);
        let tree = Arc::new(tree);
        docs.insert(doc_id.to_owned(), Arc::clone(&tree));
        let handle = RevisionHandle::at(tree, index);
        debug!(
            doc_id,
            rev_id = %handle.rev_id(),
            sequence = handle.sequence().as_u64(),
            deleted,
            "stored revision"
        );
        Ok(handle)
    }

    fn insert_existing(
        &self,
        doc_id: &str,
        rev_id: RevisionId,
        parent: Option<&RevisionId>,
        body: Option<Bytes>,
        deleted: bool,
    ) -> CoreResult<RevisionHandle> {
        let mut docs = self.docs.write();
        let mut tree = Self::working_tree(&docs, doc_id);

        if let Some(existing) = tree.find(&rev_id) {
            return Ok(RevisionHandle::at(Arc::new(tree), existing));
        }

        let parent_index = parent
            .map(|p| {
                tree.find(p)
                    .ok_or_else(|| CoreError::revision_not_found(doc_id, p.as_str()))
            })
            .transpose()?;
        let expected = parent.map_or(0, RevisionId::generation) + 1;
        if rev_id.generation() != expected {
            return Err(CoreError::invalid_operation(format!(
                "revision {rev_id} should be generation {expected}"
            )));
        }

        let index = tree.push(Revision {
            rev_id,
            parent: parent_index,
            sequence: self.next_sequence(),
            deleted,
            body,
        });
        let tree = Arc::new(tree);
        docs.insert(doc_id.to_owned(), Arc::clone(&tree));
        let handle = RevisionHandle::at(tree, index);
        debug!(doc_id, rev_id = %handle.rev_id(), "inserted existing revision");
        Ok(handle)
    }

    fn resolve_conflict(
        &self,
        doc_id: &str,
        winner: &RevisionId,
        loser: &RevisionId,
        body: Bytes,
    ) -> CoreResult<RevisionHandle> {
        if winner == loser {
            return Err(CoreError::invalid_operation(
                "a conflict needs two distinct revisions",
            ));
        }
        let mut docs = self.docs.write();
        if !docs.contains_key(doc_id) {
            return Err(CoreError::DocumentNotFound {
                id: doc_id.to_owned(),
            });
        }
        let mut tree = Self::working_tree(&docs, doc_id);
        let winner_index = Self::leaf_index(&tree, winner)?;
        let loser_index = Self::leaf_index(&tree, loser)?;

        self.append(&mut tree, Some(loser_index), None, true);
        let merged = self.append(&mut tree, Some(winner_index), Some(body), false);
        let tree = Arc::new(tree);
        docs.insert(doc_id.to_owned(), Arc::clone(&tree));
        let handle = RevisionHandle::at(tree, merged);
        debug!(doc_id, %winner, %loser, rev_id = %handle.rev_id(), "resolved conflict");
        Ok(handle)
    }

    fn last_sequence(&self) -> SequenceNumber {
        SequenceNumber::new(self.last_sequence.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(byte: u8) -> Option<Bytes> {
        // a one-entry map {"v": byte}
        Some(Bytes::from(vec![0xa1, 0x61, b'v', byte & 0x17]))
    }

    #[test]
    fn put_creates_and_extends() {
        let store = MemoryRevisionStore::new();
        let first = store.put("doc", None, body(1), false).unwrap();
        let second = store.put("doc", Some(first.rev_id()), body(2), false).unwrap();

        assert_eq!(first.generation(), 1);
        assert_eq!(second.generation(), 2);
        assert!(second.sequence() > first.sequence());
        assert_eq!(store.last_sequence(), second.sequence());
        assert_eq!(store.load("doc").unwrap().unwrap().rev_id(), second.rev_id());
        assert!(store.load("other").unwrap().is_none());
    }

    #[test]
    fn stale_parent_conflicts() {
        let store = MemoryRevisionStore::new();
        let first = store.put("doc", None, body(1), false).unwrap();
        store.put("doc", Some(first.rev_id()), body(2), false).unwrap();
        assert!(matches!(
            store.put("doc", Some(first.rev_id()), body(3), false),
            Err(CoreError::Conflict { .. })
        ));
        assert!(matches!(
            store.put("doc", None, body(3), false),
            Err(CoreError::Conflict { .. })
        ));
        assert!(matches!(
            store.put("doc", Some(&"5-nope".into()), body(3), false),
            Err(CoreError::RevisionNotFound { .. })
        ));
    }

    #[test]
    fn failed_write_leaves_no_trace() {
        let store = MemoryRevisionStore::new();
        assert!(store.put("ghost", None, None, true).is_err());
        assert_eq!(store.document_count(), 0);
        assert_eq!(store.last_sequence(), SequenceNumber::new(0));
    }

    #[test]
    fn recreate_after_delete() {
        let store = MemoryRevisionStore::new();
        let first = store.put("doc", None, body(1), false).unwrap();
        let gone = store.put("doc", Some(first.rev_id()), None, true).unwrap();
        assert!(gone.is_deleted());

        let again = store.put("doc", None, body(2), false).unwrap();
        assert_eq!(again.generation(), 3);
        assert!(!again.is_deleted());
    }

    #[test]
    fn snapshots_are_isolated() {
        let store = MemoryRevisionStore::new();
        let first = store.put("doc", None, body(1), false).unwrap();
        store.put("doc", Some(first.rev_id()), body(2), false).unwrap();
        assert_eq!(first.tree().len(), 1);
        assert!(first.is_current());
    }

    #[test]
    fn grafting_creates_conflict_and_resolution_closes_it() {
        let store = MemoryRevisionStore::new();
        let first = store.put("doc", None, body(1), false).unwrap();
        let mine = store.put("doc", Some(first.rev_id()), body(2), false).unwrap();
        let theirs = store
            .insert_existing("doc", "2-ffff".into(), Some(first.rev_id()), body(3), false)
            .unwrap();

        let leaves = store.conflicting_leaves("doc").unwrap();
        assert_eq!(leaves.len(), 2);

        let merged = store
            .resolve_conflict("doc", mine.rev_id(), theirs.rev_id(), Bytes::from_static(&[0xa0]))
            .unwrap();
        assert_eq!(merged.generation(), 3);
        assert!(merged.is_current());
        assert!(store.conflicting_leaves("doc").unwrap().is_empty());
    }

    #[test]
    fn graft_validates_generation() {
        let store = MemoryRevisionStore::new();
        let first = store.put("doc", None, body(1), false).unwrap();
        assert!(matches!(
            store.insert_existing("doc", "3-abc".into(), Some(first.rev_id()), body(2), false),
            Err(CoreError::InvalidOperation { .. })
        ));
        let again = store
            .insert_existing("doc", first.rev_id().clone(), None, body(9), false)
            .unwrap();
        assert_eq!(again.rev_id(), first.rev_id());
    }
}
