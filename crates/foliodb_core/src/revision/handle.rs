//! Selection cursor over a revision tree snapshot.

use super::rev_id::RevisionId;
use super::tree::{Revision, RevisionTree};
use crate::types::SequenceNumber;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// One revision selected in a snapshot of a document's revision tree.
///
/// Moving the selection never touches the store: the snapshot stays as it
/// was when the handle was loaded.
#[derive(Clone)]
pub struct RevisionHandle {
    tree: Arc<RevisionTree>,
    selected: usize,
}

impl RevisionHandle {
    /// Creates a handle selecting `selected`.
    ///
    /// Returns `None` if the index is not in the tree.
    pub fn new(tree: Arc<RevisionTree>, selected: usize) -> Option<Self> {
        (selected < tree.len()).then_some(Self { tree, selected })
    }

    /// Creates a handle for an index known to be in the tree.
    pub(crate) fn at(tree: Arc<RevisionTree>, selected: usize) -> Self {
        debug_assert!(selected < tree.len());
        Self { tree, selected }
    }

    /// Creates a handle selecting the tree's current revision.
    pub fn current(tree: Arc<RevisionTree>) -> Option<Self> {
        let selected = tree.current()?;
        Some(Self { tree, selected })
    }

    /// The tree snapshot this handle views.
    pub fn tree(&self) -> &Arc<RevisionTree> {
        &self.tree
    }

    /// The selected revision.
    pub fn revision(&self) -> &Revision {
        self.tree.rev(self.selected)
    }

    /// The document's ID.
    pub fn doc_id(&self) -> &str {
        self.tree.doc_id()
    }

    /// The selected revision's ID.
    pub fn rev_id(&self) -> &RevisionId {
        &self.revision().rev_id
    }

    /// The selected revision's generation.
    pub fn generation(&self) -> u64 {
        self.rev_id().generation()
    }

    /// The selected revision's sequence.
    pub fn sequence(&self) -> SequenceNumber {
        self.revision().sequence
    }

    /// True if the selected revision is a deletion.
    pub fn is_deleted(&self) -> bool {
        self.revision().deleted
    }

    /// The selected revision's body, if it has one.
    pub fn body(&self) -> Option<&Bytes> {
        self.revision().body.as_ref()
    }

    /// True if the selected revision is a leaf.
    pub fn is_leaf(&self) -> bool {
        self.tree.is_leaf(self.selected)
    }

    /// True if the selected revision is the tree's current revision.
    pub fn is_current(&self) -> bool {
        self.tree.current() == Some(self.selected)
    }

    /// True if one of the two selected revisions descends from the other.
    ///
    /// `other` is looked up by ID in this handle's snapshot.
    pub fn is_related_to(&self, other: &RevisionHandle) -> bool {
        match self.tree.find(other.rev_id()) {
            Some(index) => {
                index == self.selected
                    || self.tree.is_ancestor(index, self.selected)
                    || self.tree.is_ancestor(self.selected, index)
            }
            None => false,
        }
    }

    /// Handles selecting each leaf of the snapshot, in selection order.
    pub fn leaves(&self) -> Vec<RevisionHandle> {
        self.tree
            .leaves()
            .into_iter()
            .map(|selected| Self {
                tree: Arc::clone(&self.tree),
                selected,
            })
            .collect()
    }

    /// Moves the selection to the next leaf in selection order.
    ///
    /// From a revision that is not a visited leaf, the first visited leaf
    /// is selected. Deleted leaves are skipped unless `include_deleted`.
    /// Returns false, leaving the selection unchanged, when no further
    /// leaf exists.
    pub fn select_next_leaf(&mut self, include_deleted: bool) -> bool {
        let leaves: Vec<usize> = self
            .tree
            .leaves()
            .into_iter()
            .filter(|&i| include_deleted || self.tree.get(i).is_some_and(|rev| !rev.deleted))
            .collect();
        let next = match leaves.iter().position(|&i| i == self.selected) {
            Some(pos) => leaves.get(pos + 1),
            None => leaves.first(),
        };
        match next {
            Some(&next) => {
                self.selected = next;
                true
            }
            None => {
                debug!(doc_id = self.doc_id(), rev_id = %self.rev_id(), "no further leaf revision");
                false
            }
        }
    }

    /// Selects the revision with ID `rev_id`. Returns false if the
    /// snapshot does not contain it.
    pub fn select_revision(&mut self, rev_id: &RevisionId) -> bool {
        match self.tree.find(rev_id) {
            Some(index) => {
                self.selected = index;
                true
            }
            None => false,
        }
    }

    /// Selects the nearest common ancestor of `a` and `b`.
    ///
    /// Returns false, leaving the selection unchanged, if either revision
    /// is missing from this snapshot or the two share no ancestor.
    pub fn select_common_ancestor(&mut self, a: &RevisionId, b: &RevisionId) -> bool {
        let ancestor = self
            .tree
            .find(a)
            .zip(self.tree.find(b))
            .and_then(|(a, b)| self.tree.common_ancestor(a, b));
        match ancestor {
            Some(index) => {
                self.selected = index;
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for RevisionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RevisionHandle")
            .field("doc_id", &self.doc_id())
            .field("rev_id", self.rev_id())
            .field("deleted", &self.is_deleted())
            .finish()
    }
}
