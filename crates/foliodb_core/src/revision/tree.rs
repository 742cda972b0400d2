//! Per-document revision trees.

use super::rev_id::RevisionId;
use crate::types::SequenceNumber;
use bytes::Bytes;
use std::cmp::Ordering;
use std::collections::HashSet;

/// One node of a revision tree.
#[derive(Debug, Clone)]
pub struct Revision {
    /// The revision's ID.
    pub rev_id: RevisionId,
    /// Index of the parent revision in the tree, if any.
    pub parent: Option<usize>,
    /// Store-assigned sequence of the write that added this revision.
    pub sequence: SequenceNumber,
    /// True for a deletion marker.
    pub deleted: bool,
    /// Encoded body; `None` for deletions and for bodies no longer kept.
    pub body: Option<Bytes>,
}

/// The history of one document: its revisions and their parent links.
///
/// Trees handed out by a store are snapshots; later writes build a new
/// tree and leave existing snapshots untouched.
#[derive(Debug, Clone)]
pub struct RevisionTree {
    doc_id: String,
    revs: Vec<Revision>,
}

impl RevisionTree {
    /// Creates an empty tree for `doc_id`.
    pub fn new(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            revs: Vec::new(),
        }
    }

    /// The document this tree belongs to.
    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    /// Number of revisions.
    pub fn len(&self) -> usize {
        self.revs.len()
    }

    /// True if the tree has no revisions.
    pub fn is_empty(&self) -> bool {
        self.revs.is_empty()
    }

    /// The revision at `index`.
    pub fn get(&self, index: usize) -> Option<&Revision> {
        self.revs.get(index)
    }

    /// The revision at `index`, which must be in the tree.
    pub(crate) fn rev(&self, index: usize) -> &Revision {
        &self.revs[index]
    }

    /// Index of the revision with ID `rev_id`.
    pub fn find(&self, rev_id: &RevisionId) -> Option<usize> {
        self.revs.iter().position(|rev| &rev.rev_id == rev_id)
    }

    /// True if no revision names `index` as its parent.
    pub fn is_leaf(&self, index: usize) -> bool {
        index < self.revs.len() && !self.revs.iter().any(|rev| rev.parent == Some(index))
    }

    /// Leaf indices in selection order.
    ///
    /// Live leaves come before deleted ones; within each group higher
    /// generations come first, then greater revision IDs, then later
    /// sequences. The first entry is the document's current revision.
    pub fn leaves(&self) -> Vec<usize> {
        let mut has_child = vec![false; self.revs.len()];
        for rev in &self.revs {
            if let Some(parent) = rev.parent {
                has_child[parent] = true;
            }
        }
        let mut leaves: Vec<usize> = (0..self.revs.len()).filter(|&i| !has_child[i]).collect();
        leaves.sort_by(|&a, &b| self.cmp_priority(a, b));
        leaves
    }

    /// Index of the current revision: the first leaf in selection order.
    pub fn current(&self) -> Option<usize> {
        self.leaves().first().copied()
    }

    /// `index` followed by each of its ancestors, nearest first.
    pub fn ancestry(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(
            (index < self.revs.len()).then_some(index),
            move |&i| self.revs[i].parent,
        )
    }

    /// True if `ancestor` lies on the path from `descendant` to the root.
    pub fn is_ancestor(&self, ancestor: usize, descendant: usize) -> bool {
        ancestor != descendant && self.ancestry(descendant).any(|i| i == ancestor)
    }

    /// The nearest revision that is an ancestor of (or equal to) both.
    pub fn common_ancestor(&self, a: usize, b: usize) -> Option<usize> {
        let of_a: HashSet<usize> = self.ancestry(a).collect();
        self.ancestry(b).find(|i| of_a.contains(i))
    }

    /// Appends a revision and returns its index.
    pub(crate) fn push(&mut self, rev: Revision) -> usize {
        self.revs.push(rev);
        self.revs.len() - 1
    }

    fn cmp_priority(&self, a: usize, b: usize) -> Ordering {
        let (ra, rb) = (&self.revs[a], &self.revs[b]);
        ra.deleted
            .cmp(&rb.deleted)
            .then_with(|| rb.rev_id.generation().cmp(&ra.rev_id.generation()))
            .then_with(|| rb.rev_id.cmp(&ra.rev_id))
            .then_with(|| rb.sequence.cmp(&ra.sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rev(id: &str, parent: Option<usize>, seq: u64, deleted: bool) -> Revision {
        Revision {
            rev_id: RevisionId::new(id),
            parent,
            sequence: SequenceNumber::new(seq),
            deleted,
            body: None,
        }
    }

    /// 1-a -> 2-b -> 3-c
    ///          \-> 3-d
    fn forked() -> RevisionTree {
        let mut tree = RevisionTree::new("doc");
        tree.push(rev("1-a", None, 1, false));
        tree.push(rev("2-b", Some(0), 2, false));
        tree.push(rev("3-c", Some(1), 3, false));
        tree.push(rev("3-d", Some(1), 4, false));
        tree
    }

    #[test]
    fn leaves_are_ordered_by_priority() {
        let tree = forked();
        assert_eq!(tree.leaves(), vec![3, 2]);
        assert_eq!(tree.current(), Some(3));
        assert!(tree.is_leaf(2));
        assert!(!tree.is_leaf(1));
        assert!(!tree.is_leaf(9));
    }

    #[test]
    fn live_leaves_beat_deleted_ones() {
        let mut tree = forked();
        tree.push(rev("4-z", Some(3), 5, true));
        assert_eq!(tree.leaves(), vec![2, 4]);
        assert_eq!(tree.current(), Some(2));
    }

    #[test]
    fn higher_generation_wins() {
        let mut tree = forked();
        tree.push(rev("4-0", Some(2), 5, false));
        assert_eq!(tree.current(), Some(4));
    }

    #[test]
    fn common_ancestor_of_branches() {
        let tree = forked();
        assert_eq!(tree.common_ancestor(2, 3), Some(1));
        assert_eq!(tree.common_ancestor(2, 1), Some(1));
        assert_eq!(tree.common_ancestor(0, 0), Some(0));
        assert!(tree.is_ancestor(0, 3));
        assert!(!tree.is_ancestor(2, 3));
        assert!(!tree.is_ancestor(3, 3));
    }

    #[test]
    fn disjoint_roots_have_no_common_ancestor() {
        let mut tree = RevisionTree::new("doc");
        tree.push(rev("1-a", None, 1, false));
        tree.push(rev("1-b", None, 2, false));
        assert_eq!(tree.common_ancestor(0, 1), None);
        assert_eq!(tree.leaves(), vec![1, 0]);
    }

    #[test]
    fn ancestry_walks_to_root() {
        let tree = forked();
        assert_eq!(tree.ancestry(3).collect::<Vec<_>>(), vec![3, 1, 0]);
        assert_eq!(tree.ancestry(7).count(), 0);
    }
}
