//! Revision store trait definition.

use super::handle::RevisionHandle;
use super::rev_id::RevisionId;
use crate::error::CoreResult;
use crate::types::SequenceNumber;
use bytes::Bytes;

/// Persistent home of every document's revision tree.
///
/// Stores hand out [`RevisionHandle`]s over immutable tree snapshots.
/// A write replaces the document's tree with a new snapshot; handles
/// loaded earlier keep seeing the old one.
///
/// # Invariants
///
/// - Every accepted revision gets a sequence greater than any before it
/// - A local write only extends a leaf, so it never creates a conflict
/// - `insert_existing` is the only way two live leaves can appear
///
/// # Implementors
///
/// - [`super::MemoryRevisionStore`] - In-memory store
pub trait RevisionStore: Send + Sync {
    /// Loads `doc_id` with its current revision selected.
    ///
    /// Returns `Ok(None)` if the document has never been written.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load(&self, doc_id: &str) -> CoreResult<Option<RevisionHandle>>;

    /// Handles on each live leaf of `doc_id`, winner first.
    ///
    /// Returns an empty list unless the document has two or more live
    /// leaves.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn conflicting_leaves(&self, doc_id: &str) -> CoreResult<Vec<RevisionHandle>>;

    /// Adds a local revision as a child of `parent`.
    ///
    /// With no parent, the write creates the document, or revives it if
    /// every leaf is deleted.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `Conflict` if `parent` is no longer a leaf, or is `None` while
    ///   the document has a live revision
    /// - `RevisionNotFound` if `parent` is not in the tree
    /// - `DocumentNotFound` when deleting a document that does not exist
    fn put(
        &self,
        doc_id: &str,
        parent: Option<&RevisionId>,
        body: Option<Bytes>,
        deleted: bool,
    ) -> CoreResult<RevisionHandle>;

    /// Grafts a revision created elsewhere, keeping its ID.
    ///
    /// The parent need not be a leaf, so this may fork the tree. Inserting
    /// a revision that is already present returns a handle on it.
    ///
    /// # Errors
    ///
    /// Returns `RevisionNotFound` if `parent` is missing and
    /// `InvalidOperation` if `rev_id` is not exactly one generation past
    /// its parent.
    fn insert_existing(
        &self,
        doc_id: &str,
        rev_id: RevisionId,
        parent: Option<&RevisionId>,
        body: Option<Bytes>,
        deleted: bool,
    ) -> CoreResult<RevisionHandle>;

    /// Closes a conflict between two live leaves.
    ///
    /// Appends `body` as a child of `winner` and a deletion as a child of
    /// `loser`, and returns a handle on the new winning revision.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if either revision is no longer a leaf.
    fn resolve_conflict(
        &self,
        doc_id: &str,
        winner: &RevisionId,
        loser: &RevisionId,
        body: Bytes,
    ) -> CoreResult<RevisionHandle>;

    /// The highest sequence assigned so far.
    fn last_sequence(&self) -> SequenceNumber;
}
