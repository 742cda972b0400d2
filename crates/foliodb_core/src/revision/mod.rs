//! Revision history, selection and storage.
//!
//! Every saved change to a document is a revision identified by a
//! [`RevisionId`] of the form `"<generation>-<digest>"`. Revisions form a
//! tree per document; leaves are the tips of its branches. A
//! [`RevisionHandle`] views one immutable snapshot of that tree with one
//! revision selected, and can move its selection across leaves or onto the
//! common ancestor of two revisions.

mod handle;
mod memory;
mod rev_id;
mod store;
mod tree;

pub use handle::RevisionHandle;
pub use memory::{MemoryRevisionStore, DEFAULT_DIGEST_LEN};
pub use rev_id::{generation_from_rev_id, RevisionId, MAX_GENERATION_DIGITS};
pub use store::RevisionStore;
pub use tree::{Revision, RevisionTree};
