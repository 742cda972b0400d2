//! # FolioDB Core
//!
//! Document model for FolioDB, an embedded document database.
//!
//! This crate provides:
//! - Lazy copy-on-write [`Array`] and [`Dictionary`] overlays over stored
//!   canonical CBOR bodies
//! - [`Document`] and [`MutableDocument`] views of a document's revisions
//! - Revision trees, selection handles and the [`RevisionStore`] trait
//! - Conflict arbitration through a pluggable [`ConflictResolver`]
//!
//! Reading a document decodes only the values that are touched. Editing a
//! copy never alters the stored bytes, and saving re-encodes only the
//! parts that changed.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod arbiter;
mod blob;
mod collection;
mod config;
mod conflict;
mod context;
mod database;
mod document;
mod error;
mod revision;
mod slot;
mod types;
mod value;

pub use blob::Blob;
pub use collection::{Array, ArrayIter, DictIter, Dictionary};
pub use config::{Config, KeyOrder};
pub use conflict::{Conflict, ConflictResolver, DefaultConflictResolver};
pub use context::RootContext;
pub use database::Database;
pub use document::{Document, DocumentState, MutableDocument};
pub use error::{CoreError, CoreResult};
pub use revision::{
    generation_from_rev_id, MemoryRevisionStore, Revision, RevisionHandle, RevisionId,
    RevisionStore, RevisionTree, DEFAULT_DIGEST_LEN, MAX_GENERATION_DIGITS,
};
pub use types::SequenceNumber;
pub use value::DocValue;
