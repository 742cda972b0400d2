//! Lazy copy-on-write collections over stored document bodies.
//!
//! An [`Array`] or [`Dictionary`] is a handle onto an overlay: the stored
//! encoding it was read from plus whatever has been decoded or written
//! since. Reads decode only the element they touch. Writes land in the
//! overlay and never alter the stored bytes. Encoding reuses the stored
//! bytes of everything left untouched.
//!
//! Collections read from a saved revision are read-only; `to_mutable()`
//! returns an editable copy. Every accessor takes the lock of the
//! collection's [`RootContext`](crate::RootContext) first.

mod array;
mod dictionary;

pub use array::{Array, ArrayIter};
pub use dictionary::{DictIter, Dictionary};
