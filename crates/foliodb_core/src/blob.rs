//! Binary values stored inside documents.

use bytes::Bytes;
use std::fmt;

/// An immutable byte string held in a document.
///
/// Blobs read from a stored body share that body's buffer.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Blob {
    content: Bytes,
}

impl Blob {
    /// Creates a blob from its content.
    pub fn new(content: impl Into<Bytes>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// The blob's bytes.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// A shared handle to the blob's bytes.
    pub fn to_bytes(&self) -> Bytes {
        self.content.clone()
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// True if the blob has no content.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blob({} bytes)", self.content.len())
    }
}

impl From<Vec<u8>> for Blob {
    fn from(content: Vec<u8>) -> Self {
        Self::new(content)
    }
}

impl From<&[u8]> for Blob {
    fn from(content: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(content))
    }
}
