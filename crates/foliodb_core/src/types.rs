//! Core type definitions for FolioDB.

use std::fmt;

/// Sequence number assigned by the store to each persisted revision.
///
/// Higher sequence numbers indicate later writes. Zero means "never
/// persisted".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// Creates a new sequence number.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw sequence value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next sequence number.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_number_next() {
        assert_eq!(SequenceNumber::new(5).next().as_u64(), 6);
        assert!(SequenceNumber::new(1) < SequenceNumber::new(2));
    }

    #[test]
    fn sequence_number_display() {
        assert_eq!(format!("{}", SequenceNumber::new(42)), "seq:42");
    }
}
