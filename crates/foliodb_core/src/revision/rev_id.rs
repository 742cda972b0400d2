//! Revision identifiers.

use sha2::{Digest, Sha256};
use std::fmt;

/// Number of leading characters examined for the generation prefix.
pub const MAX_GENERATION_DIGITS: usize = 9;

/// Parses the generation number from the front of a revision ID.
///
/// Decimal digits are read up to the first `-`, looking at no more than
/// [`MAX_GENERATION_DIGITS`] characters. Returns 0 if a non-digit comes
/// first or no `-` appears within that window.
///
/// ```
/// use foliodb_core::generation_from_rev_id;
///
/// assert_eq!(generation_from_rev_id("3-abcf"), 3);
/// assert_eq!(generation_from_rev_id("-abc"), 0);
/// assert_eq!(generation_from_rev_id("12x-a"), 0);
/// ```
pub fn generation_from_rev_id(rev_id: &str) -> u64 {
    let mut generation = 0u64;
    for byte in rev_id.bytes().take(MAX_GENERATION_DIGITS) {
        match byte {
            b'0'..=b'9' => generation = generation * 10 + u64::from(byte - b'0'),
            b'-' => return generation,
            _ => break,
        }
    }
    0
}

/// Identifier of one revision of a document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RevisionId(String);

impl RevisionId {
    /// Wraps an existing revision ID string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives the ID of a new revision from its parent and content.
    ///
    /// The digest covers the parent ID, the deletion flag and the body, so
    /// identical edits of the same parent produce identical IDs.
    pub(crate) fn derive(parent: Option<&RevisionId>, deleted: bool, body: &[u8], digest_len: usize) -> Self {
        let generation = parent.map_or(0, RevisionId::generation) + 1;
        let mut hasher = Sha256::new();
        if let Some(parent) = parent {
            hasher.update(parent.as_str().as_bytes());
        }
        hasher.update([u8::from(deleted)]);
        hasher.update(body);
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        let len = digest_len.clamp(1, hex.len());
        Self(format!("{generation}-{}", &hex[..len]))
    }

    /// The ID as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The generation prefix; see [`generation_from_rev_id`].
    pub fn generation(&self) -> u64 {
        generation_from_rev_id(&self.0)
    }

    /// The part after the first `-`, or the whole ID if there is none.
    pub fn digest(&self) -> &str {
        self.0.split_once('-').map_or(self.0.as_str(), |(_, digest)| digest)
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RevisionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RevisionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_generation_prefix() {
        assert_eq!(generation_from_rev_id("3-abcf"), 3);
        assert_eq!(generation_from_rev_id("10-x"), 10);
        assert_eq!(generation_from_rev_id("12345678-a"), 12_345_678);
    }

    #[test]
    fn malformed_prefixes_yield_zero() {
        assert_eq!(generation_from_rev_id("-abc"), 0);
        assert_eq!(generation_from_rev_id(""), 0);
        assert_eq!(generation_from_rev_id("42"), 0);
        assert_eq!(generation_from_rev_id("4a-b"), 0);
        assert_eq!(generation_from_rev_id("123456789-a"), 0);
        assert_eq!(generation_from_rev_id("é-1"), 0);
    }

    #[test]
    fn derived_ids_advance_generation() {
        let first = RevisionId::derive(None, false, b"body", 16);
        assert_eq!(first.generation(), 1);
        assert_eq!(first.digest().len(), 16);

        let second = RevisionId::derive(Some(&first), false, b"body", 16);
        assert_eq!(second.generation(), 2);
        assert_ne!(first.digest(), second.digest());
    }

    #[test]
    fn derived_ids_depend_on_content() {
        let parent = RevisionId::new("1-aa");
        let a = RevisionId::derive(Some(&parent), false, b"x", 8);
        let b = RevisionId::derive(Some(&parent), false, b"x", 8);
        let c = RevisionId::derive(Some(&parent), true, b"x", 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    proptest! {
        #[test]
        fn generation_round_trips(generation in 0u64..100_000_000, digest in "[0-9a-f]{1,12}") {
            let id = format!("{generation}-{digest}");
            prop_assert_eq!(generation_from_rev_id(&id), generation);
        }

        #[test]
        fn nine_digits_without_separator_yield_zero(digits in "[0-9]{9}", tail in "[^-]{0,4}") {
            let id = format!("{digits}{tail}");
            prop_assert_eq!(generation_from_rev_id(&id), 0);
        }

        #[test]
        fn leading_non_digit_yields_zero(head in "[^0-9]", rest in ".{0,8}") {
            let id = format!("{head}{rest}");
            prop_assert_eq!(generation_from_rev_id(&id), 0);
        }
    }
}
