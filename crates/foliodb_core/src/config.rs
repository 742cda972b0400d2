//! Database configuration.

/// Order in which dictionary keys are reported by `keys()` and iteration.
///
/// Encoded bodies are always written in canonical key order; this only
/// affects what callers observe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyOrder {
    /// Canonical order: shorter keys first, then bytewise.
    #[default]
    Canonical,
    /// Stored keys in canonical order, followed by newly added keys in
    /// the order they were first set.
    Insertion,
}

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Key order reported by dictionaries of this database.
    pub key_order: KeyOrder,

    /// Whether `select_next_leaf_revision` also visits deleted leaves.
    pub include_deleted_leaves: bool,

    /// Whether a save that hits a conflict asks the resolver for a merge
    /// instead of failing.
    pub resolve_conflicts_on_save: bool,

    /// Maximum resolver invocations for one `resolve_conflicts` call.
    pub max_resolve_rounds: usize,

    /// Number of hex digits kept from the revision digest.
    pub revision_digest_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            key_order: KeyOrder::Canonical,
            include_deleted_leaves: false,
            resolve_conflicts_on_save: true,
            max_resolve_rounds: 16,
            revision_digest_len: 16,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key order reported by dictionaries.
    #[must_use]
    pub const fn key_order(mut self, order: KeyOrder) -> Self {
        self.key_order = order;
        self
    }

    /// Sets whether leaf iteration visits deleted leaves.
    #[must_use]
    pub const fn include_deleted_leaves(mut self, value: bool) -> Self {
        self.include_deleted_leaves = value;
        self
    }

    /// Sets whether conflicting saves are resolved automatically.
    #[must_use]
    pub const fn resolve_conflicts_on_save(mut self, value: bool) -> Self {
        self.resolve_conflicts_on_save = value;
        self
    }

    /// Sets the resolver round limit.
    #[must_use]
    pub const fn max_resolve_rounds(mut self, rounds: usize) -> Self {
        self.max_resolve_rounds = rounds;
        self
    }

    /// Sets the revision digest length, clamped to 1..=64 hex digits.
    #[must_use]
    pub const fn revision_digest_len(mut self, len: usize) -> Self {
        self.revision_digest_len = if len == 0 {
            1
        } else if len > 64 {
            64
        } else {
            len
        };
        self
    }
}
