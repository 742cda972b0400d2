//! Conflict description and pluggable resolution.

use crate::collection::Dictionary;
use crate::document::Document;
use std::cmp::Ordering;

/// Two competing revisions of a document, and their common ancestor.
#[derive(Debug, Clone)]
pub struct Conflict {
    mine: Document,
    theirs: Document,
    base: Option<Document>,
}

impl Conflict {
    pub(crate) fn new(mine: Document, theirs: Document, base: Option<Document>) -> Self {
        Self { mine, theirs, base }
    }

    /// The conflicting document's ID.
    pub fn doc_id(&self) -> &str {
        self.mine.id()
    }

    /// The local side: the current revision, or the edit being saved.
    pub fn mine(&self) -> &Document {
        &self.mine
    }

    /// The other side.
    pub fn theirs(&self) -> &Document {
        &self.theirs
    }

    /// The nearest common ancestor, if the two sides share one.
    pub fn base(&self) -> Option<&Document> {
        self.base.as_ref()
    }
}

/// Chooses or builds the body that ends a conflict.
///
/// Return one side's properties to pick it, or a new dictionary holding a
/// merge. Returning `None` declines; the conflict then stays in place and
/// the triggering operation fails with `ConflictUnresolved`.
///
/// # Example
///
/// ```
/// use foliodb_core::{Conflict, ConflictResolver, Dictionary};
///
/// struct TheirsWins;
///
/// impl ConflictResolver for TheirsWins {
///     fn resolve(&self, conflict: &Conflict) -> Option<Dictionary> {
///         Some(conflict.theirs().properties().clone())
///     }
/// }
/// ```
pub trait ConflictResolver: Send + Sync {
    /// Resolves `conflict`.
    fn resolve(&self, conflict: &Conflict) -> Option<Dictionary>;
}

/// Resolver used when a database has none configured.
///
/// A live revision beats a deletion. Otherwise the higher generation wins,
/// and equal generations go to the greater revision ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConflictResolver;

impl DefaultConflictResolver {
    /// The side this resolver picks.
    pub fn winner<'a>(&self, conflict: &'a Conflict) -> &'a Document {
        let (mine, theirs) = (conflict.mine(), conflict.theirs());
        match (mine.is_deleted(), theirs.is_deleted()) {
            (false, true) => mine,
            (true, false) => theirs,
            _ => match mine.generation().cmp(&theirs.generation()) {
                Ordering::Greater => mine,
                Ordering::Less => theirs,
                Ordering::Equal if mine.rev_id() >= theirs.rev_id() => mine,
                Ordering::Equal => theirs,
            },
        }
    }
}

impl ConflictResolver for DefaultConflictResolver {
    fn resolve(&self, conflict: &Conflict) -> Option<Dictionary> {
        Some(self.winner(conflict).properties().clone())
    }
}
