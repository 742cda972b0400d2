//! Conflict arbitration: finding competing revisions and writing the
//! resolver's answer back to the store.

use crate::conflict::Conflict;
use crate::database::Database;
use crate::document::{Document, MutableDocument};
use crate::error::{CoreError, CoreResult};
use crate::revision::RevisionHandle;
use bytes::Bytes;
use tracing::{debug, warn};

/// Resolves conflicts among the stored leaves of `doc_id` until one live
/// leaf remains, and returns the resulting current document.
pub(crate) fn resolve_stored(db: &Database, doc_id: &str) -> CoreResult<Document> {
    let max_rounds = db.config().max_resolve_rounds;
    for round in 0..=max_rounds {
        let mine = db.get_document(doc_id, true)?;
        let Some(mine_handle) = mine.handle().cloned() else {
            return Ok(mine);
        };
        let mut theirs_handle = mine_handle.clone();
        if !theirs_handle.select_next_leaf(false) {
            return Ok(mine);
        }
        if round == max_rounds {
            break;
        }
        if mine_handle.is_related_to(&theirs_handle) {
            return Err(CoreError::invalid_operation(format!(
                "revisions {} and {} are on one branch",
                mine_handle.rev_id(),
                theirs_handle.rev_id()
            )));
        }
        let (winner, loser) = (mine_handle.rev_id().clone(), theirs_handle.rev_id().clone());
        // an undecodable leaf is an error, not the absence of a conflict
        let theirs = Document::from_handle(db.new_context(), doc_id, Some(theirs_handle), false)?;
        let conflict = with_base(db, mine, theirs)?;
        let body = ask_resolver(db, &conflict)?;
        db.store().resolve_conflict(doc_id, &winner, &loser, body)?;
        debug!(doc_id, round, %winner, %loser, "closed conflicting branch");
    }
    warn!(doc_id, max_rounds, "conflict resolution did not converge");
    Err(CoreError::ConflictUnresolved {
        id: doc_id.to_owned(),
    })
}

/// Handles a save that lost a race: merges the edit with the current
/// revision and stores the merge on top of it.
pub(crate) fn resolve_on_save(db: &Database, doc: &MutableDocument, body: Bytes) -> CoreResult<RevisionHandle> {
    let max_rounds = db.config().max_resolve_rounds.max(1);
    for _ in 0..max_rounds {
        let theirs = db.get_document(doc.id(), true)?;
        let Some(theirs_rev) = theirs.rev_id().cloned() else {
            return Err(CoreError::DocumentNotFound {
                id: doc.id().to_owned(),
            });
        };
        let mine = Document::unsaved(db.new_context(), doc.id(), doc.base().cloned(), body.clone())?;
        let conflict = with_base(db, mine, theirs)?;
        let merged = ask_resolver(db, &conflict)?;
        match db.store().put(doc.id(), Some(&theirs_rev), Some(merged), false) {
            Ok(handle) => {
                debug!(doc_id = doc.id(), parent = %theirs_rev, rev_id = %handle.rev_id(), "saved merged revision");
                return Ok(handle);
            }
            Err(CoreError::Conflict { .. }) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(CoreError::ConflictUnresolved {
        id: doc.id().to_owned(),
    })
}

fn with_base(db: &Database, mine: Document, theirs: Document) -> CoreResult<Conflict> {
    let (Some(mut handle), Some(rev_a), Some(rev_b)) = (theirs.handle().cloned(), mine.rev_id(), theirs.rev_id())
    else {
        return Ok(Conflict::new(mine, theirs, None));
    };
    let base = if handle.select_common_ancestor(rev_a, rev_b) {
        Some(Document::from_handle(db.new_context(), theirs.id(), Some(handle), false)?)
    } else {
        None
    };
    Ok(Conflict::new(mine, theirs, base))
}

fn ask_resolver(db: &Database, conflict: &Conflict) -> CoreResult<Bytes> {
    let resolver = db.effective_conflict_resolver();
    match resolver.resolve(conflict) {
        Some(resolved) => Ok(Bytes::from(resolved.encode()?)),
        None => {
            warn!(doc_id = conflict.doc_id(), "conflict resolver declined");
            Err(CoreError::ConflictUnresolved {
                id: conflict.doc_id().to_owned(),
            })
        }
    }
}
