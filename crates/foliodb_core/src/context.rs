//! Root contexts: the per-tree record of owning database and lock.

use crate::config::KeyOrder;
use crate::database::{Database, DatabaseShared};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::fmt;
use std::sync::{Arc, Weak};

/// Lock serializing every access to the overlay trees of one database.
///
/// Reentrant so that an accessor on a parent collection can call into
/// its children while holding it.
pub(crate) type SharedLock = Arc<ReentrantMutex<()>>;

/// Context shared by every overlay in one tree.
///
/// A document-rooted tree gets its own context, whose lock is the owning
/// database's lock. Collections created standalone get a detached context
/// with a fresh lock. The context does not keep the database alive.
pub struct RootContext {
    database: Weak<DatabaseShared>,
    attached: bool,
    lock: SharedLock,
    key_order: KeyOrder,
}

impl RootContext {
    /// Creates a context that belongs to no database.
    pub(crate) fn detached() -> Arc<Self> {
        Arc::new(Self {
            database: Weak::new(),
            attached: false,
            lock: Arc::new(ReentrantMutex::new(())),
            key_order: KeyOrder::default(),
        })
    }

    /// Creates a context bound to a database and sharing its lock.
    pub(crate) fn for_database(shared: &Arc<DatabaseShared>) -> Arc<Self> {
        Arc::new(Self {
            database: Arc::downgrade(shared),
            attached: true,
            lock: Arc::clone(shared.lock()),
            key_order: shared.config().key_order,
        })
    }

    /// A fresh context with the same database, lock and key order.
    ///
    /// Used when a document rebuilds its tree for another revision.
    pub(crate) fn sibling(&self) -> Arc<Self> {
        Arc::new(Self {
            database: Weak::clone(&self.database),
            attached: self.attached,
            lock: Arc::clone(&self.lock),
            key_order: self.key_order,
        })
    }

    /// Acquires the shared lock for the duration of the guard.
    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.lock.lock()
    }

    /// The owning database, if it is still open.
    pub fn database(&self) -> Option<Database> {
        self.database.upgrade().map(Database::from_shared)
    }

    /// True if this context was created outside any database.
    pub fn is_detached(&self) -> bool {
        !self.attached
    }

    /// Key order reported by dictionaries in this tree.
    pub fn key_order(&self) -> KeyOrder {
        self.key_order
    }

    /// True if both contexts serialize on the same lock.
    pub fn shares_lock_with(&self, other: &RootContext) -> bool {
        Arc::ptr_eq(&self.lock, &other.lock)
    }
}

impl fmt::Debug for RootContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootContext")
            .field("detached", &self.is_detached())
            .field("key_order", &self.key_order)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_contexts_have_distinct_locks() {
        let a = RootContext::detached();
        let b = RootContext::detached();
        assert!(a.is_detached());
        assert!(a.database().is_none());
        assert!(!a.shares_lock_with(&b));
        assert!(a.shares_lock_with(&a));
    }

    #[test]
    fn sibling_shares_lock() {
        let ctx = RootContext::detached();
        let sibling = ctx.sibling();
        assert!(ctx.shares_lock_with(&sibling));
        assert!(!Arc::ptr_eq(&ctx, &sibling));
    }

    #[test]
    fn lock_is_reentrant() {
        let ctx = RootContext::detached();
        let _outer = ctx.lock();
        let _inner = ctx.lock();
    }
}
