//! Database facade.

use crate::arbiter;
use crate::config::Config;
use crate::conflict::{ConflictResolver, DefaultConflictResolver};
use crate::context::{RootContext, SharedLock};
use crate::document::{Document, MutableDocument};
use crate::error::{CoreError, CoreResult};
use crate::revision::{MemoryRevisionStore, RevisionStore};
use parking_lot::{ReentrantMutex, RwLock};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// State shared by every clone of a [`Database`].
pub(crate) struct DatabaseShared {
    name: String,
    config: Config,
    store: Arc<dyn RevisionStore>,
    lock: SharedLock,
    resolver: RwLock<Option<Arc<dyn ConflictResolver>>>,
}

impl DatabaseShared {
    pub(crate) fn lock(&self) -> &SharedLock {
        &self.lock
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }
}

/// The main database handle.
///
/// `Database` is cheap to clone; clones share the store, the conflict
/// resolver and the lock that serializes access to every document tree
/// read from this database.
///
/// # Example
///
/// ```
/// use foliodb_core::{Database, MutableDocument};
///
/// let db = Database::open_in_memory();
/// let mut doc = MutableDocument::new("note");
/// doc.set("title", "hello")?;
/// let saved = db.save(&mut doc)?;
///
/// let loaded = db.get_document("note", true)?;
/// assert_eq!(loaded.get_string("title")?.as_deref(), Some("hello"));
/// assert_eq!(loaded.rev_id(), saved.rev_id());
/// # Ok::<(), foliodb_core::CoreError>(())
/// ```
#[derive(Clone)]
pub struct Database {
    shared: Arc<DatabaseShared>,
}

impl Database {
    /// Opens an empty in-memory database with default configuration.
    pub fn open_in_memory() -> Self {
        Self::open_in_memory_with_config(Config::default())
    }

    /// Opens an empty in-memory database with custom configuration.
    pub fn open_in_memory_with_config(config: Config) -> Self {
        let store = Arc::new(MemoryRevisionStore::with_digest_len(config.revision_digest_len));
        Self::with_store("memory", config, store)
    }

    /// Opens a database over an existing revision store.
    pub fn with_store(name: impl Into<String>, config: Config, store: Arc<dyn RevisionStore>) -> Self {
        let name = name.into();
        debug!(name = %name, "opening database");
        Self {
            shared: Arc::new(DatabaseShared {
                name,
                config,
                store,
                lock: Arc::new(ReentrantMutex::new(())),
                resolver: RwLock::new(None),
            }),
        }
    }

    pub(crate) fn from_shared(shared: Arc<DatabaseShared>) -> Self {
        Self { shared }
    }

    /// The database's name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The configuration the database was opened with.
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// The underlying revision store.
    pub fn store(&self) -> &Arc<dyn RevisionStore> {
        &self.shared.store
    }

    /// True if both handles refer to the same database.
    pub fn ptr_eq(&self, other: &Database) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// A new root context bound to this database.
    pub(crate) fn new_context(&self) -> Arc<RootContext> {
        RootContext::for_database(&self.shared)
    }

    /// Loads a document with its current revision selected.
    ///
    /// A document that was never saved loads as an empty, unloaded
    /// document, unless `must_exist` is set.
    ///
    /// # Errors
    ///
    /// Returns `DocumentNotFound` if `must_exist` is set and the document
    /// has no revisions, or a data format error if the current body is
    /// corrupt.
    pub fn get_document(&self, id: &str, must_exist: bool) -> CoreResult<Document> {
        let handle = self.store().load(id)?;
        if must_exist && handle.is_none() {
            return Err(CoreError::DocumentNotFound { id: id.to_owned() });
        }
        Document::from_handle(
            self.new_context(),
            id,
            handle,
            self.config().include_deleted_leaves,
        )
    }

    /// Loads a document if it has ever been saved.
    pub fn document(&self, id: &str) -> CoreResult<Option<Document>> {
        match self.get_document(id, true) {
            Ok(doc) => Ok(Some(doc)),
            Err(CoreError::DocumentNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Creates a new, never-saved document bound to this database.
    ///
    /// Unlike [`MutableDocument::new`], its dictionaries share the
    /// database lock and report keys in the configured [`KeyOrder`] from
    /// the first edit.
    ///
    /// [`KeyOrder`]: crate::KeyOrder
    pub fn new_document(&self, id: impl Into<String>) -> MutableDocument {
        MutableDocument::in_context(id, self.new_context())
    }

    /// Saves `doc` as a new revision and rebases it onto that revision.
    ///
    /// A detached document is first re-bound to this database, after
    /// which its keys follow the configured key order.
    ///
    /// If another revision was saved since `doc` was loaded, the conflict
    /// resolver merges the two (unless disabled in [`Config`]).
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the base is stale and automatic resolution is
    /// disabled, or `ConflictUnresolved` if the resolver declines.
    pub fn save(&self, doc: &mut MutableDocument) -> CoreResult<Document> {
        let _guard = self.shared.lock.lock();
        doc.attach(&self.new_context());
        let body = doc.encode()?;
        let parent = doc.base_rev_id().cloned();

        let handle = match self.store().put(doc.id(), parent.as_ref(), Some(body.clone()), false) {
            Ok(handle) => handle,
            Err(CoreError::Conflict { .. }) if self.config().resolve_conflicts_on_save => {
                debug!(doc_id = doc.id(), "save conflicted; resolving");
                arbiter::resolve_on_save(self, doc, body)?
            }
            Err(e) => return Err(e),
        };

        doc.rebase(handle.clone())?;
        Document::from_handle(
            self.new_context(),
            doc.id(),
            Some(handle),
            self.config().include_deleted_leaves,
        )
    }

    /// Deletes the document by adding a deletion revision on top of the
    /// one `doc` has selected.
    ///
    /// # Errors
    ///
    /// Returns `DocumentNotFound` if `doc` was never saved, and `Conflict`
    /// if its revision is no longer a leaf.
    pub fn delete(&self, doc: &Document) -> CoreResult<Document> {
        let _guard = self.shared.lock.lock();
        let Some(parent) = doc.rev_id() else {
            return Err(CoreError::DocumentNotFound {
                id: doc.id().to_owned(),
            });
        };
        let handle = self.store().put(doc.id(), Some(parent), None, true)?;
        Document::from_handle(
            self.new_context(),
            doc.id(),
            Some(handle),
            self.config().include_deleted_leaves,
        )
    }

    /// Resolves every conflict among the stored leaves of `id`.
    ///
    /// # Errors
    ///
    /// Returns `ConflictUnresolved` if the resolver declines or the
    /// conflicts outlast `max_resolve_rounds`, and a data format error if
    /// a competing leaf's body cannot be decoded.
    pub fn resolve_conflicts(&self, id: &str) -> CoreResult<Document> {
        let _guard = self.shared.lock.lock();
        arbiter::resolve_stored(self, id)
    }

    /// Installs a conflict resolver, or restores the default with `None`.
    pub fn set_conflict_resolver(&self, resolver: Option<Arc<dyn ConflictResolver>>) {
        *self.shared.resolver.write() = resolver;
    }

    /// The configured conflict resolver, if any.
    pub fn conflict_resolver(&self) -> Option<Arc<dyn ConflictResolver>> {
        self.shared.resolver.read().clone()
    }

    /// The configured resolver, or [`DefaultConflictResolver`].
    pub fn effective_conflict_resolver(&self) -> Arc<dyn ConflictResolver> {
        self.conflict_resolver()
            .unwrap_or_else(|| Arc::new(DefaultConflictResolver))
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.shared.name)
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}
