//! Test fixtures and database helpers.
//!
//! Provides convenience functions for setting up test databases, building
//! document bodies from JSON, and staging conflicts.

use bytes::Bytes;
use foliodb_codec::{to_canonical_cbor, Value};
use foliodb_core::{Config, Database, DocValue, Document, MutableDocument, RevisionId};
use tracing_subscriber::EnvFilter;

/// A test database that lives in memory.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database,
}

impl TestDatabase {
    /// Creates a new in-memory test database.
    pub fn memory() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a new in-memory test database with custom configuration.
    pub fn with_config(config: Config) -> Self {
        init_test_logging();
        Self {
            db: Database::open_in_memory_with_config(config),
        }
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Routes `tracing` output to the test harness.
///
/// The filter comes from `RUST_LOG` and defaults to `debug` for FolioDB
/// crates. Safe to call from every test; only the first call installs
/// the subscriber.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("foliodb_core=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Runs a test with a temporary in-memory database.
pub fn with_temp_db<F, R>(f: F) -> R
where
    F: FnOnce(&Database) -> R,
{
    let test_db = TestDatabase::memory();
    f(&test_db.db)
}

/// Converts JSON into a plain value.
///
/// Numbers that fit an `i64` become integers; the rest become floats.
pub fn json_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => n.as_i64().map_or_else(
            || Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            Value::Integer,
        ),
        serde_json::Value::String(s) => Value::Text(s.clone()),
        serde_json::Value::Array(items) => Value::Array(items.iter().map(json_value).collect()),
        serde_json::Value::Object(map) => {
            Value::text_map(map.iter().map(|(k, v)| (k.clone(), json_value(v))))
        }
    }
}

/// Encodes a JSON object as a stored document body.
pub fn json_body(json: serde_json::Value) -> Bytes {
    let value = json_value(&json);
    assert!(value.as_map().is_some(), "document bodies must be objects");
    Bytes::from(to_canonical_cbor(&value).expect("Failed to encode body"))
}

/// Creates a mutable document holding the given JSON object.
pub fn mutable_from_json(id: &str, json: serde_json::Value) -> MutableDocument {
    let doc = MutableDocument::new(id);
    fill_from_json(&doc, &json);
    doc
}

/// Replaces every property of `doc` with the entries of a JSON object.
pub fn fill_from_json(doc: &MutableDocument, json: &serde_json::Value) {
    for key in doc.properties().keys() {
        doc.remove(&key).expect("document is mutable");
    }
    let value = json_value(json);
    for (key, item) in value.as_map().expect("document bodies must be objects") {
        let key = key.as_text().expect("object keys are text");
        let item = DocValue::from_value(item.clone()).expect("valid value");
        doc.set(key, item).expect("document is mutable");
    }
}

/// Saves a new document built from JSON and returns the stored view.
pub fn save_json(db: &Database, id: &str, json: serde_json::Value) -> Document {
    let mut doc = mutable_from_json(id, json);
    db.save(&mut doc).expect("Failed to save document")
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A document with two live leaves sharing one parent.
    pub struct ConflictedDocument {
        /// The first revision, parent of both leaves.
        pub base: Document,
        /// The leaf written through the database.
        pub local: RevisionId,
        /// The leaf grafted as if it came from elsewhere.
        pub remote: RevisionId,
    }

    /// Saves `base`, then forks it into a local edit and a grafted
    /// remote edit.
    pub fn conflicted_document(
        db: &Database,
        id: &str,
        base: serde_json::Value,
        local: serde_json::Value,
        remote: serde_json::Value,
    ) -> ConflictedDocument {
        let base = save_json(db, id, base);
        let mut edit = base.to_mutable();
        fill_from_json(&edit, &local);
        let local = db.save(&mut edit).expect("Failed to save local edit");

        let remote_rev = RevisionId::new(format!("{}-{}", base.generation() + 1, "f".repeat(32)));
        let remote = db
            .store()
            .insert_existing(id, remote_rev, base.rev_id(), Some(json_body(remote)), false)
            .expect("Failed to graft remote revision");

        ConflictedDocument {
            base,
            local: local.rev_id().expect("saved").clone(),
            remote: remote.rev_id().clone(),
        }
    }
}
