//! Concurrent access to one database and to shared document trees.

use foliodb_testkit::prelude::*;
use serde_json::json;

#[test]
fn concurrent_saves_stay_on_one_branch() {
    let db = TestDatabase::memory();
    let config = StressConfig {
        operations: 50,
        threads: 4,
    };

    let result = stress_concurrent_saves(&db, "counter", &config);
    result.print_summary("concurrent saves");

    assert_eq!(result.failed_ops, 0);
    assert_eq!(result.successful_ops, config.operations * config.threads);

    let doc = db.get_document("counter", true).unwrap();
    assert_eq!(doc.generation(), 1 + u64::try_from(result.successful_ops).unwrap());
    assert!(db.store().conflicting_leaves("counter").unwrap().is_empty());
    assert!(doc.keys().iter().all(|k| k.starts_with('t')));
}

#[test]
fn shared_read_only_tree_survives_concurrent_copies() {
    with_temp_db(|db| {
        let doc = save_json(
            db,
            "tree",
            json!({
                "users": [{"name": "a", "tags": ["x", "y"]}, {"name": "b", "tags": []}],
                "meta": {"version": 3, "flags": {"beta": true}},
            }),
        );
        let before = doc.to_value().unwrap();

        let result = stress_shared_tree_reads(doc.properties(), &StressConfig::default());
        assert_eq!(result.failed_ops, 0);
        assert!(result.ops_per_second() > 0.0);

        assert_eq!(doc.to_value().unwrap(), before);
        assert!(!doc.contains("touched"));
    });
}

#[test]
fn documents_read_from_many_threads() {
    let db = TestDatabase::memory();
    let doc = save_json(&db, "doc", json!({"list": [1, 2, 3], "nested": {"k": "v"}}));

    std::thread::scope(|scope| {
        for _ in 0..4 {
            let doc = doc.clone();
            scope.spawn(move || {
                for _ in 0..100 {
                    let list = doc.get_array("list").unwrap().unwrap();
                    assert_eq!(list.get_int(2).unwrap(), 3);
                    let nested = doc.get_dictionary("nested").unwrap().unwrap();
                    assert_eq!(nested.get_string("k").unwrap().as_deref(), Some("v"));
                }
            });
        }
    });
}
