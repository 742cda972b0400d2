//! Property tests for copy-on-write document overlays.

use foliodb_codec::{to_canonical_cbor, Value};
use bytes::Bytes;
use foliodb_core::{Config, Database, DocValue, Document, KeyOrder, MutableDocument, RevisionId};
use foliodb_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeMap;

fn save_value(db: &Database, id: &str, body: &Value) -> Document {
    let DocValue::Dictionary(properties) = DocValue::from_value(body.clone()).unwrap() else {
        panic!("bodies are maps");
    };
    let mut doc = MutableDocument::with_properties(id, &properties);
    db.save(&mut doc).unwrap()
}

fn model_of(body: &Value) -> BTreeMap<String, Value> {
    body.as_map()
        .unwrap()
        .iter()
        .map(|(k, v)| (k.as_text().unwrap().to_owned(), v.clone()))
        .collect()
}

fn list_body(items: Vec<Value>) -> Value {
    Value::text_map([("list", Value::Array(items)), ("tag", Value::from("fixed"))])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn untouched_copy_reencodes_to_stored_bytes(body in body_strategy(), probe in key_strategy()) {
        let db = TestDatabase::memory();
        let doc = save_value(&db, "doc", &body);
        let stored = doc.encode().unwrap();
        prop_assert_eq!(stored.to_vec(), to_canonical_cbor(&body).unwrap());

        let copy = doc.to_mutable();
        let _ = copy.get(&probe).unwrap();
        for key in copy.properties().keys() {
            let _ = copy.get(&key).unwrap();
        }
        prop_assert!(!copy.is_changed());
        prop_assert_eq!(copy.encode().unwrap(), stored);
    }

    #[test]
    fn dictionary_edits_match_model(body in body_strategy(), edits in dict_edits_strategy(12)) {
        let db = TestDatabase::memory();
        let doc = save_value(&db, "doc", &body);
        let copy = doc.to_mutable();
        let mut model = model_of(&body);

        for edit in &edits {
            edit.apply_to_model(&mut model);
            match edit {
                DictEdit::Set(key, value) => {
                    copy.set(key, DocValue::from_value(value.clone()).unwrap()).unwrap();
                }
                DictEdit::Remove(key) => copy.remove(key).unwrap(),
            }
        }

        let expected = Value::text_map(model.clone());
        prop_assert_eq!(copy.properties().count(), model.len());
        prop_assert_eq!(copy.properties().iter().count(), model.len());
        prop_assert_eq!(copy.properties().to_value().unwrap(), expected.clone());
        prop_assert_eq!(copy.encode().unwrap().to_vec(), to_canonical_cbor(&expected).unwrap());
        prop_assert_eq!(doc.to_value().unwrap(), body);
    }

    #[test]
    fn nested_array_edits_match_model(
        items in prop::collection::vec(value_strategy(), 0..6),
        edits in array_edits_strategy(12),
    ) {
        let db = TestDatabase::memory();
        let body = list_body(items.clone());
        let doc = save_value(&db, "doc", &body);
        let copy = doc.to_mutable();
        let list = copy.properties().get_array("list").unwrap().unwrap();
        prop_assert!(list.is_mutable());

        let mut model = items;
        let mut applied = false;
        for edit in &edits {
            let len = model.len();
            edit.apply_to_model(&mut model);
            match edit {
                ArrayEdit::Set(i, v) if len > 0 => {
                    list.set(i % len, DocValue::from_value(v.clone()).unwrap()).unwrap();
                    applied = true;
                }
                ArrayEdit::Push(v) => {
                    list.push(DocValue::from_value(v.clone()).unwrap()).unwrap();
                    applied = true;
                }
                ArrayEdit::Insert(i, v) => {
                    list.insert(i % (len + 1), DocValue::from_value(v.clone()).unwrap()).unwrap();
                    applied = true;
                }
                ArrayEdit::Remove(i) if len > 0 => {
                    list.remove(i % len).unwrap();
                    applied = true;
                }
                _ => {}
            }
        }

        prop_assert_eq!(list.count(), model.len());
        prop_assert_eq!(list.to_value().unwrap(), Value::Array(model.clone()));
        prop_assert_eq!(copy.is_changed(), applied);
        prop_assert_eq!(copy.encode().unwrap().to_vec(), to_canonical_cbor(&list_body(model)).unwrap());
        prop_assert_eq!(doc.to_value().unwrap(), body);
    }

    #[test]
    fn sibling_copies_do_not_share_edits(body in body_strategy(), key in key_strategy(), n in any::<i64>()) {
        let db = TestDatabase::memory();
        let doc = save_value(&db, "doc", &body);
        let first = doc.to_mutable();
        let second = doc.to_mutable();

        first.set(&key, n).unwrap();
        prop_assert_eq!(first.get(&key).unwrap(), Some(DocValue::Integer(n)));
        prop_assert_eq!(second.properties().to_value().unwrap(), body.clone());

        let third = first.properties().to_mutable();
        third.remove(&key).unwrap();
        prop_assert!(first.properties().contains(&key));
        prop_assert!(!third.contains(&key));
    }
}

#[test]
fn nested_array_edit_leaves_original_view() {
    with_temp_db(|db| {
        let doc = save_json(db, "doc1", serde_json::json!({"a": [1, 2, 3]}));
        let copy = doc.to_mutable();
        copy.properties()
            .get_array("a")
            .unwrap()
            .unwrap()
            .set(1, 99)
            .unwrap();

        assert_eq!(doc.get_array("a").unwrap().unwrap().get_int(1).unwrap(), 2);
        assert_eq!(
            copy.properties().get_array("a").unwrap().unwrap().get_int(1).unwrap(),
            99
        );
    });
}

#[test]
fn nested_dictionary_edit_reaches_saved_body() {
    with_temp_db(|db| {
        let doc = save_json(db, "doc", serde_json::json!({"meta": {"n": 1}, "keep": "me"}));
        let mut copy = doc.to_mutable();
        let meta = copy.properties().get_dictionary("meta").unwrap().unwrap();
        meta.set("n", 2).unwrap();
        meta.set("extra", true).unwrap();
        assert!(copy.is_changed());

        let saved = db.save(&mut copy).unwrap();
        let expected = json_value(&serde_json::json!({"meta": {"n": 2, "extra": true}, "keep": "me"}));
        assert_eq!(saved.to_value().unwrap(), expected);
        assert_eq!(doc.get_dictionary("meta").unwrap().unwrap().get_int("n").unwrap(), 1);
    });
}

#[test]
fn read_only_views_reject_writes() {
    with_temp_db(|db| {
        let doc = save_json(db, "doc", serde_json::json!({"a": [1], "d": {}}));
        assert!(doc.properties().set("x", 1).is_err());
        assert!(doc.get_array("a").unwrap().unwrap().push(2).is_err());
        assert!(doc.get_dictionary("d").unwrap().unwrap().remove("k").is_err());
        assert_eq!(doc.to_value().unwrap(), json_value(&serde_json::json!({"a": [1], "d": {}})));
    });
}

#[test]
fn stored_fractional_numbers_load_and_edit() {
    with_temp_db(|db| {
        // {"x": 1.5} with a half-precision float
        let body = Bytes::from_static(&[0xa1, 0x61, b'x', 0xf9, 0x3e, 0x00]);
        db.store()
            .insert_existing("doc", RevisionId::new("1-a"), None, Some(body.clone()), false)
            .unwrap();

        let doc = db.get_document("doc", true).unwrap();
        assert_eq!(doc.get("x").unwrap(), Some(DocValue::Float(1.5)));
        assert_eq!(doc.get_double("x").unwrap(), 1.5);
        assert_eq!(doc.get_int("x").unwrap(), 2);
        assert_eq!(doc.encode(), Some(body.clone()));

        let mut edit = doc.to_mutable();
        edit.set("y", 0.1).unwrap();
        edit.set("z", 100_000.0).unwrap();
        assert_eq!(edit.properties().get_double("x").unwrap(), 1.5);
        let saved = db.save(&mut edit).unwrap();

        assert_eq!(saved.get_double("y").unwrap(), 0.1);
        assert_eq!(saved.get_number("z").unwrap(), Some(DocValue::Float(100_000.0)));
        assert_eq!(saved.get_number("missing").unwrap(), None);
        let expected = json_value(&serde_json::json!({"x": 1.5, "y": 0.1, "z": 100_000.0}));
        assert_eq!(saved.to_value().unwrap(), expected);
        assert_eq!(saved.encode().unwrap().to_vec(), to_canonical_cbor(&expected).unwrap());
    });
}

#[test]
fn insertion_order_reports_keys_as_added() {
    let db = TestDatabase::with_config(Config::default().key_order(KeyOrder::Insertion));

    let mut fresh = db.new_document("fresh");
    fresh.set("zz", 1).unwrap();
    fresh.set("a", 2).unwrap();
    fresh.set("m", 3).unwrap();
    assert_eq!(fresh.properties().keys(), ["zz", "a", "m"]);
    let iterated: Vec<String> = fresh.properties().iter().map(|entry| entry.unwrap().0).collect();
    assert_eq!(iterated, ["zz", "a", "m"]);

    // bodies stay canonical whatever order keys are reported in
    let saved = db.save(&mut fresh).unwrap();
    assert_eq!(saved.keys(), ["a", "m", "zz"]);
    assert_eq!(saved.to_value().unwrap(), json_value(&serde_json::json!({"zz": 1, "a": 2, "m": 3})));

    let edit = saved.to_mutable();
    edit.set("zzz", 4).unwrap();
    edit.set("b", 5).unwrap();
    edit.remove("m").unwrap();
    assert_eq!(edit.properties().keys(), ["a", "zz", "zzz", "b"]);
    let iterated: Vec<String> = edit.properties().iter().map(|entry| entry.unwrap().0).collect();
    assert_eq!(iterated, ["a", "zz", "zzz", "b"]);
}

#[test]
fn canonical_order_sorts_new_keys() {
    with_temp_db(|db| {
        let doc = db.new_document("doc");
        doc.set("zz", 1).unwrap();
        doc.set("a", 2).unwrap();
        doc.set("m", 3).unwrap();
        assert_eq!(doc.properties().keys(), ["a", "m", "zz"]);

        let detached = mutable_from_json("other", serde_json::json!({"zz": 1}));
        detached.set("a", 2).unwrap();
        assert_eq!(detached.properties().keys(), ["a", "zz"]);
    });
}
