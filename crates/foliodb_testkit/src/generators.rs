//! Property-based test generators using proptest.
//!
//! Provides strategies for generating document bodies and edit sequences
//! that respect what a document can hold: finite numbers and text keys
//! in every map.

use foliodb_codec::Value;
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for generating dictionary keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,6}").expect("Invalid regex")
}

/// Strategy for generating scalar values.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e12f64..1.0e12).prop_map(Value::Float),
        "[a-zA-Z0-9 ]{0,12}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
    ]
}

/// Strategy for generating nested values with text-keyed maps.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(3, 48, 5, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(Value::Array),
            prop::collection::btree_map(key_strategy(), inner, 0..5).prop_map(|m| Value::text_map(m)),
        ]
    })
}

/// Strategy for generating document bodies (top-level maps).
pub fn body_strategy() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(key_strategy(), value_strategy(), 0..8).prop_map(|m| Value::text_map(m))
}

/// A single edit applied to a dictionary.
#[derive(Debug, Clone)]
pub enum DictEdit {
    /// Set a key to a value.
    Set(String, Value),
    /// Remove a key.
    Remove(String),
}

impl DictEdit {
    /// Applies the edit to a plain model of the dictionary.
    pub fn apply_to_model(&self, model: &mut BTreeMap<String, Value>) {
        match self {
            DictEdit::Set(key, value) => {
                model.insert(key.clone(), value.clone());
            }
            DictEdit::Remove(key) => {
                model.remove(key);
            }
        }
    }
}

/// Strategy for generating a sequence of dictionary edits.
pub fn dict_edits_strategy(max_len: usize) -> impl Strategy<Value = Vec<DictEdit>> {
    prop::collection::vec(
        prop_oneof![
            3 => (key_strategy(), value_strategy()).prop_map(|(k, v)| DictEdit::Set(k, v)),
            1 => key_strategy().prop_map(DictEdit::Remove),
        ],
        0..max_len,
    )
}

/// A single edit applied to an array.
#[derive(Debug, Clone)]
pub enum ArrayEdit {
    /// Replace the element at a position (taken modulo the length).
    Set(usize, Value),
    /// Append an element.
    Push(Value),
    /// Insert before a position (taken modulo length + 1).
    Insert(usize, Value),
    /// Remove the element at a position (taken modulo the length).
    Remove(usize),
}

impl ArrayEdit {
    /// Applies the edit to a plain model of the array.
    pub fn apply_to_model(&self, model: &mut Vec<Value>) {
        match self {
            ArrayEdit::Set(i, v) if !model.is_empty() => {
                let i = i % model.len();
                model[i] = v.clone();
            }
            ArrayEdit::Push(v) => model.push(v.clone()),
            ArrayEdit::Insert(i, v) => {
                let i = i % (model.len() + 1);
                model.insert(i, v.clone());
            }
            ArrayEdit::Remove(i) if !model.is_empty() => {
                let i = i % model.len();
                model.remove(i);
            }
            _ => {}
        }
    }
}

/// Strategy for generating a sequence of array edits.
pub fn array_edits_strategy(max_len: usize) -> impl Strategy<Value = Vec<ArrayEdit>> {
    prop::collection::vec(
        prop_oneof![
            (any::<usize>(), value_strategy()).prop_map(|(i, v)| ArrayEdit::Set(i, v)),
            value_strategy().prop_map(ArrayEdit::Push),
            (any::<usize>(), value_strategy()).prop_map(|(i, v)| ArrayEdit::Insert(i, v)),
            any::<usize>().prop_map(ArrayEdit::Remove),
        ],
        0..max_len,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn bodies_are_maps_with_text_keys() {
        let mut runner = TestRunner::default();
        for _ in 0..32 {
            let body = body_strategy().new_tree(&mut runner).unwrap().current();
            let pairs = body.as_map().unwrap();
            assert!(pairs.iter().all(|(k, _)| k.as_text().is_some()));
        }
    }

    #[test]
    fn array_model_ignores_edits_on_empty() {
        let mut model = Vec::new();
        ArrayEdit::Set(3, Value::Null).apply_to_model(&mut model);
        ArrayEdit::Remove(0).apply_to_model(&mut model);
        assert!(model.is_empty());
        ArrayEdit::Insert(7, Value::Integer(1)).apply_to_model(&mut model);
        assert_eq!(model, vec![Value::Integer(1)]);
    }
}
