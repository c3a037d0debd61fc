//! Dot-key flattening of nested locale documents.
//!
//! A catalog like `{"menu": {"file": "File"}}` is addressed in code and
//! in PO exports as `menu.file`. This module derives the full set of
//! leaf records from one document and rebuilds a document from updated
//! leaf values without disturbing its shape or key order.

use serde_json::{Map, Value};
use std::collections::HashMap;

/// One leaf of a locale document: dot-joined key path plus its value.
///
/// Re-derived fully on every scan; keys are unique per document.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationKeyRecord {
    pub key: String,
    pub value: Value,
}

impl TranslationKeyRecord {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// The value as text, for diffing and translation fan-out.
    /// Non-string leaves render through JSON.
    pub fn text(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Collect every leaf of `doc` as a dot-keyed record, in document order.
///
/// Objects recurse; everything else (strings, numbers, null, booleans,
/// arrays) is a leaf. A scalar at the root yields a single record with
/// an empty key.
pub fn collect_leaf_values(doc: &Value) -> Vec<TranslationKeyRecord> {
    let mut records = Vec::new();
    walk(doc, String::new(), &mut records);
    records
}

fn walk(value: &Value, prefix: String, out: &mut Vec<TranslationKeyRecord>) {
    match value {
        Value::Object(map) => {
            for (name, child) in map {
                let key = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}.{name}")
                };
                walk(child, key, out);
            }
        }
        leaf => out.push(TranslationKeyRecord::new(prefix, leaf.clone())),
    }
}

/// Rebuild `doc` with leaf values replaced by `updates` where present.
///
/// Keys absent from `updates` keep their current value; keys in
/// `updates` that do not exist in `doc` are ignored. Shape and key
/// order are preserved, so an update set with unchanged values
/// reproduces the document exactly.
pub fn reconstruct_with_updated_values(doc: &Value, updates: &HashMap<String, Value>) -> Value {
    rebuild(doc, String::new(), updates)
}

fn rebuild(value: &Value, prefix: String, updates: &HashMap<String, Value>) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (name, child) in map {
                let key = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}.{name}")
                };
                out.insert(name.clone(), rebuild(child, key, updates));
            }
            Value::Object(out)
        }
        leaf => updates.get(&prefix).cloned().unwrap_or_else(|| leaf.clone()),
    }
}

/// Flatten a document into dot-keyed records keyed for lookup.
pub fn flatten(doc: &Value) -> HashMap<String, Value> {
    collect_leaf_values(doc)
        .into_iter()
        .map(|r| (r.key, r.value))
        .collect()
}

/// Build a nested document from dot-keyed leaf values.
///
/// Later entries win on conflict; a leaf claiming a path through an
/// existing subtree replaces that subtree.
pub fn unflatten<'a>(entries: impl IntoIterator<Item = (&'a str, Value)>) -> Value {
    let mut root = Map::new();

    for (key, value) in entries {
        if key.is_empty() {
            continue;
        }
        let parts: Vec<&str> = key.split('.').collect();
        insert_path(&mut root, &parts, value);
    }

    Value::Object(root)
}

/// Overlay `addition` onto `base`, recursing into shared objects.
///
/// Existing keys keep their position in `base`; new keys append. A leaf
/// on either side at a shared key is replaced by the addition.
pub fn merge_documents(base: Value, addition: Value) -> Value {
    match (base, addition) {
        (Value::Object(mut base_map), Value::Object(add_map)) => {
            for (key, add_value) in add_map {
                match base_map.get_mut(&key) {
                    Some(base_value) => {
                        let current = base_value.take();
                        *base_value = merge_documents(current, add_value);
                    }
                    None => {
                        base_map.insert(key, add_value);
                    }
                }
            }
            Value::Object(base_map)
        }
        (_, addition) => addition,
    }
}

fn insert_path(map: &mut Map<String, Value>, parts: &[&str], value: Value) {
    let (head, rest) = match parts {
        [head, rest @ ..] => (*head, rest),
        [] => return,
    };

    if rest.is_empty() {
        map.insert(head.to_string(), value);
        return;
    }

    let child = map
        .entry(head.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !child.is_object() {
        *child = Value::Object(Map::new());
    }
    if let Value::Object(child_map) = child {
        insert_path(child_map, rest, value);
    }
}
