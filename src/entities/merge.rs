//! Merge algebra behind the entity cache transitions.
//!
//! Slice shape: `{ "records": { key: { id: record } }, "index": { key: [id] } }`.

use std::collections::HashSet;

use serde_json::{Map, Value};

use super::id::EntityId;

pub(crate) const RECORDS: &str = "records";
pub(crate) const INDEX: &str = "index";

/// Recursive merge where objects merge key by key and anything else,
/// arrays included, replaces the target wholesale.
pub fn deep_merge(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value)
                    }
                    _ => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, source) => *target = source.clone(),
    }
}

/// `existing` followed by the ids of `incoming` it lacks, deduplicated.
pub fn union_append(existing: &[EntityId], incoming: &[EntityId]) -> Vec<EntityId> {
    let mut seen = HashSet::new();
    existing
        .iter()
        .chain(incoming)
        .filter(|id| seen.insert((*id).clone()))
        .cloned()
        .collect()
}

/// The ids of `incoming` missing from `existing`, then `existing`, deduplicated.
pub fn union_prepend(existing: &[EntityId], incoming: &[EntityId]) -> Vec<EntityId> {
    let present: HashSet<&EntityId> = existing.iter().collect();
    let mut seen = HashSet::new();
    incoming
        .iter()
        .filter(|id| !present.contains(id))
        .chain(existing)
        .filter(|id| seen.insert((*id).clone()))
        .cloned()
        .collect()
}

pub fn without(existing: &[EntityId], removed: &[EntityId]) -> Vec<EntityId> {
    let removed: HashSet<&EntityId> = removed.iter().collect();
    existing
        .iter()
        .filter(|id| !removed.contains(id))
        .cloned()
        .collect()
}

/// Ids of one result entry: a single id or a list.
pub(crate) fn ids_of(value: &Value) -> Vec<EntityId> {
    match value {
        Value::Array(items) => items.iter().filter_map(EntityId::from_value).collect(),
        other => EntityId::from_value(other).into_iter().collect(),
    }
}

fn ensure_object(state: &mut Value) -> &mut Map<String, Value> {
    if !state.is_object() {
        *state = Value::Object(Map::new());
    }
    match state {
        Value::Object(map) => map,
        _ => unreachable!("state was just made an object"),
    }
}

fn merge_records(state: &mut Value, entities: &Value) {
    if entities.is_null() {
        return;
    }
    let map = ensure_object(state);
    let records = map
        .entry(RECORDS)
        .or_insert_with(|| Value::Object(Map::new()));
    deep_merge(records, entities);
}

fn index_ids(state: &Value, key: &str) -> Vec<EntityId> {
    state
        .get(INDEX)
        .and_then(|index| index.get(key))
        .map(ids_of)
        .unwrap_or_default()
}

fn rewrite_index(
    state: &mut Value,
    result: &Value,
    rewrite: impl Fn(&[EntityId], &[EntityId]) -> Vec<EntityId>,
) {
    let Value::Object(result) = result else {
        return;
    };
    let updates: Vec<(String, Vec<EntityId>)> = result
        .iter()
        .map(|(key, ids)| (key.clone(), rewrite(&index_ids(state, key), &ids_of(ids))))
        .collect();

    let map = ensure_object(state);
    let index = map
        .entry(INDEX)
        .or_insert_with(|| Value::Object(Map::new()));
    let index = ensure_object(index);
    for (key, ids) in updates {
        index.insert(key, ids.iter().map(EntityId::to_value).collect());
    }
}

pub(crate) fn reset(mut state: Value, payload: &Value) -> Value {
    merge_records(&mut state, &payload["entities"]);
    rewrite_index(&mut state, &payload["result"], |_, incoming| {
        union_append(&[], incoming)
    });
    state
}

pub(crate) fn append(mut state: Value, payload: &Value) -> Value {
    merge_records(&mut state, &payload["entities"]);
    rewrite_index(&mut state, &payload["result"], union_append);
    state
}

pub(crate) fn prepend(mut state: Value, payload: &Value) -> Value {
    merge_records(&mut state, &payload["entities"]);
    rewrite_index(&mut state, &payload["result"], union_prepend);
    state
}

pub(crate) fn update(mut state: Value, payload: &Value) -> Value {
    merge_records(&mut state, &payload["entities"]);
    state
}

pub(crate) fn remove(mut state: Value, payload: &Value) -> Value {
    rewrite_index(&mut state, &payload["result"], without);
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(raw: &[i64]) -> Vec<EntityId> {
        raw.iter().copied().map(EntityId::Int).collect()
    }

    #[test]
    fn deep_merge_replaces_arrays() {
        let mut target = json!({"a": {"tags": [1, 2, 3], "name": "x", "n": {"k": 1}}});
        deep_merge(&mut target, &json!({"a": {"tags": [9], "n": {"j": 2}}}));
        assert_eq!(
            target,
            json!({"a": {"tags": [9], "name": "x", "n": {"k": 1, "j": 2}}})
        );
    }

    #[test]
    fn deep_merge_null_overwrites() {
        let mut target = json!({"a": {"x": 1}});
        deep_merge(&mut target, &json!({"a": null}));
        assert_eq!(target, json!({"a": null}));
    }

    #[test]
    fn union_append_keeps_first_seen_order() {
        let merged = union_append(&ids(&[1, 2, 3]), &ids(&[3, 4, 2, 5, 4]));
        assert_eq!(merged, ids(&[1, 2, 3, 4, 5]));
    }

    #[test]
    fn union_prepend_puts_new_ids_first() {
        let merged = union_prepend(&ids(&[3, 4]), &ids(&[1, 3, 2, 1]));
        assert_eq!(merged, ids(&[1, 2, 3, 4]));
    }

    #[test]
    fn without_filters_ids() {
        assert_eq!(without(&ids(&[1, 2, 3, 4]), &ids(&[2, 4, 9])), ids(&[1, 3]));
    }

    #[test]
    fn ids_of_accepts_single_id() {
        assert_eq!(ids_of(&json!(7)), ids(&[7]));
        assert_eq!(ids_of(&json!(["a", 2])), vec![EntityId::from("a"), EntityId::Int(2)]);
        assert!(ids_of(&Value::Null).is_empty());
    }
}
