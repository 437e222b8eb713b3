mod common;

use common::items;
use serde_json::{json, Value};
use slicekit::{EntityCache, EntityId, EntitySchema, Normalized, ResultIds, Schema, Store};
use std::collections::{BTreeMap, HashSet};

fn schema() -> EntitySchema {
    EntitySchema::new("items")
}

fn normalized(ids: &[i64]) -> Normalized {
    schema().create(&items(ids.iter().copied())).unwrap()
}

fn ids(raw: &[i64]) -> Vec<EntityId> {
    raw.iter().copied().map(EntityId::Int).collect()
}

fn store() -> Store {
    Store::builder().build().unwrap()
}

fn index(store: &Store) -> Vec<EntityId> {
    store.select(|root| store.entities().index(root, "items"))
}

#[test]
fn test_append_is_union_in_first_seen_order() {
    let store = store();
    let cache = store.entities().clone();

    store.dispatch(cache.append(&normalized(&[1, 2, 3])));
    store.dispatch(cache.append(&normalized(&[3, 4, 1, 5])));

    assert_eq!(index(&store), ids(&[1, 2, 3, 4, 5]));
}

#[test]
fn test_append_never_duplicates() {
    let store = store();
    let cache = store.entities().clone();

    for batch in [vec![1, 1, 2], vec![2, 3, 3], vec![1, 2, 3]] {
        store.dispatch(cache.append(&normalized(&batch)));
    }

    let index = index(&store);
    let unique: HashSet<_> = index.iter().collect();
    assert_eq!(unique.len(), index.len());
    assert_eq!(index, ids(&[1, 2, 3]));
}

#[test]
fn test_prepend_places_new_ids_first() {
    let store = store();
    let cache = store.entities().clone();

    store.dispatch(cache.append(&normalized(&[3, 4])));
    store.dispatch(cache.prepend(&normalized(&[1, 4, 2])));

    assert_eq!(index(&store), ids(&[1, 2, 3, 4]));
}

#[test]
fn test_remove_then_append_restores_membership() {
    let store = store();
    let cache = store.entities().clone();

    store.dispatch(cache.append(&normalized(&[1, 2, 3])));
    let mut removed = BTreeMap::new();
    removed.insert("items".to_string(), ResultIds::Many(ids(&[2])));
    store.dispatch(cache.remove(&removed));
    assert_eq!(index(&store), ids(&[1, 3]));

    // The record itself is still cached.
    let record = store.select(|root| cache.entity(root, &schema(), &EntityId::Int(2)));
    assert_eq!(record, Some(json!({"id": 2, "title": "Item 2"})));

    store.dispatch(cache.append(&normalized(&[2])));
    let restored: HashSet<EntityId> = index(&store).into_iter().collect();
    assert_eq!(restored, ids(&[1, 2, 3]).into_iter().collect::<HashSet<_>>());
}

#[test]
fn test_reset_discards_previous_order() {
    let store = store();
    let cache = store.entities().clone();

    store.dispatch(cache.append(&normalized(&[1, 2, 3])));
    store.dispatch(cache.reset(&normalized(&[3, 9])));

    assert_eq!(index(&store), ids(&[3, 9]));
}

#[test]
fn test_update_replaces_arrays_and_keeps_index() {
    let store = store();
    let cache = store.entities().clone();

    let first = schema()
        .create(&json!([{"id": 1, "tags": ["a", "b"], "author": {"name": "x", "age": 3}}]))
        .unwrap();
    store.dispatch(cache.append(&first));

    let patch = schema()
        .create(&json!({"id": 1, "tags": ["c"], "author": {"age": 4}}))
        .unwrap();
    store.dispatch(cache.update(&patch.entities));

    let record = store
        .select(|root| cache.entity(root, &schema(), &EntityId::Int(1)))
        .unwrap();
    assert_eq!(record["tags"], json!(["c"]));
    assert_eq!(record["author"], json!({"name": "x", "age": 4}));
    assert_eq!(index(&store), ids(&[1]));
}

#[test]
fn test_custom_namespace_and_table_source() {
    let cache = EntityCache::new(common::ns("data/cache"));
    let store = Store::builder().entities(cache.clone()).build().unwrap();

    store.dispatch(cache.append(&normalized(&[7])));

    let root = store.state();
    assert!(root["data"]["cache"]["records"]["items"]["7"].is_object());
    let records = Value::Object(cache.records(&root).unwrap().clone());
    let from_table = schema().entity(slicekit::EntitySource::Table(&records), &EntityId::Int(7));
    assert_eq!(from_table, Some(json!({"id": 7, "title": "Item 7"})));
}

#[test]
fn test_string_ids_key_the_table() {
    let store = store();
    let cache = store.entities().clone();
    let users = EntitySchema::new("users").id_attribute("login");

    let normalized = users.create(&json!([{"login": "ann"}, {"login": "bob"}])).unwrap();
    store.dispatch(cache.append(&normalized));

    let root = store.state();
    assert_eq!(
        cache.index(&root, "users"),
        vec![EntityId::from("ann"), EntityId::from("bob")]
    );
    assert_eq!(
        cache.entities(&root, &users).map(|table| table.len()),
        Some(2)
    );
}
