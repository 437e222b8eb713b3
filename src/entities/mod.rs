//! Normalized record cache shared by the page machines.
//!
//! Records live once in `records[key][id]`; list consumers keep ordered id
//! sequences in `index[key]`. All five transitions deep-merge the incoming
//! records, they differ only in what they do to the index.

mod id;
mod merge;
mod schema;

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

pub use id::EntityId;
pub use merge::{deep_merge, union_append, union_prepend, without};
pub use schema::{EntitySchema, EntitySource, Normalized, ResultIds, Schema, SchemaError};

use crate::model::{Action, Layer, Model, ModelBuilder, ModelError, Namespace, Transition};

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "@entities";

pub const RESET: &str = "reset";
pub const APPEND: &str = "append";
pub const PREPEND: &str = "prepend";
pub const UPDATE: &str = "update";
pub const REMOVE: &str = "remove";

/// Handle to the cache model: action constructors and selectors.
#[derive(Debug, Clone)]
pub struct EntityCache {
    model: Model,
}

impl EntityCache {
    pub fn new(namespace: Namespace) -> Self {
        let layer = Layer::new()
            .default_field(merge::RECORDS, json!({}))
            .default_field(merge::INDEX, json!({}))
            .transition(RESET, Transition::new(|state, action| merge::reset(state, &action.payload)))
            .transition(APPEND, Transition::new(|state, action| merge::append(state, &action.payload)))
            .transition(PREPEND, Transition::new(|state, action| merge::prepend(state, &action.payload)))
            .transition(UPDATE, Transition::new(|state, action| merge::update(state, &action.payload)))
            .transition(REMOVE, Transition::new(|state, action| merge::remove(state, &action.payload)));

        Self {
            model: ModelBuilder::new(namespace).layer(layer).build(),
        }
    }

    pub fn with_default_namespace() -> Result<Self, ModelError> {
        Ok(Self::new(Namespace::parse(DEFAULT_NAMESPACE)?))
    }

    pub fn namespace(&self) -> &Namespace {
        self.model.namespace()
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    fn action(&self, name: &str, payload: Value) -> Action {
        Action::new(self.namespace().type_for(name)).with_payload(payload)
    }

    /// Replace each touched index with the new ids.
    pub fn reset(&self, normalized: &Normalized) -> Action {
        self.action(RESET, normalized.to_payload())
    }

    pub fn append(&self, normalized: &Normalized) -> Action {
        self.action(APPEND, normalized.to_payload())
    }

    pub fn prepend(&self, normalized: &Normalized) -> Action {
        self.action(PREPEND, normalized.to_payload())
    }

    /// Merge records without touching any index.
    pub fn update(&self, entities: &Map<String, Value>) -> Action {
        self.action(UPDATE, json!({ "entities": entities }))
    }

    /// Drop ids from the indexes; records stay in the table.
    pub fn remove(&self, result: &BTreeMap<String, ResultIds>) -> Action {
        let result: Map<String, Value> = result
            .iter()
            .map(|(key, ids)| (key.clone(), ids.to_value()))
            .collect();
        self.action(REMOVE, json!({ "result": result }))
    }

    pub fn source<'a>(&'a self, root: &'a Value) -> EntitySource<'a> {
        EntitySource::Tree {
            root,
            cache: self.namespace(),
        }
    }

    /// The whole records table.
    pub fn records<'a>(&self, root: &'a Value) -> Option<&'a Map<String, Value>> {
        self.namespace().select(root)?.get(merge::RECORDS)?.as_object()
    }

    pub fn index(&self, root: &Value, key: &str) -> Vec<EntityId> {
        self.namespace()
            .select(root)
            .and_then(|cache| cache.get(merge::INDEX))
            .and_then(|index| index.get(key))
            .map(merge::ids_of)
            .unwrap_or_default()
    }

    pub fn entities<'a>(&'a self, root: &'a Value, schema: &dyn Schema) -> Option<&'a Map<String, Value>> {
        schema.entities(self.source(root))
    }

    pub fn entity(&self, root: &Value, schema: &dyn Schema, id: &EntityId) -> Option<Value> {
        schema.entity(self.source(root), id)
    }

    /// Records for `ids` in order; ids without a record are skipped.
    pub fn denormalize(&self, root: &Value, schema: &dyn Schema, ids: &[EntityId]) -> Vec<Value> {
        let Some(table) = self.entities(root, schema) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| table.get(&id.key()).cloned())
            .collect()
    }
}

impl From<EntityCache> for Model {
    fn from(cache: EntityCache) -> Self {
        cache.model
    }
}

impl From<&EntityCache> for Model {
    fn from(cache: &EntityCache) -> Self {
        cache.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> EntityCache {
        EntityCache::with_default_namespace().unwrap()
    }

    fn normalized(key: &str, records: Value) -> Normalized {
        EntitySchema::new(key).create(&records).unwrap()
    }

    fn apply(cache: &EntityCache, state: Option<Value>, action: &Action) -> Value {
        let slice = cache.model().reduce(state, action);
        json!({ "@entities": slice })
    }

    fn ids(raw: &[i64]) -> Vec<EntityId> {
        raw.iter().copied().map(EntityId::Int).collect()
    }

    #[test]
    fn append_merges_records_and_unions_index() {
        let cache = cache();
        let first = apply(&cache, None, &cache.append(&normalized("a", json!([{"id": 1, "n": "x"}, {"id": 2}]))));
        let second = cache.model().reduce(
            first.get("@entities").cloned(),
            &cache.append(&normalized("a", json!([{"id": 2, "extra": true}, {"id": 3}]))),
        );
        let root = json!({ "@entities": second });

        assert_eq!(cache.index(&root, "a"), ids(&[1, 2, 3]));
        let records = cache.records(&root).unwrap();
        assert_eq!(records["a"]["2"], json!({"id": 2, "extra": true}));
        assert_eq!(records["a"]["1"]["n"], json!("x"));
    }

    #[test]
    fn reset_replaces_index_but_keeps_records() {
        let cache = cache();
        let root = apply(&cache, None, &cache.append(&normalized("a", json!([{"id": 1}, {"id": 2}]))));
        let slice = cache
            .model()
            .reduce(root.get("@entities").cloned(), &cache.reset(&normalized("a", json!({"id": 9}))));
        let root = json!({ "@entities": slice });

        assert_eq!(cache.index(&root, "a"), ids(&[9]));
        assert_eq!(cache.records(&root).unwrap()["a"].as_object().unwrap().len(), 3);
    }

    #[test]
    fn update_leaves_index_alone() {
        let cache = cache();
        let root = apply(&cache, None, &cache.append(&normalized("a", json!([{"id": 1}]))));
        let patch = normalized("a", json!({"id": 5}));
        let slice = cache
            .model()
            .reduce(root.get("@entities").cloned(), &cache.update(&patch.entities));
        let root = json!({ "@entities": slice });

        assert_eq!(cache.index(&root, "a"), ids(&[1]));
        assert!(cache.entity(&root, &EntitySchema::new("a"), &EntityId::Int(5)).is_some());
    }

    #[test]
    fn remove_filters_index_only() {
        let cache = cache();
        let root = apply(&cache, None, &cache.append(&normalized("a", json!([{"id": 1}, {"id": 2}]))));
        let mut result = BTreeMap::new();
        result.insert("a".to_string(), ResultIds::One(EntityId::Int(1)));
        let slice = cache
            .model()
            .reduce(root.get("@entities").cloned(), &cache.remove(&result));
        let root = json!({ "@entities": slice });

        assert_eq!(cache.index(&root, "a"), ids(&[2]));
        assert!(cache.entity(&root, &EntitySchema::new("a"), &EntityId::Int(1)).is_some());
    }

    #[test]
    fn denormalize_skips_unknown_ids() {
        let cache = cache();
        let root = apply(&cache, None, &cache.append(&normalized("a", json!([{"id": 1}, {"id": 2}]))));
        let records = cache.denormalize(&root, &EntitySchema::new("a"), &ids(&[2, 7, 1]));
        assert_eq!(records, vec![json!({"id": 2}), json!({"id": 1})]);
    }
}
