//! Normalization contract between page machines and the entity cache.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::id::EntityId;
use super::merge::RECORDS;
use crate::model::Namespace;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("'{key}' record has no '{attribute}' attribute")]
    MissingId { key: String, attribute: String },

    #[error("'{key}' record has an id that is neither an integer nor a string")]
    InvalidId { key: String },

    #[error("'{key}' data must be an object or an array of objects, got {found}")]
    NotAnObject { key: String, found: String },
}

/// Ids produced by normalizing one payload: a single record or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultIds {
    One(EntityId),
    Many(Vec<EntityId>),
}

impl ResultIds {
    pub fn to_vec(&self) -> Vec<EntityId> {
        match self {
            ResultIds::One(id) => vec![id.clone()],
            ResultIds::Many(ids) => ids.clone(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ResultIds::One(id) => id.to_value(),
            ResultIds::Many(ids) => ids.iter().map(EntityId::to_value).collect(),
        }
    }
}

/// `{ entities: { key: { id: record } }, result: { key: ids } }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Normalized {
    #[serde(default)]
    pub entities: Map<String, Value>,
    #[serde(default)]
    pub result: BTreeMap<String, ResultIds>,
}

impl Normalized {
    /// Payload accepted by the entity cache transitions.
    pub fn to_payload(&self) -> Value {
        let result: Map<String, Value> = self
            .result
            .iter()
            .map(|(key, ids)| (key.clone(), ids.to_value()))
            .collect();
        let mut payload = Map::new();
        payload.insert("entities".to_string(), Value::Object(self.entities.clone()));
        payload.insert("result".to_string(), Value::Object(result));
        Value::Object(payload)
    }
}

/// Where records are read from.
#[derive(Debug, Clone, Copy)]
pub enum EntitySource<'a> {
    /// A records table: `{ key: { id: record } }`.
    Table(&'a Value),
    /// A whole state tree with the cache mounted at `cache`.
    Tree { root: &'a Value, cache: &'a Namespace },
}

impl<'a> EntitySource<'a> {
    pub fn records(&self) -> Option<&'a Value> {
        match *self {
            EntitySource::Table(table) => Some(table),
            EntitySource::Tree { root, cache } => cache.select(root)?.get(RECORDS),
        }
    }
}

/// Normalizer for one record kind.
pub trait Schema: Send + Sync {
    /// Key of this schema's table in the cache.
    fn key(&self) -> &str;

    fn create(&self, data: &Value) -> Result<Normalized, SchemaError>;

    /// This schema's table, `{ id: record }`.
    fn entities<'a>(&self, source: EntitySource<'a>) -> Option<&'a Map<String, Value>> {
        source.records()?.get(self.key())?.as_object()
    }

    fn result(&self, normalized: &Normalized) -> Vec<EntityId> {
        normalized
            .result
            .get(self.key())
            .map(ResultIds::to_vec)
            .unwrap_or_default()
    }

    fn entity(&self, source: EntitySource<'_>, id: &EntityId) -> Option<Value> {
        self.entities(source)?.get(&id.key()).cloned()
    }
}

/// Flat schema: records keyed by one id attribute, no nested entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    key: String,
    id_attribute: String,
}

impl EntitySchema {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            id_attribute: "id".to_string(),
        }
    }

    pub fn id_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.id_attribute = attribute.into();
        self
    }

    fn id_of(&self, record: &Value) -> Result<EntityId, SchemaError> {
        let Value::Object(fields) = record else {
            return Err(SchemaError::NotAnObject {
                key: self.key.clone(),
                found: kind_of(record).to_string(),
            });
        };
        let raw = fields
            .get(&self.id_attribute)
            .ok_or_else(|| SchemaError::MissingId {
                key: self.key.clone(),
                attribute: self.id_attribute.clone(),
            })?;
        EntityId::from_value(raw).ok_or_else(|| SchemaError::InvalidId {
            key: self.key.clone(),
        })
    }
}

impl Schema for EntitySchema {
    fn key(&self) -> &str {
        &self.key
    }

    fn create(&self, data: &Value) -> Result<Normalized, SchemaError> {
        let mut table = Map::new();
        let result = match data {
            Value::Null => ResultIds::Many(Vec::new()),
            Value::Array(items) => {
                let mut ids = Vec::with_capacity(items.len());
                for item in items {
                    let id = self.id_of(item)?;
                    table.insert(id.key(), item.clone());
                    ids.push(id);
                }
                ResultIds::Many(ids)
            }
            record => {
                let id = self.id_of(record)?;
                table.insert(id.key(), record.clone());
                ResultIds::One(id)
            }
        };

        let mut normalized = Normalized::default();
        normalized
            .entities
            .insert(self.key.clone(), Value::Object(table));
        normalized.result.insert(self.key.clone(), result);
        Ok(normalized)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
