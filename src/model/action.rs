//! Actions and action constructors.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A dispatched action: `{ type, payload, meta }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub meta: Value,
}

impl Action {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Value::Null,
            meta: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }

    /// Deserialize the payload, `None` if it is absent or has the wrong shape.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Option<T> {
        if self.payload.is_null() {
            return None;
        }
        serde_json::from_value(self.payload.clone()).ok()
    }
}

/// Constructor bound to one action type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionCreator {
    kind: String,
}

impl ActionCreator {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn create(&self, payload: Value, meta: Value) -> Action {
        Action {
            kind: self.kind.clone(),
            payload,
            meta,
        }
    }

    /// Action with neither payload nor meta.
    pub fn empty(&self) -> Action {
        Action::new(self.kind.clone())
    }
}
