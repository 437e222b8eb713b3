//! Model descriptions and their registered form.
//!
//! # Architecture
//!
//! - `namespace.rs` - Typed slice path and action-type prefix
//! - `action.rs` - Actions and action creators
//! - `layer.rs` - Transitions, effects and the layers grouping them
//! - `registry.rs` - Layer merge and action-table derivation
//!
//! A [`ModelBuilder`] stacks layers base first; [`ModelBuilder::build`]
//! derives the action table and composed reducer once.

mod action;
mod error;
mod layer;
mod namespace;
pub(crate) mod registry;
mod state;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tokio::runtime::Handle;

pub use action::{Action, ActionCreator};
pub use error::ModelError;
pub use layer::{Effect, Layer, Transition};
pub use namespace::{is_qualified, Namespace, SEPARATOR};
pub use state::SliceState;

use crate::runtime::scheduler::TaskScheduler;
use crate::runtime::{Store, TaskHandle};
use registry::{EffectEntry, Registration};

/// Built-in effect cancelling every tracked task except the one named in
/// the payload.
pub const CANCEL: &str = "cancel";
/// Built-in effect shutting the model down.
pub const DESTROY: &str = "destroy";

/// Describes a model as a stack of layers over a namespace.
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    namespace: Namespace,
    layers: Vec<Layer>,
}

impl ModelBuilder {
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            layers: vec![builtin_layer()],
        }
    }

    /// Stack a layer above the ones already added.
    pub fn layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn build(self) -> Model {
        let Registration {
            default_state,
            types,
            actions,
            transitions,
            effects,
        } = registry::register(&self.namespace, &self.layers);

        Model {
            inner: Arc::new(ModelInner {
                scheduler: TaskScheduler::new(self.namespace.to_string()),
                namespace: self.namespace,
                default_state,
                types,
                actions,
                transitions,
                effects,
            }),
        }
    }
}

fn builtin_layer() -> Layer {
    Layer::new()
        .effect(
            CANCEL,
            Effect::new(|ctx, action| async move {
                let ignore = action.payload.as_str().unwrap_or_default().to_string();
                ctx.cancel_except(&ignore);
                Ok(())
            }),
        )
        .effect(
            DESTROY,
            Effect::new(|ctx, _action| async move {
                ctx.model().destroy();
                Ok(())
            }),
        )
}

struct ModelInner {
    namespace: Namespace,
    default_state: Value,
    types: IndexMap<String, String>,
    actions: IndexMap<String, ActionCreator>,
    transitions: HashMap<String, Transition>,
    effects: Vec<EffectEntry>,
    scheduler: TaskScheduler,
}

/// A registered model: action table, composed reducer and task slots.
///
/// Cheap to clone; clones share the same scheduler.
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

impl Model {
    pub fn builder(namespace: Namespace) -> ModelBuilder {
        ModelBuilder::new(namespace)
    }

    pub fn namespace(&self) -> &Namespace {
        &self.inner.namespace
    }

    /// Merged default state of all layers.
    pub fn default_state(&self) -> &Value {
        &self.inner.default_state
    }

    /// Operation name to action type, for every unqualified operation.
    pub fn types(&self) -> &IndexMap<String, String> {
        &self.inner.types
    }

    pub fn type_of(&self, name: &str) -> Option<&str> {
        self.inner.types.get(name).map(String::as_str)
    }

    pub fn action(&self, name: &str) -> Option<&ActionCreator> {
        self.inner.actions.get(name)
    }

    pub fn create_action(&self, name: &str, payload: Value, meta: Value) -> Result<Action, ModelError> {
        self.action(name)
            .map(|creator| creator.create(payload, meta))
            .ok_or_else(|| ModelError::UnknownOperation {
                namespace: self.inner.namespace.to_string(),
                name: name.to_string(),
            })
    }

    /// Names of the model's effects, in registration order.
    pub fn effect_names(&self) -> Vec<&str> {
        self.inner.effects.iter().map(|e| e.name.as_str()).collect()
    }

    /// True if a transition is registered for `kind`.
    pub fn handles(&self, kind: &str) -> bool {
        self.inner.transitions.contains_key(kind)
    }

    /// Composed reducer. Unknown action types return the state unchanged.
    pub fn reduce(&self, state: Option<Value>, action: &Action) -> Value {
        let state = state.unwrap_or_else(|| self.inner.default_state.clone());
        match self.inner.transitions.get(&action.kind) {
            Some(transition) => transition.apply(state, action),
            None => state,
        }
    }

    /// This model's slice of a root state tree.
    pub fn state<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.inner.namespace.select(root)
    }

    /// Newest live task of effect `name`.
    pub fn task(&self, name: &str) -> Option<TaskHandle> {
        self.inner.scheduler.task(name)
    }

    pub fn tracked_tasks(&self) -> Vec<TaskHandle> {
        self.inner.scheduler.tracked()
    }

    pub fn watcher(&self, name: &str) -> Option<TaskHandle> {
        self.inner.scheduler.watcher(name)
    }

    /// Cancel every live task of effect `name`.
    pub fn cancel_task(&self, name: &str) -> bool {
        self.inner.scheduler.cancel_task(name)
    }

    /// Cancel every tracked task except `ignore` (and the running `cancel`).
    pub fn cancel(&self, ignore: &str) {
        self.inner.scheduler.cancel_except(&[ignore, CANCEL]);
    }

    /// Cancel watchers, then tasks. Terminal and idempotent.
    pub fn destroy(&self) {
        self.inner.scheduler.destroy(&[DESTROY]);
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.scheduler.is_destroyed()
    }

    pub(crate) fn start(&self, store: &Store, rt: &Handle) {
        self.inner
            .scheduler
            .start(self, &self.inner.effects, store, rt);
    }

    pub(crate) fn scheduler(&self) -> &TaskScheduler {
        &self.inner.scheduler
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("namespace", &self.inner.namespace.to_string())
            .field("types", &self.inner.types)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ns(s: &str) -> Namespace {
        Namespace::parse(s).unwrap()
    }

    #[test]
    fn builtins_are_registered() {
        let model = ModelBuilder::new(ns("m")).build();
        assert_eq!(model.type_of(CANCEL), Some("m/cancel"));
        assert_eq!(model.type_of(DESTROY), Some("m/destroy"));
        assert_eq!(model.effect_names(), vec![CANCEL, DESTROY]);
    }

    #[test]
    fn reduce_uses_default_state_when_absent() {
        let model = ModelBuilder::new(ns("m"))
            .layer(Layer::new().default_field("n", json!(3)))
            .build();
        assert_eq!(model.reduce(None, &Action::new("m/other")), json!({"n": 3}));
    }

    #[test]
    fn create_action_rejects_unknown_names() {
        let model = ModelBuilder::new(ns("m")).build();
        let err = model.create_action("nope", Value::Null, Value::Null).unwrap_err();
        assert!(matches!(err, ModelError::UnknownOperation { .. }));
        let action = model.create_action(CANCEL, json!("x"), Value::Null).unwrap();
        assert_eq!(action.kind, "m/cancel");
    }

    #[test]
    fn destroy_is_idempotent() {
        let model = ModelBuilder::new(ns("m")).build();
        model.destroy();
        model.destroy();
        assert!(model.is_destroyed());
    }
}
