//! The host store: one state tree, every model's reducer, the effect driver.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};

use super::error::RuntimeError;
use crate::config::Config;
use crate::entities::EntityCache;
use crate::model::{Action, Model, ModelError, Namespace, Transition};

/// Action folded through extra reducers when the store is built.
pub const INIT_ACTION: &str = "@@slicekit/INIT";

struct Subscriber {
    kind: String,
    sender: mpsc::UnboundedSender<Action>,
}

struct StoreInner {
    config: Config,
    state: Mutex<Value>,
    models: RwLock<IndexMap<Namespace, Model>>,
    reducers: IndexMap<String, Transition>,
    subscribers: Mutex<Vec<Subscriber>>,
    revision: watch::Sender<u64>,
    runtime: Mutex<Option<Handle>>,
    entities: EntityCache,
}

/// Thread-safe store shared by the host and every effect task.
///
/// Dispatch is synchronous: the action is folded through every reducer and
/// forwarded to matching watchers inside one critical section, so reducers
/// and watchers both observe actions in dispatch order.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

/// Builder for [`Store`].
pub struct StoreBuilder {
    config: Config,
    models: Vec<Model>,
    entities: Option<EntityCache>,
    reducers: IndexMap<String, Transition>,
    preloaded: Value,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            models: Vec::new(),
            entities: None,
            reducers: IndexMap::new(),
            preloaded: Value::Object(Map::new()),
        }
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn model(mut self, model: impl Into<Model>) -> Self {
        self.models.push(model.into());
        self
    }

    /// Entity cache shared with the page machines. When omitted, one is
    /// created from the configured namespace.
    pub fn entities(mut self, cache: EntityCache) -> Self {
        self.entities = Some(cache);
        self
    }

    /// Extra top-level reducer, applied to `state[key]` for every action.
    pub fn reducer(mut self, key: impl Into<String>, reducer: Transition) -> Self {
        self.reducers.insert(key.into(), reducer);
        self
    }

    pub fn preloaded_state(mut self, state: Value) -> Self {
        self.preloaded = state;
        self
    }

    pub fn build(self) -> Result<Store, ModelError> {
        let entities = match self.entities {
            Some(cache) => cache,
            None => self.config.entity_cache()?,
        };
        let mut root = match self.preloaded {
            Value::Object(map) => Value::Object(map),
            _ => Value::Object(Map::new()),
        };

        let init = Action::new(INIT_ACTION);
        for (key, reducer) in &self.reducers {
            if let Value::Object(map) = &mut root {
                let slot = map.entry(key.clone()).or_insert(Value::Null);
                *slot = reducer.apply(std::mem::take(slot), &init);
            }
        }

        let (revision, _) = watch::channel(0);
        let store = Store {
            inner: Arc::new(StoreInner {
                config: self.config,
                state: Mutex::new(root),
                models: RwLock::new(IndexMap::new()),
                reducers: self.reducers,
                subscribers: Mutex::new(Vec::new()),
                revision,
                runtime: Mutex::new(None),
                entities: entities.clone(),
            }),
        };

        for model in self.models {
            store.register(model)?;
        }
        store.register(entities.model().clone())?;
        Ok(store)
    }
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn entities(&self) -> &EntityCache {
        &self.inner.entities
    }

    /// Fold `action` through every reducer, then hand it to the watchers.
    pub fn dispatch(&self, action: Action) {
        tracing::trace!(action = %action.kind, "Dispatch");
        {
            let mut state = self.inner.state.lock();
            self.fold(&mut state, &action);
            self.notify(&action);
        }
        self.inner.revision.send_modify(|revision| *revision += 1);
    }

    /// Dispatch `action` only if `guard` accepts the slice at `namespace`.
    pub fn dispatch_if(
        &self,
        namespace: &Namespace,
        guard: impl FnOnce(&Value) -> bool,
        action: Action,
    ) -> bool {
        {
            let mut state = self.inner.state.lock();
            let missing = Value::Null;
            let accepted = guard(namespace.select(&state).unwrap_or(&missing));
            if !accepted {
                tracing::trace!(action = %action.kind, "Guard rejected dispatch");
                return false;
            }
            self.fold(&mut state, &action);
            self.notify(&action);
        }
        self.inner.revision.send_modify(|revision| *revision += 1);
        true
    }

    /// Read the root state tree.
    pub fn select<T>(&self, f: impl FnOnce(&Value) -> T) -> T {
        f(&self.inner.state.lock())
    }

    /// Snapshot of the whole state tree.
    pub fn state(&self) -> Value {
        self.inner.state.lock().clone()
    }

    /// Snapshot of one slice.
    pub fn slice(&self, namespace: &Namespace) -> Option<Value> {
        namespace.select(&self.inner.state.lock()).cloned()
    }

    /// Receiver bumped after every dispatch that reached the reducers.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    pub fn model(&self, namespace: &Namespace) -> Option<Model> {
        self.inner.models.read().get(namespace).cloned()
    }

    pub fn models(&self) -> Vec<Model> {
        self.inner.models.read().values().cloned().collect()
    }

    /// Add a model; if the store is running its watchers start immediately.
    ///
    /// Namespaces on the same branch of the state tree are rejected.
    pub fn register(&self, model: impl Into<Model>) -> Result<(), ModelError> {
        let model = model.into();
        {
            let mut state = self.inner.state.lock();
            let mut models = self.inner.models.write();
            if let Some(existing) = models.keys().find(|ns| ns.overlaps(model.namespace())) {
                return Err(ModelError::NamespaceConflict {
                    namespace: model.namespace().to_string(),
                    existing: existing.to_string(),
                });
            }
            let slot = model.namespace().slot_mut(&mut state);
            if slot.is_null() {
                *slot = model.default_state().clone();
            }
            models.insert(model.namespace().clone(), model.clone());
        }
        tracing::info!(namespace = %model.namespace(), "Model registered");

        let runtime = self.inner.runtime.lock().clone();
        if let Some(handle) = runtime {
            model.start(self, &handle);
        }
        Ok(())
    }

    /// Destroy a model and drop its reducer and slice.
    pub fn unregister(&self, namespace: &Namespace) -> Result<Model, ModelError> {
        let model = self.model(namespace).ok_or_else(|| ModelError::UnknownModel {
            namespace: namespace.to_string(),
        })?;
        model.destroy();
        {
            let mut state = self.inner.state.lock();
            self.inner.models.write().shift_remove(namespace);
            namespace.remove_from(&mut state);
        }
        self.inner.subscribers.lock().retain(|s| !s.sender.is_closed());
        self.inner.revision.send_modify(|revision| *revision += 1);
        tracing::info!(namespace = %namespace, "Model unregistered");
        Ok(model)
    }

    /// Start every registered model's watchers on the current tokio runtime.
    pub fn run(&self) -> Result<(), RuntimeError> {
        let handle = Handle::try_current().map_err(|_| RuntimeError::NoRuntime)?;
        *self.inner.runtime.lock() = Some(handle.clone());
        for model in self.models() {
            model.start(self, &handle);
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.inner.runtime.lock().is_some()
    }

    /// Destroy every model, newest first. Dispatches still reduce afterwards
    /// but fork nothing.
    pub fn shutdown(&self) {
        for model in self.models().iter().rev() {
            model.destroy();
        }
        *self.inner.runtime.lock() = None;
        tracing::info!("Store shut down");
    }

    pub(crate) fn add_subscriber(&self, kind: &str, sender: mpsc::UnboundedSender<Action>) {
        self.inner.subscribers.lock().push(Subscriber {
            kind: kind.to_string(),
            sender,
        });
    }

    fn fold(&self, root: &mut Value, action: &Action) {
        let models = self.inner.models.read();
        for model in models.values() {
            if !model.handles(&action.kind) {
                continue;
            }
            let slot = model.namespace().slot_mut(root);
            let current = std::mem::take(slot);
            let current = if current.is_null() { None } else { Some(current) };
            *slot = model.reduce(current, action);
        }
        drop(models);

        if self.inner.reducers.is_empty() {
            return;
        }
        if !root.is_object() {
            *root = Value::Object(Map::new());
        }
        if let Value::Object(map) = root {
            for (key, reducer) in &self.inner.reducers {
                let slot = map.entry(key.clone()).or_insert(Value::Null);
                *slot = reducer.apply(std::mem::take(slot), action);
            }
        }
    }

    fn notify(&self, action: &Action) {
        let mut subscribers = self.inner.subscribers.lock();
        subscribers.retain(|subscriber| {
            if subscriber.kind != action.kind {
                return !subscriber.sender.is_closed();
            }
            subscriber.sender.send(action.clone()).is_ok()
        });
    }
}
