//! Operations and the layers that group them.
//!
//! A layer is one level of a model description: default-state fields,
//! transitions and effects. Models are composed from several layers, base
//! first, and later layers override earlier ones key by key.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};

use super::action::Action;
use super::state::SliceState;
use crate::runtime::{EffectContext, EffectError};

type TransitionFn = dyn Fn(Value, &Action) -> Value + Send + Sync;

/// Pure state transition: `(slice, action) -> slice`.
#[derive(Clone)]
pub struct Transition(Arc<TransitionFn>);

impl Transition {
    /// Transition over the raw JSON slice.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Value, &Action) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Transition over a typed slice.
    ///
    /// A slice that fails to convert is returned unchanged.
    pub fn typed<S, F>(f: F) -> Self
    where
        S: SliceState,
        F: Fn(S, &Action) -> S + Send + Sync + 'static,
    {
        Self::new(move |state: Value, action: &Action| {
            let typed: S = match serde_json::from_value(state.clone()) {
                Ok(typed) => typed,
                Err(err) => {
                    tracing::warn!(action = %action.kind, error = %err, "Slice does not match its state type");
                    return state;
                }
            };
            match serde_json::to_value(f(typed, action)) {
                Ok(next) => next,
                Err(err) => {
                    tracing::warn!(action = %action.kind, error = %err, "Failed to serialize slice");
                    state
                }
            }
        })
    }

    pub fn apply(&self, state: Value, action: &Action) -> Value {
        (self.0)(state, action)
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transition")
    }
}

pub(crate) type EffectFuture = BoxFuture<'static, Result<(), EffectError>>;
type EffectFn = dyn Fn(EffectContext, Action) -> EffectFuture + Send + Sync;
type CleanupFn = dyn Fn(&EffectContext, &Action) + Send + Sync;

/// Asynchronous procedure forked once per matching action.
#[derive(Clone)]
pub struct Effect {
    run: Arc<EffectFn>,
    on_cancel: Option<Arc<CleanupFn>>,
}

impl Effect {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(EffectContext, Action) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EffectError>> + Send + 'static,
    {
        Self {
            run: Arc::new(move |ctx, action| f(ctx, action).boxed()),
            on_cancel: None,
        }
    }

    /// Cleanup run when a task of this effect is cancelled mid-flight. It
    /// receives the action that forked the task.
    pub fn on_cancel<F>(mut self, f: F) -> Self
    where
        F: Fn(&EffectContext, &Action) + Send + Sync + 'static,
    {
        self.on_cancel = Some(Arc::new(f));
        self
    }

    pub(crate) fn start(&self, ctx: EffectContext, action: Action) -> EffectFuture {
        (self.run)(ctx, action)
    }

    pub(crate) fn cancelled(&self, ctx: &EffectContext, action: &Action) {
        if let Some(cleanup) = &self.on_cancel {
            cleanup(ctx, action);
        }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("on_cancel", &self.on_cancel.is_some())
            .finish()
    }
}

/// One level of a model description.
#[derive(Debug, Clone, Default)]
pub struct Layer {
    pub(crate) default_state: Map<String, Value>,
    pub(crate) transitions: Vec<(String, Transition)>,
    pub(crate) effects: Vec<(String, Effect)>,
}

impl Layer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contribute one default-state field.
    pub fn default_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.default_state.insert(key.into(), value);
        self
    }

    /// Contribute every field of an object; non-object values are ignored.
    pub fn default_state(mut self, state: Value) -> Self {
        if let Value::Object(fields) = state {
            self.default_state.extend(fields);
        }
        self
    }

    /// Contribute every field of a typed state's default value.
    pub fn default_typed<S: SliceState>(self) -> Self {
        match serde_json::to_value(S::default()) {
            Ok(value) => self.default_state(value),
            Err(err) => {
                tracing::warn!(error = %err, "Failed to serialize default state");
                self
            }
        }
    }

    pub fn transition(mut self, name: impl Into<String>, transition: Transition) -> Self {
        upsert(&mut self.transitions, name.into(), transition);
        self
    }

    pub fn effect(mut self, name: impl Into<String>, effect: Effect) -> Self {
        upsert(&mut self.effects, name.into(), effect);
        self
    }
}

fn upsert<T>(entries: &mut Vec<(String, T)>, name: String, value: T) {
    match entries.iter_mut().find(|(existing, _)| *existing == name) {
        Some(entry) => entry.1 = value,
        None => entries.push((name, value)),
    }
}
