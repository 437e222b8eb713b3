//! What an effect can do: read state, dispatch, cancel.

use serde_json::Value;

use super::error::EffectError;
use super::store::Store;
use super::task::TaskHandle;
use crate::model::{Action, Model, SliceState};

/// Handle given to every forked effect task.
///
/// State reads and dispatches are synchronous; the only suspension points of
/// an effect are the futures it awaits.
#[derive(Clone)]
pub struct EffectContext {
    store: Store,
    model: Model,
    current: TaskHandle,
}

impl EffectContext {
    pub(crate) fn new(store: Store, model: Model, current: TaskHandle) -> Self {
        Self {
            store,
            model,
            current,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Handle of the task running this effect.
    pub fn current_task(&self) -> &TaskHandle {
        &self.current
    }

    /// Read the root state tree.
    pub fn select<T>(&self, f: impl FnOnce(&Value) -> T) -> T {
        self.store.select(f)
    }

    /// The model's own slice as a typed state (default if absent or mismatched).
    pub fn slice<S: SliceState>(&self) -> S {
        self.store.select(|root| {
            self.model
                .state(root)
                .and_then(|slice| serde_json::from_value(slice.clone()).ok())
                .unwrap_or_default()
        })
    }

    pub fn dispatch(&self, action: Action) {
        self.store.dispatch(action);
    }

    /// Build an action for one of the model's own operations.
    pub fn action(&self, name: &str, payload: Value, meta: Value) -> Result<Action, EffectError> {
        Ok(self.model.create_action(name, payload, meta)?)
    }

    /// Dispatch one of the model's own operations.
    pub fn put(&self, name: &str, payload: Value, meta: Value) -> Result<(), EffectError> {
        let action = self.action(name, payload, meta)?;
        self.dispatch(action);
        Ok(())
    }

    /// Dispatch `action` only if `guard` accepts the model's current slice.
    ///
    /// Check and dispatch happen under the store lock, so two tasks racing
    /// on the same guard cannot both pass.
    pub fn dispatch_if(&self, guard: impl FnOnce(&Value) -> bool, action: Action) -> bool {
        self.store
            .dispatch_if(self.model.namespace(), guard, action)
    }

    pub fn task(&self, name: &str) -> Option<TaskHandle> {
        self.model.task(name)
    }

    pub fn cancel_task(&self, name: &str) -> bool {
        self.model.cancel_task(name)
    }

    /// Cancel every tracked task of this model except `ignore`.
    pub fn cancel_except(&self, ignore: &str) {
        self.model.cancel(ignore);
    }

    pub fn is_cancelled(&self) -> bool {
        self.current.is_cancelled()
    }

    /// Resolves once this task is cancelled.
    pub async fn cancelled(&self) {
        self.current.token().cancelled().await
    }
}
