//! Per-model task scheduler.
//!
//! Each effect gets one watcher: a long-lived task subscribed to the
//! effect's action type that forks a new task per matching action. Every
//! live task is tracked under its effect's name until it finishes; forking
//! again never cancels the earlier ones. `task(name)` is the newest.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

use super::context::EffectContext;
use super::store::Store;
use super::task::TaskHandle;
use crate::model::registry::EffectEntry;
use crate::model::{Action, Model};

type Slots = Arc<Mutex<IndexMap<String, Vec<TaskHandle>>>>;

#[derive(Debug)]
pub(crate) struct TaskScheduler {
    namespace: String,
    tasks: Slots,
    watchers: Mutex<IndexMap<String, TaskHandle>>,
    started: AtomicBool,
    destroyed: AtomicBool,
}

impl TaskScheduler {
    pub(crate) fn new(namespace: String) -> Self {
        Self {
            namespace,
            tasks: Arc::new(Mutex::new(IndexMap::new())),
            watchers: Mutex::new(IndexMap::new()),
            started: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Spawn one watcher per effect. Runs at most once per model.
    pub(crate) fn start(&self, model: &Model, effects: &[EffectEntry], store: &Store, rt: &Handle) {
        if self.is_destroyed() || self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        for entry in effects {
            let (sender, mut receiver) = mpsc::unbounded_channel::<Action>();
            store.add_subscriber(&entry.kind, sender);

            let watcher = TaskHandle::new(&entry.name);
            self.watchers.lock().insert(entry.name.clone(), watcher.clone());

            let model = model.clone();
            let store = store.clone();
            let entry = entry.clone();
            let runtime = rt.clone();
            rt.spawn(async move {
                let token = watcher.token().clone();
                loop {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => break,
                        next = receiver.recv() => match next {
                            Some(action) => model.scheduler().fork(&model, &store, &runtime, &entry, action),
                            None => break,
                        },
                    }
                }
                tracing::trace!(namespace = %model.namespace(), effect = %entry.name, "Watcher stopped");
            });
        }

        tracing::debug!(namespace = %self.namespace, watchers = effects.len(), "Watchers started");
    }

    /// Fork one task for `entry` and track it under the effect's name.
    pub(crate) fn fork(
        &self,
        model: &Model,
        store: &Store,
        rt: &Handle,
        entry: &EffectEntry,
        action: Action,
    ) {
        if self.is_destroyed() {
            tracing::debug!(namespace = %self.namespace, effect = %entry.name, "Model destroyed, not forking");
            return;
        }

        let task = TaskHandle::new(&entry.name);
        let ctx = EffectContext::new(store.clone(), model.clone(), task.clone());
        let future = entry.effect.start(ctx.clone(), action.clone());
        self.tasks
            .lock()
            .entry(entry.name.clone())
            .or_default()
            .push(task.clone());
        tracing::debug!(namespace = %self.namespace, effect = %entry.name, task = %task.id(), "Forked task");

        let slots = Arc::clone(&self.tasks);
        let effect = entry.effect.clone();
        let namespace = self.namespace.clone();
        rt.spawn(async move {
            let token = task.token().clone();
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => None,
                result = future => Some(result),
            };
            match outcome {
                Some(Ok(())) => {
                    tracing::trace!(namespace = %namespace, effect = %task.name(), "Task completed");
                }
                Some(Err(err)) => {
                    tracing::warn!(namespace = %namespace, effect = %task.name(), error = %err, "Effect failed");
                }
                None => {
                    effect.cancelled(&ctx, &action);
                    tracing::debug!(namespace = %namespace, effect = %task.name(), "Task cancelled");
                }
            }
            release(&slots, &task);
        });
    }

    pub(crate) fn task(&self, name: &str) -> Option<TaskHandle> {
        self.tasks.lock().get(name).and_then(|live| live.last()).cloned()
    }

    pub(crate) fn tracked(&self) -> Vec<TaskHandle> {
        self.tasks.lock().values().flatten().cloned().collect()
    }

    pub(crate) fn watcher(&self, name: &str) -> Option<TaskHandle> {
        self.watchers.lock().get(name).cloned()
    }

    /// Cancel every live task of effect `name`.
    pub(crate) fn cancel_task(&self, name: &str) -> bool {
        let removed = self.tasks.lock().shift_remove(name).unwrap_or_default();
        for task in removed.iter().rev() {
            task.cancel();
            tracing::debug!(namespace = %self.namespace, effect = %name, task = %task.id(), "Cancelled task");
        }
        !removed.is_empty()
    }

    /// Cancel every live task whose effect is not in `keep`, newest first.
    pub(crate) fn cancel_except(&self, keep: &[&str]) {
        let cancelled: Vec<TaskHandle> = {
            let mut slots = self.tasks.lock();
            let names: Vec<String> = slots
                .keys()
                .rev()
                .filter(|name| !keep.contains(&name.as_str()))
                .cloned()
                .collect();
            names
                .iter()
                .filter_map(|name| slots.shift_remove(name))
                .flat_map(|live| live.into_iter().rev())
                .collect()
        };
        for task in cancelled {
            task.cancel();
            tracing::debug!(namespace = %self.namespace, effect = %task.name(), "Cancelled task");
        }
    }

    /// Cancel all watchers, then all tracked tasks except `keep`.
    ///
    /// Returns false if the model was already destroyed.
    pub(crate) fn destroy(&self, keep: &[&str]) -> bool {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            tracing::debug!(namespace = %self.namespace, "Model already destroyed");
            return false;
        }

        let watchers: Vec<TaskHandle> = self.watchers.lock().drain(..).map(|(_, w)| w).collect();
        for watcher in watchers.iter().rev() {
            watcher.cancel();
        }
        self.cancel_except(keep);

        tracing::info!(namespace = %self.namespace, watchers = watchers.len(), "Model destroyed");
        true
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// Stop tracking `task`. Other live tasks of the same effect stay tracked.
fn release(slots: &Slots, task: &TaskHandle) {
    let mut slots = slots.lock();
    let emptied = match slots.get_mut(task.name()) {
        Some(live) => {
            live.retain(|other| other.id() != task.id());
            live.is_empty()
        }
        None => false,
    };
    if emptied {
        slots.shift_remove(task.name());
    }
}
