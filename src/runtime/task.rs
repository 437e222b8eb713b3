//! Handles for forked tasks and watchers.

use std::fmt;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Unique id of one forked task or watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cancellable handle to a running effect instance or watcher.
///
/// Cancellation is cooperative: the task stops at its next await point.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    name: String,
    token: CancellationToken,
}

impl TaskHandle {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            id: TaskId::new(),
            name: name.to_string(),
            token: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Effect name this task was forked for.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TaskHandle {}
