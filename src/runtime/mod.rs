//! Effect driver: store, scheduler, tasks.

mod context;
mod error;
pub(crate) mod scheduler;
mod store;
mod task;

pub use context::EffectContext;
pub use error::{EffectError, RuntimeError};
pub use store::{Store, StoreBuilder, INIT_ACTION};
pub use task::{TaskHandle, TaskId};
