//! Reactive state-model runtime.
//!
//! A model is a named state slice described by a default state, pure
//! transitions and asynchronous effects. Registering it in a [`Store`]
//! derives its action types, folds its transitions into the root reducer and
//! spawns one watcher per effect.
//!
//! ```text
//! dispatch ──→ reducers ──→ state tree ──→ select
//!    │                                       ↑
//!    └──→ watcher ──→ fork(effect) ──────────┘
//! ```
//!
//! On top of the runtime sit three page machines ([`ListPage`],
//! [`DetailPage`], [`NormalPage`]) sharing a normalized [`EntityCache`].

pub mod config;
pub mod entities;
pub mod logging;
pub mod model;
pub mod page;
pub mod runtime;

pub use config::{Config, ConfigError};
pub use entities::{
    EntityCache, EntityId, EntitySchema, EntitySource, Normalized, ResultIds, Schema, SchemaError,
};
pub use model::{
    Action, ActionCreator, Effect, Layer, Model, ModelBuilder, ModelError, Namespace, SliceState,
    Transition,
};
pub use page::{
    DetailPage, DetailPageConfig, FetchError, ListPage, ListPageConfig, LoadStatus, NormalPage,
    NormalPageConfig, Page, PageConfig,
};
pub use runtime::{EffectContext, EffectError, RuntimeError, Store, StoreBuilder, TaskHandle, TaskId};
