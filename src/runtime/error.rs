use thiserror::Error;

use crate::entities::SchemaError;
use crate::model::ModelError;
use crate::page::FetchError;

/// Errors raised by the store's effect driver.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// `Store::run` was called outside a tokio runtime.
    #[error("No tokio runtime available to drive effects")]
    NoRuntime,

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Errors returned from an effect body.
///
/// They never escape the task: the scheduler logs them and moves on.
#[derive(Debug, Error)]
pub enum EffectError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
