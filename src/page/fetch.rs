//! Fetch collaborators: the opaque API calls behind each page.
//!
//! Each trait is implemented for any matching async closure, so a page can
//! be wired with `|page, params, meta| async move { ... }`.

use std::future::Future;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::status::FetchError;
use crate::entities::EntityId;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    /// Raw records, normalized by the page's schema.
    pub data: Value,
    /// Pagination metadata, merged into the page's `meta`.
    #[serde(default)]
    pub meta: Value,
    #[serde(default)]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailResponse {
    pub data: Value,
    #[serde(default)]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalResponse {
    pub data: Value,
}

#[async_trait]
pub trait ListFetcher: Send + Sync {
    async fn fetch(&self, page: u64, params: Value, meta: Value) -> Result<ListResponse, FetchError>;
}

#[async_trait]
pub trait DetailFetcher: Send + Sync {
    async fn fetch(&self, id: EntityId, meta: Value) -> Result<DetailResponse, FetchError>;
}

#[async_trait]
pub trait NormalFetcher: Send + Sync {
    async fn fetch(&self, params: Value, meta: Value) -> Result<NormalResponse, FetchError>;
}

#[async_trait]
impl<F, Fut> ListFetcher for F
where
    F: Fn(u64, Value, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ListResponse, FetchError>> + Send,
{
    async fn fetch(&self, page: u64, params: Value, meta: Value) -> Result<ListResponse, FetchError> {
        self(page, params, meta).await
    }
}

#[async_trait]
impl<F, Fut> DetailFetcher for F
where
    F: Fn(EntityId, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<DetailResponse, FetchError>> + Send,
{
    async fn fetch(&self, id: EntityId, meta: Value) -> Result<DetailResponse, FetchError> {
        self(id, meta).await
    }
}

#[async_trait]
impl<F, Fut> NormalFetcher for F
where
    F: Fn(Value, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<NormalResponse, FetchError>> + Send,
{
    async fn fetch(&self, params: Value, meta: Value) -> Result<NormalResponse, FetchError> {
        self(params, meta).await
    }
}
