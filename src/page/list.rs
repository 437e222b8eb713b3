//! Paginated list page.
//!
//! Records go into the entity cache; the page keeps only the ordered ids of
//! the pages loaded so far. `initiate` loads page one and replaces `data`,
//! `loadMore` appends the next page.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::fetch::ListFetcher;
use super::flight;
use super::ops::*;
use super::status::{self, Failure, LoadStatus, DEFAULT_FAILURE_MESSAGE};
use super::{base_layer, INITIATE_STATUS};
use crate::entities::{EntityCache, EntityId, Schema};
use crate::model::{Action, Effect, Layer, Model, ModelBuilder, Namespace, SliceState, Transition};
use crate::runtime::{EffectContext, EffectError};

const LOAD_MORE_STATUS: &str = "load_more";

/// Key some APIs use for `has_more`.
const HAS_MORE_CAMEL: &str = "hasMore";

/// Pagination metadata. Fields beyond `page` and `has_more` are kept as-is;
/// an incoming `hasMore` is read as `has_more`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListMeta {
    pub page: u64,
    pub has_more: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ListMeta {
    fn default() -> Self {
        Self {
            page: 1,
            has_more: false,
            extra: Map::new(),
        }
    }
}

impl ListMeta {
    /// Shallow merge of an incoming meta object over this one.
    fn merged(&self, incoming: &Value) -> Self {
        let Value::Object(incoming) = incoming else {
            return self.clone();
        };
        let mut fields = match serde_json::to_value(self) {
            Ok(Value::Object(fields)) => fields,
            _ => return self.clone(),
        };
        for (key, value) in incoming {
            let key = if key == HAS_MORE_CAMEL { "has_more" } else { key.as_str() };
            fields.insert(key.to_string(), value.clone());
        }
        match serde_json::from_value(Value::Object(fields)) {
            Ok(meta) => meta,
            Err(err) => {
                tracing::warn!(error = %err, "Ignoring malformed list meta");
                self.clone()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListPageState {
    pub params: Value,
    pub invalidate: bool,
    pub initiate: LoadStatus,
    pub load_more: LoadStatus,
    pub meta: ListMeta,
    pub data: Option<Vec<EntityId>>,
    pub extras: Value,
}

impl Default for ListPageState {
    fn default() -> Self {
        Self {
            params: Value::Null,
            invalidate: true,
            initiate: LoadStatus::default(),
            load_more: LoadStatus::default(),
            meta: ListMeta::default(),
            data: None,
            extras: Value::Null,
        }
    }
}

impl SliceState for ListPageState {}

#[derive(Clone)]
pub struct ListPageConfig {
    pub fetcher: Arc<dyn ListFetcher>,
    pub schema: Arc<dyn Schema>,
    pub cache: EntityCache,
    /// Page number requested by `loadMore`, given the current one.
    pub next_page: Arc<dyn Fn(u64) -> u64 + Send + Sync>,
    pub failure_message: String,
}

impl ListPageConfig {
    pub fn new(
        fetcher: impl ListFetcher + 'static,
        schema: impl Schema + 'static,
        cache: EntityCache,
    ) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            schema: Arc::new(schema),
            cache,
            next_page: Arc::new(|page| page + 1),
            failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
        }
    }

    pub fn next_page(mut self, next: impl Fn(u64) -> u64 + Send + Sync + 'static) -> Self {
        self.next_page = Arc::new(next);
        self
    }

    pub fn failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }
}

/// Everything the list effects share.
struct ListEffects {
    config: ListPageConfig,
}

impl ListEffects {
    async fn initiate(&self, ctx: EffectContext, action: Action) -> Result<(), EffectError> {
        let request = ctx.action(INITIATE_REQUEST, action.payload.clone(), Value::Null)?;
        if !ctx.dispatch_if(flight::idle(INITIATE_STATUS), request) {
            tracing::trace!(namespace = %ctx.model().namespace(), "Initiate already in flight");
            return Ok(());
        }
        // A page-two response landing after a fresh page one would corrupt `data`.
        ctx.cancel_task(LOAD_MORE);

        match self.load_first(&ctx, &action).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::debug!(namespace = %ctx.model().namespace(), error = %err, "Initiate failed");
                let failure = Failure::from_effect(&err, &self.config.failure_message);
                ctx.put(INITIATE_FAILURE, failure.to_payload(), Value::Null)
            }
        }
    }

    async fn load_first(&self, ctx: &EffectContext, action: &Action) -> Result<(), EffectError> {
        let response = self
            .config
            .fetcher
            .fetch(1, action.payload.clone(), action.meta.clone())
            .await?;
        let normalized = self.config.schema.create(&response.data)?;
        ctx.dispatch(self.config.cache.append(&normalized));
        if let Some(extras) = response.extras {
            ctx.put(UPDATE_EXTRAS_SUCCESS, extras, Value::Null)?;
        }
        let ids = self.config.schema.result(&normalized);
        ctx.put(
            INITIATE_SUCCESS,
            serde_json::to_value(ids)?,
            with_page(response.meta, 1),
        )
    }

    async fn load_more(&self, ctx: EffectContext) -> Result<(), EffectError> {
        let request = ctx.action(LOAD_MORE_REQUEST, Value::Null, Value::Null)?;
        let mut snapshot = None;
        let accepted = ctx.dispatch_if(
            |slice| {
                let ready = flight::flag(slice, &["meta", "has_more"])
                    && !flight::loading(slice, INITIATE_STATUS)
                    && !flight::loading(slice, LOAD_MORE_STATUS);
                if ready {
                    let page = slice["meta"]["page"].as_u64().unwrap_or(1);
                    snapshot = Some((slice["params"].clone(), page));
                }
                ready
            },
            request,
        );
        let Some((params, page)) = snapshot.filter(|_| accepted) else {
            return Ok(());
        };

        let next = (self.config.next_page)(page);
        match self.fetch_page(&ctx, next, params).await {
            Ok((ids, meta)) => {
                let success = ctx.action(
                    LOAD_MORE_SUCCESS,
                    json!({ "meta": meta, "data": ids }),
                    Value::Null,
                )?;
                // A fresh initiate owns `data` now.
                if !ctx.dispatch_if(flight::idle(INITIATE_STATUS), success) {
                    ctx.put(LOAD_MORE_CANCEL, Value::Null, Value::Null)?;
                }
                Ok(())
            }
            Err(err) => {
                tracing::debug!(namespace = %ctx.model().namespace(), page = next, error = %err, "Load more failed");
                let failure = Failure::from_effect(&err, &self.config.failure_message);
                ctx.put(LOAD_MORE_FAILURE, failure.to_payload(), Value::Null)
            }
        }
    }

    async fn fetch_page(
        &self,
        ctx: &EffectContext,
        page: u64,
        params: Value,
    ) -> Result<(Vec<EntityId>, Value), EffectError> {
        let response = self.config.fetcher.fetch(page, params, Value::Null).await?;
        let normalized = self.config.schema.create(&response.data)?;
        ctx.dispatch(self.config.cache.append(&normalized));
        Ok((self.config.schema.result(&normalized), with_page(response.meta, page)))
    }
}

/// `meta` as an object whose `page` falls back to `page`.
fn with_page(meta: Value, page: u64) -> Value {
    let mut fields = match meta {
        Value::Object(fields) => fields,
        _ => Map::new(),
    };
    let has_page = fields
        .get("page")
        .and_then(Value::as_u64)
        .is_some_and(|page| page != 0);
    if !has_page {
        fields.insert("page".to_string(), json!(page));
    }
    Value::Object(fields)
}

fn list_layer(failure_message: &str) -> Layer {
    let message = failure_message.to_string();
    Layer::new()
        .default_typed::<ListPageState>()
        .transition(
            UPDATE_EXTRAS_SUCCESS,
            Transition::typed(|mut state: ListPageState, action: &Action| {
                state.extras = action.payload.clone();
                state
            }),
        )
        .transition(
            INITIATE_REQUEST,
            Transition::typed(|mut state: ListPageState, action: &Action| {
                state.params = action.payload.clone();
                state.initiate = LoadStatus::loading();
                state
            }),
        )
        .transition(
            INITIATE_SUCCESS,
            Transition::typed(|mut state: ListPageState, action: &Action| {
                state.invalidate = false;
                state.initiate = LoadStatus::default();
                state.meta = state.meta.merged(&action.meta);
                state.data = Some(action.payload_as().unwrap_or_default());
                state
            }),
        )
        .transition(
            LOAD_MORE_REQUEST,
            Transition::typed(|mut state: ListPageState, _: &Action| {
                state.load_more = LoadStatus::loading();
                state
            }),
        )
        .transition(
            LOAD_MORE_FAILURE,
            Transition::typed(move |mut state: ListPageState, action: &Action| {
                state.load_more = status::status_after_failure(&action.payload, &message);
                state
            }),
        )
        .transition(
            LOAD_MORE_CANCEL,
            Transition::typed(|mut state: ListPageState, _: &Action| {
                state.load_more = LoadStatus::default();
                state
            }),
        )
        .transition(
            LOAD_MORE_SUCCESS,
            Transition::typed(|mut state: ListPageState, action: &Action| {
                state.load_more = LoadStatus::default();
                state.meta = state.meta.merged(&action.payload["meta"]);
                let more: Vec<EntityId> =
                    serde_json::from_value(action.payload["data"].clone()).unwrap_or_default();
                state.data.get_or_insert_with(Vec::new).extend(more);
                state
            }),
        )
}

/// List page bound to a namespace.
#[derive(Clone)]
pub struct ListPage {
    model: Model,
    schema: Arc<dyn Schema>,
    cache: EntityCache,
}

impl ListPage {
    pub fn new(namespace: Namespace, config: ListPageConfig) -> Self {
        let schema = Arc::clone(&config.schema);
        let cache = config.cache.clone();
        let message = config.failure_message.clone();
        let effects = Arc::new(ListEffects { config });

        let initiate = {
            let effects = Arc::clone(&effects);
            Effect::new(move |ctx, action| {
                let effects = Arc::clone(&effects);
                async move { effects.initiate(ctx, action).await }
            })
            .on_cancel(flight::settle_on_cancel(INITIATE_STATUS, INITIATE_FAILURE))
        };
        let load_more = {
            let effects = Arc::clone(&effects);
            Effect::new(move |ctx, _action| {
                let effects = Arc::clone(&effects);
                async move { effects.load_more(ctx).await }
            })
            .on_cancel(flight::settle_on_cancel(LOAD_MORE_STATUS, LOAD_MORE_FAILURE))
        };
        let update_extras = Effect::new(|ctx, action| async move {
            if !action.payload.is_null() {
                ctx.put(UPDATE_EXTRAS_SUCCESS, action.payload, Value::Null)?;
            }
            Ok(())
        });

        let model = ModelBuilder::new(namespace)
            .layer(base_layer(&message))
            .layer(
                list_layer(&message)
                    .effect(INITIATE, initiate)
                    .effect(LOAD_MORE, load_more)
                    .effect(UPDATE_EXTRAS, update_extras),
            )
            .build();

        Self {
            model,
            schema,
            cache,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn namespace(&self) -> &Namespace {
        self.model.namespace()
    }

    fn op(&self, name: &str, payload: Value, meta: Value) -> Action {
        Action::new(self.namespace().type_for(name))
            .with_payload(payload)
            .with_meta(meta)
    }

    pub fn initiate(&self, params: Value, meta: Value) -> Action {
        self.op(INITIATE, params, meta)
    }

    pub fn initiate_if_need(&self, params: Value, meta: Value) -> Action {
        self.op(INITIATE_IF_NEED, params, meta)
    }

    pub fn load_more(&self) -> Action {
        self.op(LOAD_MORE, Value::Null, Value::Null)
    }

    /// Re-run `initiate`; `null` params reuse the current ones.
    pub fn refresh(&self, params: Value, meta: Value) -> Action {
        self.op(REFRESH, params, meta)
    }

    pub fn invalidate(&self) -> Action {
        self.op(INVALIDATE, Value::Null, Value::Null)
    }

    pub fn update_extras(&self, extras: Value) -> Action {
        self.op(UPDATE_EXTRAS, extras, Value::Null)
    }

    pub fn state(&self, root: &Value) -> ListPageState {
        self.model
            .state(root)
            .and_then(|slice| serde_json::from_value(slice.clone()).ok())
            .unwrap_or_default()
    }

    pub fn is_invalidate(&self, root: &Value) -> bool {
        self.state(root).invalidate
    }

    pub fn params(&self, root: &Value) -> Value {
        self.state(root).params
    }

    pub fn meta(&self, root: &Value) -> ListMeta {
        self.state(root).meta
    }

    pub fn page(&self, root: &Value) -> u64 {
        self.meta(root).page
    }

    pub fn has_more(&self, root: &Value) -> bool {
        self.meta(root).has_more
    }

    /// Loaded ids, empty before the first successful initiate.
    pub fn data(&self, root: &Value) -> Vec<EntityId> {
        self.state(root).data.unwrap_or_default()
    }

    /// Loaded records, in page order.
    pub fn records(&self, root: &Value) -> Vec<Value> {
        self.cache
            .denormalize(root, self.schema.as_ref(), &self.data(root))
    }

    pub fn extras(&self, root: &Value) -> Value {
        self.state(root).extras
    }

    pub fn initiate_status(&self, root: &Value) -> LoadStatus {
        self.state(root).initiate
    }

    pub fn load_more_status(&self, root: &Value) -> LoadStatus {
        self.state(root).load_more
    }

    pub fn is_initiated(&self, root: &Value) -> bool {
        self.state(root).data.is_some_and(|data| !data.is_empty())
    }
}

impl From<ListPage> for Model {
    fn from(page: ListPage) -> Self {
        page.model
    }
}

impl From<&ListPage> for Model {
    fn from(page: &ListPage) -> Self {
        page.model.clone()
    }
}
