//! Detail page: one record by id.
//!
//! Switching to another id resets the whole slice first, so nothing from the
//! previous subject survives. A response for an id that is no longer held
//! is dropped.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fetch::DetailFetcher;
use super::flight;
use super::ops::*;
use super::status::{Failure, LoadStatus, DEFAULT_FAILURE_MESSAGE};
use super::{base_layer, INITIATE_STATUS};
use crate::entities::{EntityCache, EntityId, Schema};
use crate::model::{Action, Effect, Layer, Model, ModelBuilder, Namespace, SliceState, Transition};
use crate::runtime::{EffectContext, EffectError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailPageState {
    pub id: Option<EntityId>,
    pub invalidate: bool,
    pub initiate: LoadStatus,
    pub extras: Value,
}

impl Default for DetailPageState {
    fn default() -> Self {
        Self {
            id: None,
            invalidate: true,
            initiate: LoadStatus::default(),
            extras: Value::Null,
        }
    }
}

impl SliceState for DetailPageState {}

#[derive(Clone)]
pub struct DetailPageConfig {
    pub fetcher: Arc<dyn DetailFetcher>,
    pub schema: Arc<dyn Schema>,
    pub cache: EntityCache,
    pub failure_message: String,
}

impl DetailPageConfig {
    pub fn new(
        fetcher: impl DetailFetcher + 'static,
        schema: impl Schema + 'static,
        cache: EntityCache,
    ) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            schema: Arc::new(schema),
            cache,
            failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
        }
    }

    pub fn failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }
}

fn held_id(slice: &Value) -> Option<EntityId> {
    slice.get("id").and_then(EntityId::from_value)
}

fn requested_id(action: &Action) -> Result<EntityId, EffectError> {
    EntityId::from_value(&action.payload)
        .ok_or_else(|| EffectError::Other(format!("Invalid detail id: {}", action.payload)))
}

struct DetailEffects {
    config: DetailPageConfig,
}

impl DetailEffects {
    /// On an id change, cancel every other tracked task and reset the slice.
    fn switch_subject(&self, ctx: &EffectContext, id: &EntityId, keep: &str) -> Result<(), EffectError> {
        let held = ctx.select(|root| ctx.model().state(root).and_then(held_id));
        match held {
            Some(held) if held != *id => {
                tracing::debug!(namespace = %ctx.model().namespace(), from = %held, to = %id, "Switching detail subject");
                ctx.cancel_except(keep);
                ctx.put(RESET, ctx.model().default_state().clone(), Value::Null)
            }
            _ => Ok(()),
        }
    }

    async fn initiate(&self, ctx: EffectContext, action: Action) -> Result<(), EffectError> {
        let id = requested_id(&action)?;
        self.switch_subject(&ctx, &id, INITIATE)?;

        let request = ctx.action(INITIATE_REQUEST, id.to_value(), Value::Null)?;
        if !ctx.dispatch_if(flight::idle(INITIATE_STATUS), request) {
            tracing::trace!(namespace = %ctx.model().namespace(), id = %id, "Initiate already in flight");
            return Ok(());
        }

        let commit = match self.load(&ctx, &id, action.meta).await {
            Ok(extras) => ctx.action(INITIATE_SUCCESS, extras, Value::Null)?,
            Err(err) => {
                tracing::debug!(namespace = %ctx.model().namespace(), id = %id, error = %err, "Initiate failed");
                let failure = Failure::from_effect(&err, &self.config.failure_message);
                ctx.action(INITIATE_FAILURE, failure.to_payload(), Value::Null)?
            }
        };
        if !ctx.dispatch_if(|slice| held_id(slice).as_ref() == Some(&id), commit) {
            tracing::debug!(namespace = %ctx.model().namespace(), id = %id, "Dropping response for a superseded id");
        }
        Ok(())
    }

    async fn load(&self, ctx: &EffectContext, id: &EntityId, meta: Value) -> Result<Value, EffectError> {
        let response = self.config.fetcher.fetch(id.clone(), meta).await?;
        let normalized = self.config.schema.create(&response.data)?;
        ctx.dispatch(self.config.cache.append(&normalized));
        Ok(response.extras.unwrap_or(Value::Null))
    }

    async fn initiate_if_need(&self, ctx: EffectContext, action: Action) -> Result<(), EffectError> {
        let id = requested_id(&action)?;
        self.switch_subject(&ctx, &id, INITIATE_IF_NEED)?;
        if flight::field(&ctx, "invalidate").as_bool().unwrap_or(false) {
            ctx.put(INITIATE, action.payload, action.meta)?;
        }
        Ok(())
    }
}

fn detail_layer() -> Layer {
    Layer::new()
        .default_typed::<DetailPageState>()
        .transition(
            RESET,
            Transition::new(|state, action| match &action.payload {
                Value::Object(_) => action.payload.clone(),
                _ => state,
            }),
        )
        .transition(
            INITIATE_REQUEST,
            Transition::typed(|mut state: DetailPageState, action: &Action| {
                state.id = EntityId::from_value(&action.payload);
                state.initiate = LoadStatus::loading();
                state
            }),
        )
        .transition(
            INITIATE_SUCCESS,
            Transition::typed(|mut state: DetailPageState, action: &Action| {
                state.invalidate = false;
                state.initiate = LoadStatus::default();
                state.extras = action.payload.clone();
                state
            }),
        )
}

/// Detail page bound to a namespace.
#[derive(Clone)]
pub struct DetailPage {
    model: Model,
    schema: Arc<dyn Schema>,
    cache: EntityCache,
}

impl DetailPage {
    pub fn new(namespace: Namespace, config: DetailPageConfig) -> Self {
        let schema = Arc::clone(&config.schema);
        let cache = config.cache.clone();
        let message = config.failure_message.clone();
        let effects = Arc::new(DetailEffects { config });

        let initiate = {
            let effects = Arc::clone(&effects);
            Effect::new(move |ctx, action| {
                let effects = Arc::clone(&effects);
                async move { effects.initiate(ctx, action).await }
            })
            .on_cancel(|ctx: &EffectContext, action: &Action| {
                // Only settle the flight this task started.
                let id = EntityId::from_value(&action.payload);
                flight::settle(ctx, INITIATE_STATUS, INITIATE_FAILURE, |slice| {
                    id.is_some() && held_id(slice) == id
                });
            })
        };
        let initiate_if_need = {
            let effects = Arc::clone(&effects);
            Effect::new(move |ctx, action| {
                let effects = Arc::clone(&effects);
                async move { effects.initiate_if_need(ctx, action).await }
            })
        };
        let refresh = Effect::new(|ctx, action| async move {
            let id = if action.payload.is_null() {
                flight::field(&ctx, "id")
            } else {
                action.payload
            };
            if id.is_null() {
                return Ok(());
            }
            ctx.put(INITIATE, id, action.meta)
        });

        let model = ModelBuilder::new(namespace)
            .layer(base_layer(&message))
            .layer(
                detail_layer()
                    .effect(INITIATE, initiate)
                    .effect(INITIATE_IF_NEED, initiate_if_need)
                    .effect(REFRESH, refresh),
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

    pub fn initiate(&self, id: impl Into<EntityId>, meta: Value) -> Action {
        self.op(INITIATE, id.into().to_value(), meta)
    }

    pub fn initiate_if_need(&self, id: impl Into<EntityId>, meta: Value) -> Action {
        self.op(INITIATE_IF_NEED, id.into().to_value(), meta)
    }

    /// Reload `id`, or the held id when `None`.
    pub fn refresh(&self, id: Option<EntityId>, meta: Value) -> Action {
        let payload = id.map(|id| id.to_value()).unwrap_or(Value::Null);
        self.op(REFRESH, payload, meta)
    }

    pub fn invalidate(&self) -> Action {
        self.op(INVALIDATE, Value::Null, Value::Null)
    }

    pub fn state(&self, root: &Value) -> DetailPageState {
        self.model
            .state(root)
            .and_then(|slice| serde_json::from_value(slice.clone()).ok())
            .unwrap_or_default()
    }

    pub fn id(&self, root: &Value) -> Option<EntityId> {
        self.state(root).id
    }

    pub fn is_invalidate(&self, root: &Value) -> bool {
        self.state(root).invalidate
    }

    pub fn initiate_status(&self, root: &Value) -> LoadStatus {
        self.state(root).initiate
    }

    /// The held record, read through the cache.
    pub fn detail(&self, root: &Value) -> Option<Value> {
        let id = self.id(root)?;
        self.cache.entity(root, self.schema.as_ref(), &id)
    }

    pub fn is_initiated(&self, root: &Value) -> bool {
        self.detail(root)
            .and_then(|record| record.as_object().map(|fields| !fields.is_empty()))
            .unwrap_or(false)
    }

    pub fn extras(&self, root: &Value) -> Value {
        self.state(root).extras
    }
}

impl From<DetailPage> for Model {
    fn from(page: DetailPage) -> Self {
        page.model
    }
}

impl From<&DetailPage> for Model {
    fn from(page: &DetailPage) -> Self {
        page.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EntitySchema;
    use crate::page::{DetailResponse, FetchError};
    use serde_json::json;

    fn page() -> DetailPage {
        let fetcher = |_id: EntityId, _meta: Value| async {
            Ok::<_, FetchError>(DetailResponse::default())
        };
        DetailPage::new(
            Namespace::parse("article").unwrap(),
            DetailPageConfig::new(
                fetcher,
                EntitySchema::new("articles"),
                EntityCache::with_default_namespace().unwrap(),
            ),
        )
    }

    #[test]
    fn reset_replaces_the_slice() {
        let page = page();
        let dirty = json!({"id": 3, "invalidate": false, "initiate": {"loading": true}, "extras": {"x": 1}});
        let reset = Action::new("article/reset").with_payload(page.model().default_state().clone());
        let state = page.model().reduce(Some(dirty), &reset);
        assert_eq!(&state, page.model().default_state());
    }

    #[test]
    fn request_records_id() {
        let page = page();
        let state = page
            .model()
            .reduce(None, &Action::new("article/initiateRequest").with_payload(json!("a-1")));
        assert_eq!(state["id"], json!("a-1"));
        assert_eq!(state["initiate"]["loading"], json!(true));
    }

    #[test]
    fn detail_reads_through_cache() {
        let page = page();
        let root = json!({
            "article": {"id": 7, "invalidate": false, "initiate": {}, "extras": null},
            "@entities": {"records": {"articles": {"7": {"id": 7, "title": "hello"}}}, "index": {}},
        });
        assert_eq!(page.detail(&root).unwrap()["title"], json!("hello"));
        assert!(page.is_initiated(&root));
        assert_eq!(page.id(&root), Some(EntityId::Int(7)));
    }

    #[test]
    fn refresh_without_id_has_null_payload() {
        let page = page();
        assert_eq!(page.refresh(None, Value::Null).payload, Value::Null);
        assert_eq!(page.refresh(Some(EntityId::Int(2)), Value::Null).payload, json!(2));
    }
}
