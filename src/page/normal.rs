//! Page holding a raw payload. No cache, no pagination.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::fetch::NormalFetcher;
use super::flight;
use super::ops::*;
use super::status::{Failure, LoadStatus, DEFAULT_FAILURE_MESSAGE};
use super::{base_layer, INITIATE_STATUS};
use crate::model::{Action, Effect, Layer, Model, ModelBuilder, Namespace, SliceState, Transition};
use crate::runtime::{EffectContext, EffectError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalPageState {
    pub params: Value,
    pub invalidate: bool,
    pub initiate: LoadStatus,
    pub data: Value,
}

impl Default for NormalPageState {
    fn default() -> Self {
        Self {
            params: Value::Null,
            invalidate: true,
            initiate: LoadStatus::default(),
            data: Value::Null,
        }
    }
}

impl SliceState for NormalPageState {}

#[derive(Clone)]
pub struct NormalPageConfig {
    pub fetcher: Arc<dyn NormalFetcher>,
    pub failure_message: String,
}

impl NormalPageConfig {
    pub fn new(fetcher: impl NormalFetcher + 'static) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
        }
    }

    pub fn failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }
}

async fn initiate(config: &NormalPageConfig, ctx: EffectContext, action: Action) -> Result<(), EffectError> {
    let request = ctx.action(INITIATE_REQUEST, action.payload.clone(), Value::Null)?;
    if !ctx.dispatch_if(flight::idle(INITIATE_STATUS), request) {
        return Ok(());
    }

    match config.fetcher.fetch(action.payload, action.meta).await {
        Ok(response) => ctx.put(INITIATE_SUCCESS, response.data, Value::Null),
        Err(err) => {
            tracing::debug!(namespace = %ctx.model().namespace(), error = %err, "Initiate failed");
            let failure = Failure::normalize(&err, &config.failure_message);
            ctx.put(INITIATE_FAILURE, failure.to_payload(), Value::Null)
        }
    }
}

fn normal_layer() -> Layer {
    Layer::new()
        .default_typed::<NormalPageState>()
        .transition(
            INITIATE_REQUEST,
            Transition::typed(|mut state: NormalPageState, action: &Action| {
                state.params = action.payload.clone();
                state.initiate = LoadStatus::loading();
                state
            }),
        )
        .transition(
            INITIATE_SUCCESS,
            Transition::typed(|mut state: NormalPageState, action: &Action| {
                state.invalidate = false;
                state.initiate = LoadStatus::default();
                state.data = action.payload.clone();
                state
            }),
        )
}

#[derive(Clone)]
pub struct NormalPage {
    model: Model,
}

impl NormalPage {
    pub fn new(namespace: Namespace, config: NormalPageConfig) -> Self {
        let message = config.failure_message.clone();
        let config = Arc::new(config);
        let effect = Effect::new(move |ctx, action| {
            let config = Arc::clone(&config);
            async move { initiate(&config, ctx, action).await }
        })
        .on_cancel(flight::settle_on_cancel(INITIATE_STATUS, INITIATE_FAILURE));

        let model = ModelBuilder::new(namespace)
            .layer(base_layer(&message))
            .layer(normal_layer().effect(INITIATE, effect))
            .build();
        Self { model }
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

    pub fn refresh(&self, params: Value, meta: Value) -> Action {
        self.op(REFRESH, params, meta)
    }

    pub fn invalidate(&self) -> Action {
        self.op(INVALIDATE, Value::Null, Value::Null)
    }

    pub fn state(&self, root: &Value) -> NormalPageState {
        self.model
            .state(root)
            .and_then(|slice| serde_json::from_value(slice.clone()).ok())
            .unwrap_or_default()
    }

    pub fn params(&self, root: &Value) -> Value {
        self.state(root).params
    }

    pub fn is_invalidate(&self, root: &Value) -> bool {
        self.state(root).invalidate
    }

    pub fn initiate_status(&self, root: &Value) -> LoadStatus {
        self.state(root).initiate
    }

    pub fn data(&self, root: &Value) -> Value {
        self.state(root).data
    }
}

impl From<NormalPage> for Model {
    fn from(page: NormalPage) -> Self {
        page.model
    }
}

impl From<&NormalPage> for Model {
    fn from(page: &NormalPage) -> Self {
        page.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{FetchError, NormalResponse};
    use serde_json::json;

    fn page() -> NormalPage {
        let fetcher = |_params: Value, _meta: Value| async {
            Ok::<_, FetchError>(NormalResponse { data: json!({"ok": true}) })
        };
        NormalPage::new(Namespace::parse("settings").unwrap(), NormalPageConfig::new(fetcher))
    }

    #[test]
    fn types_cover_base_and_own_operations() {
        let page = page();
        let model = page.model();
        for name in [INITIATE, INITIATE_IF_NEED, REFRESH, INVALIDATE, INITIATE_FAILURE, INITIATE_SUCCESS] {
            assert_eq!(model.type_of(name), Some(format!("settings/{}", name).as_str()));
        }
        assert_eq!(model.type_of(LOAD_MORE), None);
    }

    #[test]
    fn invalidate_keeps_data() {
        let page = page();
        let state = json!({"params": null, "invalidate": false, "initiate": {}, "data": [1]});
        let state = page.model().reduce(Some(state), &page.invalidate());
        assert_eq!(state["invalidate"], json!(true));
        assert_eq!(state["data"], json!([1]));
    }

    #[test]
    fn failure_is_normalized() {
        let page = page();
        let failure = Action::new("settings/initiateFailure").with_payload(json!({"code": 0, "message": ""}));
        let state = page.model().reduce(None, &failure);
        assert_eq!(
            state["initiate"],
            json!({"error": -1, "message": "Failed to load", "loading": false})
        );
    }
}
