//! Page state machines built on the runtime.
//!
//! # Architecture
//!
//! - `status.rs` - Load status records and failure normalization
//! - `fetch.rs` - Fetch collaborator traits and their responses
//! - `flight.rs` - Single-flight guards and cancellation cleanup
//! - `list.rs` - Paginated list over the entity cache
//! - `detail.rs` - One record by id
//! - `normal.rs` - Raw payload, no cache
//!
//! Every page stacks its own layer over a shared base layer that owns
//! `invalidate`, `initiateFailure`, `initiateIfNeed` and `refresh`.

mod detail;
mod fetch;
mod flight;
mod list;
mod normal;
mod status;

use serde_json::{json, Value};

pub use detail::{DetailPage, DetailPageConfig, DetailPageState};
pub use fetch::{DetailFetcher, DetailResponse, ListFetcher, ListResponse, NormalFetcher, NormalResponse};
pub use list::{ListMeta, ListPage, ListPageConfig, ListPageState};
pub use normal::{NormalPage, NormalPageConfig, NormalPageState};
pub use status::{Failure, FetchError, LoadStatus, DEFAULT_FAILURE_MESSAGE, UNKNOWN_ERROR_CODE};

use crate::model::{Effect, Layer, Model, Namespace, Transition};

/// Operation names shared by the page machines.
pub mod ops {
    pub const INVALIDATE: &str = "invalidate";
    pub const INITIATE: &str = "initiate";
    pub const INITIATE_IF_NEED: &str = "initiateIfNeed";
    pub const INITIATE_REQUEST: &str = "initiateRequest";
    pub const INITIATE_SUCCESS: &str = "initiateSuccess";
    pub const INITIATE_FAILURE: &str = "initiateFailure";
    pub const REFRESH: &str = "refresh";
    pub const RESET: &str = "reset";
    pub const LOAD_MORE: &str = "loadMore";
    pub const LOAD_MORE_REQUEST: &str = "loadMoreRequest";
    pub const LOAD_MORE_SUCCESS: &str = "loadMoreSuccess";
    pub const LOAD_MORE_FAILURE: &str = "loadMoreFailure";
    pub const LOAD_MORE_CANCEL: &str = "loadMoreCancel";
    pub const UPDATE_EXTRAS: &str = "updateExtras";
    pub const UPDATE_EXTRAS_SUCCESS: &str = "updateExtrasSuccess";
}

/// State field holding the `initiate` load status.
pub(crate) const INITIATE_STATUS: &str = "initiate";

/// Layer common to all pages.
pub(crate) fn base_layer(failure_message: &str) -> Layer {
    let message = failure_message.to_string();
    Layer::new()
        .default_field("invalidate", json!(true))
        .default_field(INITIATE_STATUS, json!(LoadStatus::default()))
        .transition(
            ops::INVALIDATE,
            Transition::new(|mut state, _| {
                if let Value::Object(fields) = &mut state {
                    fields.insert("invalidate".to_string(), Value::Bool(true));
                }
                state
            }),
        )
        .transition(
            ops::INITIATE_FAILURE,
            Transition::new(move |mut state, action| {
                let status = status::status_after_failure(&action.payload, &message);
                if let Value::Object(fields) = &mut state {
                    fields.insert(INITIATE_STATUS.to_string(), json!(status));
                }
                state
            }),
        )
        .effect(
            ops::INITIATE_IF_NEED,
            Effect::new(|ctx, action| async move {
                if flight::field(&ctx, "invalidate").as_bool().unwrap_or(false) {
                    ctx.put(ops::INITIATE, action.payload, action.meta)?;
                }
                Ok(())
            }),
        )
        .effect(
            ops::REFRESH,
            Effect::new(|ctx, action| async move {
                let params = if action.payload.is_null() {
                    flight::field(&ctx, "params")
                } else {
                    action.payload
                };
                ctx.put(ops::INITIATE, params, action.meta)
            }),
        )
}

/// Configuration for any page variant.
#[derive(Clone)]
pub enum PageConfig {
    List(ListPageConfig),
    Detail(DetailPageConfig),
    Normal(NormalPageConfig),
}

/// A built page of any variant.
#[derive(Clone)]
pub enum Page {
    List(ListPage),
    Detail(DetailPage),
    Normal(NormalPage),
}

impl Page {
    pub fn new(namespace: Namespace, config: PageConfig) -> Self {
        match config {
            PageConfig::List(config) => Page::List(ListPage::new(namespace, config)),
            PageConfig::Detail(config) => Page::Detail(DetailPage::new(namespace, config)),
            PageConfig::Normal(config) => Page::Normal(NormalPage::new(namespace, config)),
        }
    }

    pub fn model(&self) -> &Model {
        match self {
            Page::List(page) => page.model(),
            Page::Detail(page) => page.model(),
            Page::Normal(page) => page.model(),
        }
    }

    pub fn namespace(&self) -> &Namespace {
        self.model().namespace()
    }

    pub fn invalidate(&self) -> crate::model::Action {
        match self {
            Page::List(page) => page.invalidate(),
            Page::Detail(page) => page.invalidate(),
            Page::Normal(page) => page.invalidate(),
        }
    }
}

impl From<Page> for Model {
    fn from(page: Page) -> Self {
        page.model().clone()
    }
}

impl From<&Page> for Model {
    fn from(page: &Page) -> Self {
        page.model().clone()
    }
}
