//! Demo wiring: one store, one page, an in-memory catalog as the API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use slicekit::page::{DetailResponse, ListResponse, NormalResponse};
use slicekit::{
    Config, DetailPage, DetailPageConfig, EntityId, EntitySchema, FetchError, ListPage,
    ListPageConfig, Namespace, NormalPage, NormalPageConfig, Store,
};

use crate::DemoPage;

const PAGE_SIZE: usize = 3;

struct Catalog {
    articles: Vec<Value>,
}

impl Catalog {
    fn new() -> Self {
        let articles = (1..=8)
            .map(|id: i64| {
                let parity = if id % 2 == 0 { "even" } else { "odd" };
                json!({ "id": id, "title": format!("Article {}", id), "tags": [parity] })
            })
            .collect();
        Self { articles }
    }

    fn page(&self, page: u64, params: &Value) -> Result<ListResponse, FetchError> {
        if page == 0 {
            return Err(FetchError::new(400, "pages start at 1"));
        }
        let tag = params.get("tag").and_then(Value::as_str);
        let matching: Vec<&Value> = self
            .articles
            .iter()
            .filter(|article| match tag {
                Some(tag) => article["tags"].as_array().is_some_and(|tags| tags.iter().any(|t| t == tag)),
                None => true,
            })
            .collect();

        let start = (page as usize - 1) * PAGE_SIZE;
        let end = (start + PAGE_SIZE).min(matching.len());
        let data: Vec<Value> = matching
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|article| (*article).clone())
            .collect();

        Ok(ListResponse {
            data: Value::Array(data),
            meta: json!({ "page": page, "has_more": end < matching.len(), "total": matching.len() }),
            extras: Some(json!({ "tag": tag })),
        })
    }

    fn article(&self, id: &EntityId) -> Result<DetailResponse, FetchError> {
        self.articles
            .iter()
            .find(|article| EntityId::from_value(&article["id"]).as_ref() == Some(id))
            .map(|article| DetailResponse {
                data: article.clone(),
                extras: Some(json!({ "related": [] })),
            })
            .ok_or_else(|| FetchError::new(404, format!("article {} not found", id)))
    }

    fn stats(&self) -> NormalResponse {
        NormalResponse {
            data: json!({ "articles": self.articles.len(), "page_size": PAGE_SIZE }),
        }
    }
}

/// Run the chosen page to completion and return the final state tree.
pub async fn run(config: Config, page: DemoPage) -> Result<Value> {
    let catalog = Arc::new(Catalog::new());
    let cache = config.entity_cache()?;
    let message = config.pages.failure_message.clone();
    let store = Store::builder()
        .config(config)
        .entities(cache.clone())
        .build()?;
    store.run()?;

    match page {
        DemoPage::List => {
            let fetcher = {
                let catalog = Arc::clone(&catalog);
                move |page: u64, params: Value, _meta: Value| {
                    let catalog = Arc::clone(&catalog);
                    async move { catalog.page(page, &params) }
                }
            };
            let list = ListPage::new(
                Namespace::parse("pages/articles")?,
                ListPageConfig::new(fetcher, EntitySchema::new("articles"), cache)
                    .failure_message(message),
            );
            store.register(&list)?;

            store.dispatch(list.initiate(json!({ "tag": "even" }), Value::Null));
            wait_until(&store, |root| list.is_initiated(root)).await?;
            store.dispatch(list.load_more());
            wait_until(&store, |root| list.page(root) == 2 && !list.load_more_status(root).loading).await?;
            tracing::info!(records = list.data(&store.state()).len(), "List demo loaded");
        }
        DemoPage::Detail => {
            let fetcher = {
                let catalog = Arc::clone(&catalog);
                move |id: EntityId, _meta: Value| {
                    let catalog = Arc::clone(&catalog);
                    async move { catalog.article(&id) }
                }
            };
            let detail = DetailPage::new(
                Namespace::parse("pages/article")?,
                DetailPageConfig::new(fetcher, EntitySchema::new("articles"), cache)
                    .failure_message(message),
            );
            store.register(&detail)?;

            store.dispatch(detail.initiate(2_i64, Value::Null));
            wait_until(&store, |root| detail.is_initiated(root)).await?;
            store.dispatch(detail.initiate(42_i64, Value::Null));
            wait_until(&store, |root| detail.initiate_status(root).has_error()).await?;
        }
        DemoPage::Normal => {
            let fetcher = {
                let catalog = Arc::clone(&catalog);
                move |_params: Value, _meta: Value| {
                    let catalog = Arc::clone(&catalog);
                    async move { Ok::<_, FetchError>(catalog.stats()) }
                }
            };
            let stats = NormalPage::new(
                Namespace::parse("pages/stats")?,
                NormalPageConfig::new(fetcher).failure_message(message),
            );
            store.register(&stats)?;

            store.dispatch(stats.initiate_if_need(Value::Null, Value::Null));
            wait_until(&store, |root| !stats.is_invalidate(root)).await?;
        }
    }

    let state = store.state();
    store.shutdown();
    Ok(state)
}

async fn wait_until(store: &Store, done: impl Fn(&Value) -> bool) -> Result<()> {
    let mut revisions = store.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if store.select(|root| done(root)) {
                return Ok(());
            }
            if revisions.changed().await.is_err() {
                anyhow::bail!("store closed");
            }
        }
    })
    .await
    .context("timed out waiting for the page")?
}
