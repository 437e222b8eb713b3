//! Shared test utilities: gated fetchers and store waiting helpers.

#![allow(dead_code, unused_imports)]

use parking_lot::Mutex;
use serde_json::{json, Value};
use slicekit::page::{DetailResponse, ListResponse, NormalResponse};
use slicekit::{
    DetailPage, DetailPageConfig, EntityId, EntitySchema, FetchError, ListPage, ListPageConfig,
    Namespace, NormalPage, NormalPageConfig, Store,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;

pub fn ns(path: &str) -> Namespace {
    Namespace::parse(path).expect("valid namespace")
}

/// Let spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..64 {
        tokio::task::yield_now().await;
    }
}

/// Wait until `pred` holds on the root state, failing the test after 2s.
pub async fn wait_for(store: &Store, pred: impl Fn(&Value) -> bool) {
    let mut revisions = store.subscribe();
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        while !store.select(|root| pred(root)) {
            if revisions.changed().await.is_err() {
                break;
            }
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting, state: {}", store.state());
}

/// Fetch gate: counts calls and holds each one until a permit is released.
pub struct Gate {
    calls: AtomicUsize,
    log: Mutex<Vec<Value>>,
    permits: Semaphore,
}

impl Gate {
    /// Every call blocks until [`Gate::release`].
    pub fn closed() -> Arc<Self> {
        Self::with_permits(0)
    }

    /// Calls pass straight through.
    pub fn open() -> Arc<Self> {
        Self::with_permits(Semaphore::MAX_PERMITS)
    }

    pub fn with_permits(permits: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
            permits: Semaphore::new(permits),
        })
    }

    pub fn release(&self, count: usize) {
        self.permits.add_permits(count);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Arguments of every call, in call order.
    pub fn log(&self) -> Vec<Value> {
        self.log.lock().clone()
    }

    pub async fn pass(&self, call: Value) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(call);
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }
}

/// Records `{ "id": n, "title": "Item n" }` for `ids`.
pub fn items(ids: impl IntoIterator<Item = i64>) -> Value {
    ids.into_iter()
        .map(|id| json!({ "id": id, "title": format!("Item {}", id) }))
        .collect()
}

/// Paged catalog of `total` items, `size` per page.
pub fn catalog_page(page: u64, total: i64, size: i64) -> ListResponse {
    let start = (page as i64 - 1) * size + 1;
    let end = (page as i64 * size).min(total);
    ListResponse {
        data: items(start..=end),
        meta: json!({ "page": page, "has_more": end < total }),
        extras: None,
    }
}

/// List page over a gated catalog.
pub fn list_page(store: &Store, path: &str, gate: &Arc<Gate>, total: i64, size: i64) -> ListPage {
    let gate = Arc::clone(gate);
    let fetcher = move |page: u64, params: Value, _meta: Value| {
        let gate = Arc::clone(&gate);
        async move {
            gate.pass(json!({ "page": page, "params": params })).await;
            Ok::<_, FetchError>(catalog_page(page, total, size))
        }
    };
    ListPage::new(
        ns(path),
        ListPageConfig::new(fetcher, EntitySchema::new("items"), store.entities().clone()),
    )
}

/// List page whose fetch always fails with `error`.
pub fn failing_list_page(store: &Store, path: &str, error: FetchError) -> ListPage {
    let fetcher = move |_page: u64, _params: Value, _meta: Value| {
        let error = error.clone();
        async move { Err::<ListResponse, _>(error) }
    };
    ListPage::new(
        ns(path),
        ListPageConfig::new(fetcher, EntitySchema::new("items"), store.entities().clone()),
    )
}

/// Detail page over a gated catalog; ids above 100 are not found.
pub fn detail_page(store: &Store, path: &str, gate: &Arc<Gate>) -> DetailPage {
    let gate = Arc::clone(gate);
    let fetcher = move |id: EntityId, _meta: Value| {
        let gate = Arc::clone(&gate);
        async move {
            gate.pass(id.to_value()).await;
            match id {
                EntityId::Int(n) if n <= 100 => Ok(DetailResponse {
                    data: json!({ "id": n, "title": format!("Item {}", n) }),
                    extras: Some(json!({ "for": n })),
                }),
                other => Err(FetchError::new(404, format!("{} not found", other))),
            }
        }
    };
    DetailPage::new(
        ns(path),
        DetailPageConfig::new(fetcher, EntitySchema::new("items"), store.entities().clone()),
    )
}

/// Normal page echoing its params back as data.
pub fn normal_page(path: &str, gate: &Arc<Gate>) -> NormalPage {
    let gate = Arc::clone(gate);
    let fetcher = move |params: Value, _meta: Value| {
        let gate = Arc::clone(&gate);
        async move {
            gate.pass(params.clone()).await;
            Ok::<_, FetchError>(NormalResponse {
                data: json!({ "echo": params }),
            })
        }
    };
    NormalPage::new(ns(path), NormalPageConfig::new(fetcher))
}

/// Write `content` to a config file in a fresh temp dir.
pub fn temp_config(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, content).expect("Failed to write config");
    (temp_dir, config_path)
}
