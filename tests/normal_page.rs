mod common;

use common::{normal_page, settle, wait_for, Gate};
use serde_json::{json, Value};
use slicekit::page::NormalResponse;
use slicekit::{FetchError, LoadStatus, NormalPage, NormalPageConfig, Page, PageConfig, Store};

fn running_store() -> Store {
    let store = Store::builder().build().unwrap();
    store.run().unwrap();
    store
}

#[tokio::test]
async fn test_initiate_stores_payload() {
    let store = running_store();
    let gate = Gate::open();
    let page = normal_page("settings", &gate);
    store.register(&page).unwrap();

    store.dispatch(page.initiate(json!({"section": "profile"}), Value::Null));
    wait_for(&store, |root| !page.is_invalidate(root)).await;

    let root = store.state();
    assert_eq!(page.data(&root), json!({"echo": {"section": "profile"}}));
    assert_eq!(page.params(&root), json!({"section": "profile"}));
    assert_eq!(page.initiate_status(&root), LoadStatus::default());
    // No cache involvement.
    assert_eq!(store.entities().records(&root).map(|table| table.len()), Some(0));
}

#[tokio::test]
async fn test_initiate_is_single_flight() {
    let store = running_store();
    let gate = Gate::closed();
    let page = normal_page("settings", &gate);
    store.register(&page).unwrap();

    store.dispatch(page.initiate(json!(1), Value::Null));
    store.dispatch(page.initiate(json!(2), Value::Null));
    settle().await;
    assert_eq!(gate.calls(), 1);

    gate.release(1);
    wait_for(&store, |root| !page.initiate_status(root).loading).await;
    assert_eq!(store.select(|root| page.data(root)), json!({"echo": 1}));
}

#[tokio::test]
async fn test_refresh_and_initiate_if_need() {
    let store = running_store();
    let gate = Gate::open();
    let page = normal_page("settings", &gate);
    store.register(&page).unwrap();

    store.dispatch(page.initiate_if_need(json!("a"), Value::Null));
    wait_for(&store, |root| !page.is_invalidate(root)).await;
    store.dispatch(page.initiate_if_need(json!("b"), Value::Null));
    settle().await;
    assert_eq!(gate.log(), vec![json!("a")]);

    store.dispatch(page.refresh(Value::Null, Value::Null));
    wait_for(&store, |_| gate.calls() == 2).await;
    assert_eq!(gate.log()[1], json!("a"));

    store.dispatch(page.refresh(json!("c"), Value::Null));
    wait_for(&store, |root| page.data(root) == json!({"echo": "c"})).await;
}

#[tokio::test]
async fn test_failure_is_normalized() {
    let store = running_store();
    let fetcher = |_params: Value, _meta: Value| async {
        Err::<NormalResponse, _>(FetchError::with_message("offline"))
    };
    let page = NormalPage::new(common::ns("settings"), NormalPageConfig::new(fetcher));
    store.register(&page).unwrap();

    store.dispatch(page.initiate(Value::Null, Value::Null));
    wait_for(&store, |root| page.initiate_status(root).has_error()).await;

    let status = store.select(|root| page.initiate_status(root));
    assert_eq!(status.error, Some(-1));
    assert_eq!(status.message.as_deref(), Some("offline"));
    assert_eq!(store.select(|root| page.data(root)), Value::Null);
}

#[tokio::test]
async fn test_unregister_cancels_and_clears() {
    let store = running_store();
    let gate = Gate::closed();
    let page = Page::new(
        common::ns("pages/settings"),
        PageConfig::Normal(NormalPageConfig::new({
            let gate = std::sync::Arc::clone(&gate);
            move |params: Value, _meta: Value| {
                let gate = std::sync::Arc::clone(&gate);
                async move {
                    gate.pass(params.clone()).await;
                    Ok::<_, FetchError>(NormalResponse { data: params })
                }
            }
        })),
    );
    store.register(&page).unwrap();
    let Page::Normal(normal) = &page else {
        panic!("built a normal page");
    };

    store.dispatch(normal.initiate(json!(1), Value::Null));
    settle().await;
    assert!(store.select(|root| normal.initiate_status(root).loading));

    let model = store.unregister(page.namespace()).unwrap();
    settle().await;

    assert!(model.is_destroyed());
    assert!(store.slice(page.namespace()).is_none());
    gate.release(1);
    settle().await;
    assert!(store.slice(page.namespace()).is_none());
}

#[tokio::test]
async fn test_invalidate_via_page_enum() {
    let store = running_store();
    let gate = Gate::open();
    let normal = normal_page("settings", &gate);
    let page = Page::Normal(normal.clone());
    store.register(&page).unwrap();

    store.dispatch(normal.initiate(Value::Null, Value::Null));
    wait_for(&store, |root| !normal.is_invalidate(root)).await;

    store.dispatch(page.invalidate());
    assert!(store.select(|root| normal.is_invalidate(root)));
}
