//! Single-flight guards over a page slice.
//!
//! Guards run inside `dispatch_if`, so the check and the request dispatch
//! cannot interleave with another task.

use serde_json::Value;

use crate::model::Action;
use crate::runtime::EffectContext;

/// True if `slice[status].loading` is set.
pub(crate) fn loading(slice: &Value, status: &str) -> bool {
    flag(slice, &[status, "loading"])
}

/// Boolean at `path`, false when absent.
pub(crate) fn flag(slice: &Value, path: &[&str]) -> bool {
    path.iter()
        .try_fold(slice, |node, key| node.get(*key))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Guard admitting a request only while `status` is idle.
pub(crate) fn idle(status: &'static str) -> impl FnOnce(&Value) -> bool {
    move |slice| !loading(slice, status)
}

/// Own-slice field, `null` when absent.
pub(crate) fn field(ctx: &EffectContext, key: &str) -> Value {
    ctx.select(|root| {
        ctx.model()
            .state(root)
            .and_then(|slice| slice.get(key))
            .cloned()
            .unwrap_or(Value::Null)
    })
}

/// Cancellation cleanup: dispatch `failure(null)` if `status` is still
/// loading, which clears the flag without recording an error.
pub(crate) fn settle_on_cancel(
    status: &'static str,
    failure: &'static str,
) -> impl Fn(&EffectContext, &Action) + Send + Sync + 'static {
    move |ctx: &EffectContext, _action: &Action| settle(ctx, status, failure, |_| true)
}

/// Like [`settle_on_cancel`] with an extra condition on the slice.
pub(crate) fn settle(
    ctx: &EffectContext,
    status: &str,
    failure: &str,
    also: impl FnOnce(&Value) -> bool,
) {
    match ctx.action(failure, Value::Null, Value::Null) {
        Ok(action) => {
            ctx.dispatch_if(|slice| loading(slice, status) && also(slice), action);
        }
        Err(err) => {
            tracing::warn!(namespace = %ctx.model().namespace(), error = %err, "Failed to settle cancelled task");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flag_reads_nested_booleans() {
        let slice = json!({"meta": {"has_more": true}, "initiate": {"loading": false}});
        assert!(flag(&slice, &["meta", "has_more"]));
        assert!(!flag(&slice, &["initiate", "loading"]));
        assert!(!flag(&slice, &["missing", "loading"]));
    }

    #[test]
    fn idle_rejects_loading_status() {
        assert!(idle("initiate")(&json!({"initiate": {"loading": false}})));
        assert!(!idle("initiate")(&json!({"initiate": {"loading": true}})));
        assert!(idle("initiate")(&Value::Null));
    }
}
