//! Load status records and failure normalization.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::runtime::EffectError;

/// Generic message for failures that carry none.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Failed to load";

/// Error code recorded when a failure carries none.
pub const UNKNOWN_ERROR_CODE: i64 = -1;

/// Error returned by a fetch collaborator. Both fields are optional; missing
/// ones are filled in when the failure is recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("Fetch failed: {}", .message.as_deref().unwrap_or("no message"))]
pub struct FetchError {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl FetchError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: Some(message.into()),
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: Some(message.into()),
        }
    }
}

/// `{ error, message, loading }` for one page operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadStatus {
    pub error: Option<i64>,
    pub message: Option<String>,
    pub loading: bool,
}

impl LoadStatus {
    pub fn loading() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    pub fn failed(failure: Failure) -> Self {
        Self {
            error: Some(failure.error),
            message: Some(failure.message),
            loading: false,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Failure payload as recorded in state: code and message always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub error: i64,
    pub message: String,
}

impl Failure {
    /// Code `0` and empty messages count as absent.
    pub fn normalize(error: &FetchError, fallback: &str) -> Self {
        Self {
            error: error.code.filter(|code| *code != 0).unwrap_or(UNKNOWN_ERROR_CODE),
            message: error
                .message
                .clone()
                .filter(|message| !message.is_empty())
                .unwrap_or_else(|| fallback.to_string()),
        }
    }

    /// Failure for an effect error. Only fetch errors carry their own code
    /// and message.
    pub fn from_effect(error: &EffectError, fallback: &str) -> Self {
        match error {
            EffectError::Fetch(fetch) => Self::normalize(fetch, fallback),
            _ => Self::normalize(&FetchError::default(), fallback),
        }
    }

    pub fn to_payload(&self) -> Value {
        serde_json::json!({ "code": self.error, "message": self.message })
    }
}

/// Status after a failure action: `null` clears loading without an error,
/// anything else is normalized.
pub(crate) fn status_after_failure(payload: &Value, fallback: &str) -> LoadStatus {
    if payload.is_null() {
        return LoadStatus::default();
    }
    let error: FetchError = serde_json::from_value(payload.clone()).unwrap_or_default();
    LoadStatus::failed(Failure::normalize(&error, fallback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_fills_missing_fields() {
        let failure = Failure::normalize(&FetchError::default(), "generic");
        assert_eq!(failure, Failure { error: -1, message: "generic".into() });
    }

    #[test]
    fn normalize_treats_zero_and_empty_as_absent() {
        let failure = Failure::normalize(
            &FetchError { code: Some(0), message: Some(String::new()) },
            "generic",
        );
        assert_eq!(failure.error, -1);
        assert_eq!(failure.message, "generic");
    }

    #[test]
    fn normalize_keeps_given_fields() {
        let failure = Failure::normalize(&FetchError::new(404, "missing"), "generic");
        assert_eq!(failure, Failure { error: 404, message: "missing".into() });
    }

    #[test]
    fn null_failure_clears_loading() {
        assert_eq!(status_after_failure(&Value::Null, "x"), LoadStatus::default());
    }

    #[test]
    fn failure_payload_round_trips_through_status() {
        let payload = Failure::normalize(&FetchError::new(500, "boom"), "x").to_payload();
        let status = status_after_failure(&payload, "x");
        assert_eq!(status.error, Some(500));
        assert_eq!(status.message.as_deref(), Some("boom"));
        assert!(!status.loading);
    }

    #[test]
    fn non_fetch_errors_use_fallback() {
        let err = EffectError::Other("schema mismatch".into());
        let failure = Failure::from_effect(&err, "generic");
        assert_eq!(failure, Failure { error: -1, message: "generic".into() });
        assert_eq!(
            serde_json::to_value(LoadStatus::failed(failure)).unwrap(),
            json!({"error": -1, "message": "generic", "loading": false})
        );
    }
}
