use serde::{Deserialize, Serialize};

use crate::entities::DEFAULT_NAMESPACE;
use crate::page::DEFAULT_FAILURE_MESSAGE;

/// Root configuration container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub pages: PagesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store and runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Namespace the default entity cache is mounted at.
    #[serde(default = "default_entities_namespace")]
    pub entities_namespace: String,
}

/// Settings shared by the page machines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagesConfig {
    /// Message recorded for failures that carry none.
    #[serde(default = "default_failure_message")]
    pub failure_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `SLICEKIT_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            entities_namespace: default_entities_namespace(),
        }
    }
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            failure_message: default_failure_message(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_entities_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_failure_message() -> String {
    DEFAULT_FAILURE_MESSAGE.to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}
