//! Configuration: TOML file with `[runtime]`, `[pages]` and `[logging]`
//! sections, every field optional.

mod loader;
mod types;

pub use loader::ConfigError;
pub use types::{Config, LoggingConfig, PagesConfig, RuntimeConfig};
