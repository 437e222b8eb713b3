//! Base trait for typed slice state.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Marker trait for typed slice states.
///
/// Slices live in the store as JSON values; typed transitions and selectors
/// convert through serde. States should be:
/// - Cloneable (transitions return new states)
/// - Defaulted field by field (`#[serde(default)]`), so partial slices load
pub trait SliceState: Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static {}
