//! Storage backend abstraction.
//!
//! A backend is a flat namespace of absolute node paths (`/`, `/dates`,
//! `/dates/20200101/A1/red`). Groups carry JSON attributes, arrays carry
//! numbers. The archive layer decides the hierarchy; backends only store it.

use ndarray::Array2;
use serde_json::{Map, Value};

use crate::error::StoreResult;

/// JSON attributes attached to a group.
pub type Attributes = Map<String, Value>;

/// One interface over the in-memory and persisted stores.
pub trait StoreBackend {
    /// Short name used in log messages.
    fn name(&self) -> &'static str;

    /// Whether a group or array exists at `path`.
    fn node_exists(&self, path: &str) -> bool;

    /// Create an empty group; fails with `DuplicateGroup` when `path` exists.
    fn create_group(&mut self, path: &str) -> StoreResult<()>;

    /// Replace the attributes of an existing group.
    fn write_group_attributes(&mut self, path: &str, attributes: Attributes) -> StoreResult<()>;

    /// Attributes of the group at `path`.
    fn group_attributes(&self, path: &str) -> StoreResult<Attributes>;

    /// Create or overwrite a 2-D float32 array.
    fn write_f32_array(&mut self, path: &str, array: &Array2<f32>) -> StoreResult<()>;

    fn read_f32_array(&self, path: &str) -> StoreResult<Array2<f32>>;

    /// Create or overwrite a 1-D float64 array.
    fn write_f64_array(&mut self, path: &str, values: &[f64]) -> StoreResult<()>;

    fn read_f64_array(&self, path: &str) -> StoreResult<Vec<f64>>;

    /// Create or overwrite a 1-D int64 array.
    fn write_i64_array(&mut self, path: &str, values: &[i64]) -> StoreResult<()>;

    fn read_i64_array(&self, path: &str) -> StoreResult<Vec<i64>>;

    /// Create or overwrite a 1-D uint8 array.
    fn write_u8_array(&mut self, path: &str, values: &[u8]) -> StoreResult<()>;

    fn read_u8_array(&self, path: &str) -> StoreResult<Vec<u8>>;
}

/// Join a parent path and a child name.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}
