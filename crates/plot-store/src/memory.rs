//! In-memory backend.

use std::collections::BTreeMap;

use ndarray::Array2;

use crate::backend::{Attributes, StoreBackend};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Group(Attributes),
    Float32(Array2<f32>),
    Float64(Vec<f64>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
}

/// A store held entirely in memory, keyed by node path.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    nodes: BTreeMap<String, Node>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes (groups and arrays).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn write_array(&mut self, path: &str, node: Node) -> StoreResult<()> {
        if let Some(Node::Group(_)) = self.nodes.get(path) {
            return Err(StoreError::format(path, "a group exists at this path"));
        }
        self.nodes.insert(path.to_string(), node);
        Ok(())
    }

    fn node(&self, path: &str) -> StoreResult<&Node> {
        self.nodes
            .get(path)
            .ok_or_else(|| StoreError::MissingKey(path.to_string()))
    }
}

impl StoreBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn node_exists(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    fn create_group(&mut self, path: &str) -> StoreResult<()> {
        if self.node_exists(path) {
            return Err(StoreError::DuplicateGroup(path.to_string()));
        }
        self.nodes
            .insert(path.to_string(), Node::Group(Attributes::new()));
        Ok(())
    }

    fn write_group_attributes(&mut self, path: &str, attributes: Attributes) -> StoreResult<()> {
        match self.nodes.get_mut(path) {
            Some(Node::Group(attrs)) => {
                *attrs = attributes;
                Ok(())
            }
            Some(_) => Err(StoreError::format(path, "not a group")),
            None => Err(StoreError::MissingKey(path.to_string())),
        }
    }

    fn group_attributes(&self, path: &str) -> StoreResult<Attributes> {
        match self.node(path)? {
            Node::Group(attrs) => Ok(attrs.clone()),
            _ => Err(StoreError::format(path, "not a group")),
        }
    }

    fn write_f32_array(&mut self, path: &str, array: &Array2<f32>) -> StoreResult<()> {
        self.write_array(path, Node::Float32(array.clone()))
    }

    fn read_f32_array(&self, path: &str) -> StoreResult<Array2<f32>> {
        match self.node(path)? {
            Node::Float32(array) => Ok(array.clone()),
            _ => Err(StoreError::format(path, "not a float32 array")),
        }
    }

    fn write_f64_array(&mut self, path: &str, values: &[f64]) -> StoreResult<()> {
        self.write_array(path, Node::Float64(values.to_vec()))
    }

    fn read_f64_array(&self, path: &str) -> StoreResult<Vec<f64>> {
        match self.node(path)? {
            Node::Float64(values) => Ok(values.clone()),
            _ => Err(StoreError::format(path, "not a float64 array")),
        }
    }

    fn write_i64_array(&mut self, path: &str, values: &[i64]) -> StoreResult<()> {
        self.write_array(path, Node::Int64(values.to_vec()))
    }

    fn read_i64_array(&self, path: &str) -> StoreResult<Vec<i64>> {
        match self.node(path)? {
            Node::Int64(values) => Ok(values.clone()),
            _ => Err(StoreError::format(path, "not an int64 array")),
        }
    }

    fn write_u8_array(&mut self, path: &str, values: &[u8]) -> StoreResult<()> {
        self.write_array(path, Node::UInt8(values.to_vec()))
    }

    fn read_u8_array(&self, path: &str) -> StoreResult<Vec<u8>> {
        match self.node(path)? {
            Node::UInt8(values) => Ok(values.clone()),
            _ => Err(StoreError::format(path, "not a uint8 array")),
        }
    }
}
