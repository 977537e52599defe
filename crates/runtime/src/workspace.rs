//! Named blob storage shared by the operators of a net.
//!
//! Operators running on different DAG workers read and write the same
//! workspace, so blobs sit behind a read-write lock. Each access clones the
//! tensor in or out; nothing borrows across an operator boundary.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::NetError;
use crate::tensor::Tensor;

/// Thread-safe map from blob name to tensor.
#[derive(Debug, Default)]
pub struct Workspace {
    blobs: RwLock<HashMap<String, Tensor>>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a blob named `name` exists, leaving an existing one untouched.
    pub fn create_blob(&self, name: impl Into<String>) {
        self.blobs.write().entry(name.into()).or_default();
    }

    /// Store `tensor` under `name`, replacing any previous value.
    pub fn feed(&self, name: impl Into<String>, tensor: Tensor) {
        self.blobs.write().insert(name.into(), tensor);
    }

    /// Copy out the blob named `name`.
    pub fn fetch(&self, name: &str) -> Result<Tensor, NetError> {
        self.blobs
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| NetError::MissingBlob(name.to_string()))
    }

    pub fn has_blob(&self, name: &str) -> bool {
        self.blobs.read().contains_key(name)
    }

    /// All blob names, sorted.
    pub fn blob_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.blobs.read().keys().cloned().collect();
        names.sort();
        names
    }
}
