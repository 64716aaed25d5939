//! Binary file storage collaborator.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("blob store error: {0}")]
pub struct BlobError(pub String);

/// Stores uploaded files and hands back an opaque handle.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn store(&self, bytes: &[u8], suggested_ext: &str) -> Result<String, BlobError>;

    /// Deletes a stored file. Removing an unknown handle is not an error.
    async fn remove(&self, handle: &str) -> Result<(), BlobError>;
}

#[derive(Debug, Default)]
struct InMemoryBlobState {
    blobs: HashMap<String, Vec<u8>>,
    next_id: u32,
    fail: bool,
}

/// In-memory blob store for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBlobStore {
    state: Arc<RwLock<InMemoryBlobState>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).fail = fail;
    }

    pub fn blob_count(&self) -> usize {
        self.state.read().unwrap_or_else(|e| e.into_inner()).blobs.len()
    }

    pub fn get(&self, handle: &str) -> Option<Vec<u8>> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .blobs
            .get(handle)
            .cloned()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn store(&self, bytes: &[u8], suggested_ext: &str) -> Result<String, BlobError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.fail {
            return Err(BlobError("storage backend unavailable".into()));
        }
        state.next_id += 1;
        let handle = format!("uploads/{:06}.{suggested_ext}", state.next_id);
        state.blobs.insert(handle.clone(), bytes.to_vec());
        Ok(handle)
    }

    async fn remove(&self, handle: &str) -> Result<(), BlobError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.fail {
            return Err(BlobError("storage backend unavailable".into()));
        }
        state.blobs.remove(handle);
        Ok(())
    }
}
