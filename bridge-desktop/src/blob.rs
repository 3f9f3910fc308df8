//! In-memory object URL registry

use bridge_traits::{
    blob::{BlobStore, BlobUrl},
    error::{BridgeError, Result},
};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::trace;
use uuid::Uuid;

/// Desktop stand-in for the browser's object URL table.
///
/// Each `create` registers the payload under a fresh `blob:` URL; `revoke`
/// drops it.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Bytes>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of references not yet revoked
    pub fn live_count(&self) -> usize {
        self.blobs.lock().map(|blobs| blobs.len()).unwrap_or(0)
    }
}

impl BlobStore for MemoryBlobStore {
    fn create(&self, data: Bytes, mime_type: &str) -> Result<BlobUrl> {
        let url = format!("blob:imgsync/{}", Uuid::new_v4());
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| BridgeError::OperationFailed("Blob registry poisoned".to_string()))?;
        trace!(mime_type, size = data.len(), "Registering blob");
        blobs.insert(url.clone(), data);
        Ok(BlobUrl::new(url))
    }

    fn revoke(&self, url: &BlobUrl) {
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.remove(url.as_str());
        }
    }

    fn get(&self, url: &BlobUrl) -> Option<Bytes> {
        self.blobs
            .lock()
            .ok()
            .and_then(|blobs| blobs.get(url.as_str()).cloned())
    }
}
