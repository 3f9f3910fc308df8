//! Local Binary Handles
//!
//! Resolved remote binaries are handed to the renderer as opaque local
//! references (object URLs in the browser, in-memory keys on desktop). The
//! backing memory lives until the reference is explicitly revoked.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Opaque reference to a locally held binary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobUrl(String);

impl BlobUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Object URL registry
///
/// - **Web**: `URL.createObjectURL` / `URL.revokeObjectURL`
/// - **Desktop**: in-memory map keyed by generated `blob:` URLs
///
/// Creation and revocation are synchronous; neither suspends.
pub trait BlobStore: Send + Sync {
    /// Register a binary and return a reference to it
    fn create(&self, data: Bytes, mime_type: &str) -> Result<BlobUrl>;

    /// Release the backing memory of a reference
    ///
    /// Revoking an unknown or already revoked reference is a no-op.
    fn revoke(&self, url: &BlobUrl);

    /// Read a live binary back, `None` once revoked
    fn get(&self, url: &BlobUrl) -> Option<Bytes>;
}
