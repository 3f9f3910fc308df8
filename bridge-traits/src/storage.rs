//! Remote Storage Abstractions
//!
//! Provider-agnostic view of a cloud file collection: listing records,
//! cursor-based pagination, binary fetches and write operations.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// A file listed from a remote provider.
///
/// Identity is `id`; every other field is a snapshot taken by the listing
/// call that produced the record. Records are never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    /// Size in bytes, absent for provider-native documents
    pub size_bytes: Option<u64>,
    /// Provider-issued preview (thumbnail) reference
    pub preview_url: Option<String>,
    /// Last modification as a Unix timestamp
    pub modified_at: Option<i64>,
    pub parent_ids: Vec<String>,
}

impl DriveItem {
    /// Whether the item can be rendered as an image at all
    pub fn is_previewable(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Opaque continuation token returned by a listing call.
///
/// Never parsed, only threaded back into the next call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageCursor(String);

impl PageCursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Listing predicate.
///
/// Rendered into the provider's query language by each connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    /// Only list items whose MIME type starts with this prefix
    pub mime_prefix: Option<String>,
    /// Restrict to direct children of this folder
    pub parent_id: Option<String>,
    /// Case-insensitive name search term
    pub name_contains: Option<String>,
    /// Include trashed items
    pub include_trashed: bool,
}

impl ListQuery {
    /// Images anywhere in the drive, excluding trash
    pub fn images() -> Self {
        Self {
            mime_prefix: Some("image/".to_string()),
            parent_id: None,
            name_contains: None,
            include_trashed: false,
        }
    }

    pub fn in_folder(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.name_contains = Some(term.into());
        self
    }
}

impl Default for ListQuery {
    fn default() -> Self {
        Self::images()
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListPage {
    pub items: Vec<DriveItem>,
    pub next_cursor: Option<PageCursor>,
    /// `true` iff `next_cursor` is present
    pub has_more: bool,
}

impl ListPage {
    pub fn new(items: Vec<DriveItem>, next_cursor: Option<PageCursor>) -> Self {
        let has_more = next_cursor.is_some();
        Self {
            items,
            next_cursor,
            has_more,
        }
    }
}

/// A fetched binary body.
#[derive(Debug, Clone)]
pub struct BinaryPayload {
    pub data: Bytes,
    /// `Content-Type` reported by the provider, if any
    pub content_type: Option<String>,
}

/// Create-or-replace request for a single file.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub name: String,
    pub mime_type: String,
    pub parent_id: Option<String>,
    pub data: Bytes,
    /// When set, the existing file is overwritten instead of creating a new one
    pub replace_id: Option<String>,
}

impl UploadRequest {
    pub fn create(name: impl Into<String>, mime_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            parent_id: None,
            data,
            replace_id: None,
        }
    }

    pub fn in_folder(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn replacing(mut self, item_id: impl Into<String>) -> Self {
        self.replace_id = Some(item_id.into());
        self
    }
}

/// Cloud storage provider trait
///
/// Implemented per provider (Google Drive). All calls are authenticated by
/// the implementation; an unrecoverable credential rejection surfaces as
/// [`BridgeError::AuthExpired`](crate::error::BridgeError::AuthExpired).
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::{ListQuery, StorageProvider};
///
/// async fn first_page(provider: &dyn StorageProvider) -> Result<usize> {
///     let page = provider.list_page(&ListQuery::images(), 30, None).await?;
///     Ok(page.items.len())
/// }
/// ```
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// List one page, most recently modified first
    async fn list_page(
        &self,
        query: &ListQuery,
        page_size: u32,
        cursor: Option<PageCursor>,
    ) -> Result<ListPage>;

    /// Fetch the full binary content of an item
    async fn download(&self, item_id: &str) -> Result<BinaryPayload>;

    /// Fetch a provider-issued preview reference
    async fn fetch_preview(&self, preview_url: &str) -> Result<BinaryPayload>;

    /// Create a new file, or overwrite one when `replace_id` is set
    async fn upload(&self, request: UploadRequest) -> Result<DriveItem>;

    /// Delete an item
    async fn delete(&self, item_id: &str) -> Result<()>;
}
