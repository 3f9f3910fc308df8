//! Resolved asset handles

use bridge_traits::blob::BlobUrl;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the presentation layer renders for an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResolvedHandle {
    /// Binary fetched and registered locally
    Local(BlobUrl),
    /// Binary could not be fetched; the provider's preview URL is used as is
    Remote(String),
    /// Nothing displayable
    Placeholder(Placeholder),
}

impl ResolvedHandle {
    /// URL to render, if any
    pub fn url(&self) -> Option<&str> {
        match self {
            ResolvedHandle::Local(url) => Some(url.as_str()),
            ResolvedHandle::Remote(url) => Some(url),
            ResolvedHandle::Placeholder(_) => None,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, ResolvedHandle::Local(_))
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ResolvedHandle::Placeholder(_))
    }

    pub(crate) fn local_url(&self) -> Option<&BlobUrl> {
        match self {
            ResolvedHandle::Local(url) => Some(url),
            _ => None,
        }
    }
}

/// Reason an item has no displayable binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placeholder {
    /// The item type has no preview (not an image)
    NoPreview,
    /// Every fetch attempt failed and no preview reference exists
    FetchError,
}

impl Placeholder {
    pub fn label(&self) -> &'static str {
        match self {
            Placeholder::NoPreview => "No preview",
            Placeholder::FetchError => "Preview unavailable",
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
