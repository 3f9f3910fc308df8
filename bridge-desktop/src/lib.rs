//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `BlobStore` as an in-memory object URL table
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{MemoryBlobStore, ReqwestHttpClient};
//! use std::sync::Arc;
//!
//! let http_client = Arc::new(ReqwestHttpClient::new());
//! let blobs = Arc::new(MemoryBlobStore::new());
//! ```

mod blob;
mod http;

pub use blob::MemoryBlobStore;
pub use http::ReqwestHttpClient;
