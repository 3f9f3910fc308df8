//! # Google Drive Provider
//!
//! Implements `StorageProvider` trait for Google Drive API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - Image listing ordered newest first, with folder and name filters
//! - Binary downloads and thumbnail fetches
//! - Multipart uploads (create and replace) and deletes
//!
//! Authentication is delegated to `core_auth::AuthenticatedExecutor`.

pub mod connector;
pub mod error;
pub mod query;
pub mod types;

pub use connector::GoogleDriveConnector;
pub use error::{GoogleDriveError, Result};
