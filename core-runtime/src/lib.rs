//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the asset synchronization core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on.
//! It establishes the logging conventions, configuration validation and
//! event broadcasting used throughout the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{AssetSyncConfig, AssetSyncConfigBuilder};
pub use error::{Error, Result};
pub use events::{AssetEvent, AuthEvent, CoreEvent, EventBus, EventStream};
