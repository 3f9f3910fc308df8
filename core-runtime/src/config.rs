//! # Core Configuration Module
//!
//! Provides configuration management for the asset synchronization core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct an
//! `AssetSyncConfig` holding the account identifiers, tuning knobs and the
//! injected HTTP bridge. Validation is fail-fast: identifiers left at their
//! placeholder defaults are rejected before any network traffic happens.
//!
//! ## Required Values
//!
//! - Drive OAuth client id
//! - Transform account (cloud) name
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpClient` - HTTP operations (desktop default: reqwest)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::AssetSyncConfig;
//!
//! let config = AssetSyncConfig::builder()
//!     .drive_client_id("1234.apps.googleusercontent.com")
//!     .cloud_name("demo")
//!     .page_size(50)
//!     .build()?;
//! ```
//!
//! Reading identifiers from the environment:
//!
//! ```ignore
//! let config = AssetSyncConfig::from_env().build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::HttpClient;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable holding the Drive OAuth client id
pub const ENV_DRIVE_CLIENT_ID: &str = "GOOGLE_CLIENT_ID";
/// Environment variable holding the Transform account name
pub const ENV_CLOUD_NAME: &str = "CLOUDINARY_CLOUD_NAME";

/// Value used when the client id was never configured
pub const PLACEHOLDER_CLIENT_ID: &str = "placeholder_client_id";
/// Value used when the account name was never configured
pub const PLACEHOLDER_CLOUD_NAME: &str = "your_cloud_name";

pub const DEFAULT_PAGE_SIZE: u32 = 30;
pub const MAX_PAGE_SIZE: u32 = 1000;
pub const DEFAULT_BATCH_WIDTH: usize = 3;
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_millis(200);
pub const DEFAULT_TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);
pub const DEFAULT_EVENT_BUFFER: usize = 100;

/// Core configuration for the asset synchronization layer.
///
/// Use [`AssetSyncConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct AssetSyncConfig {
    /// OAuth client id registered for the Drive API
    pub drive_client_id: String,

    /// Account segment of delivery URLs
    pub cloud_name: String,

    /// Items requested per listing page
    pub page_size: u32,

    /// Number of fetches resolved concurrently per group
    pub batch_width: usize,

    /// Pause inserted between resolver groups
    pub batch_pause: Duration,

    /// Refresh credentials this long before they expire
    pub token_refresh_margin: Duration,

    /// Capacity of the event broadcast channel
    pub event_buffer_size: usize,

    /// HTTP client for API requests
    pub http_client: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for AssetSyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetSyncConfig")
            .field("drive_client_id", &self.drive_client_id)
            .field("cloud_name", &self.cloud_name)
            .field("page_size", &self.page_size)
            .field("batch_width", &self.batch_width)
            .field("batch_pause", &self.batch_pause)
            .field("token_refresh_margin", &self.token_refresh_margin)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("http_client", &"HttpClient { ... }")
            .finish()
    }
}

impl AssetSyncConfig {
    /// Creates a new builder for constructing an `AssetSyncConfig`.
    pub fn builder() -> AssetSyncConfigBuilder {
        AssetSyncConfigBuilder::default()
    }

    /// Builder pre-populated from `GOOGLE_CLIENT_ID` and `CLOUDINARY_CLOUD_NAME`.
    ///
    /// Missing variables fall back to the placeholder identifiers, which
    /// `validate` then rejects with an actionable message.
    pub fn from_env() -> AssetSyncConfigBuilder {
        Self::builder()
            .drive_client_id(
                std::env::var(ENV_DRIVE_CLIENT_ID)
                    .unwrap_or_else(|_| PLACEHOLDER_CLIENT_ID.to_string()),
            )
            .cloud_name(
                std::env::var(ENV_CLOUD_NAME).unwrap_or_else(|_| PLACEHOLDER_CLOUD_NAME.to_string()),
            )
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Identifiers are set and not left at placeholder values
    /// - Page size is within 1..=1000
    /// - Batch width and event buffer are non-zero
    pub fn validate(&self) -> Result<()> {
        validate_identifier(
            &self.drive_client_id,
            PLACEHOLDER_CLIENT_ID,
            "Drive client id",
            ENV_DRIVE_CLIENT_ID,
        )?;
        validate_identifier(
            &self.cloud_name,
            PLACEHOLDER_CLOUD_NAME,
            "Cloud name",
            ENV_CLOUD_NAME,
        )?;

        if self.page_size == 0 {
            return Err(Error::Config("Page size must be greater than 0".to_string()));
        }

        if self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "Page size exceeds maximum of {}",
                MAX_PAGE_SIZE
            )));
        }

        if self.batch_width == 0 {
            return Err(Error::Config(
                "Batch width must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn validate_identifier(value: &str, placeholder: &str, label: &str, env_var: &str) -> Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == placeholder {
        return Err(Error::Config(format!(
            "{} is not configured. Set {} or pass it to the builder.",
            label, env_var
        )));
    }
    Ok(())
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for Drive API access. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Web: inject a fetch-based client."
            .to_string(),
    })
}

/// Builder for [`AssetSyncConfig`]
#[derive(Default)]
pub struct AssetSyncConfigBuilder {
    drive_client_id: Option<String>,
    cloud_name: Option<String>,
    page_size: Option<u32>,
    batch_width: Option<usize>,
    batch_pause: Option<Duration>,
    token_refresh_margin: Option<Duration>,
    event_buffer_size: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
}

impl AssetSyncConfigBuilder {
    pub fn drive_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.drive_client_id = Some(client_id.into());
        self
    }

    pub fn cloud_name(mut self, cloud_name: impl Into<String>) -> Self {
        self.cloud_name = Some(cloud_name.into());
        self
    }

    /// Items requested per listing page (default: 30)
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Concurrent fetches per resolver group (default: 3)
    pub fn batch_width(mut self, width: usize) -> Self {
        self.batch_width = Some(width);
        self
    }

    /// Pause between resolver groups (default: 200ms)
    pub fn batch_pause(mut self, pause: Duration) -> Self {
        self.batch_pause = Some(pause);
        self
    }

    /// Proactive refresh margin (default: 5 minutes)
    pub fn token_refresh_margin(mut self, margin: Duration) -> Self {
        self.token_refresh_margin = Some(margin);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Sets a custom HTTP client implementation.
    ///
    /// If not provided, a desktop default is used when the `desktop-shims`
    /// feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the final `AssetSyncConfig` instance.
    ///
    /// Returns an error if identifiers are missing, a value is out of range,
    /// or no `HttpClient` is available.
    pub fn build(self) -> Result<AssetSyncConfig> {
        let drive_client_id = self.drive_client_id.ok_or_else(|| {
            Error::Config(
                "Drive client id is required. Use .drive_client_id() to set it.".to_string(),
            )
        })?;

        let cloud_name = self.cloud_name.ok_or_else(|| {
            Error::Config("Cloud name is required. Use .cloud_name() to set it.".to_string())
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let config = AssetSyncConfig {
            drive_client_id,
            cloud_name,
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            batch_width: self.batch_width.unwrap_or(DEFAULT_BATCH_WIDTH),
            batch_pause: self.batch_pause.unwrap_or(DEFAULT_BATCH_PAUSE),
            token_refresh_margin: self
                .token_refresh_margin
                .unwrap_or(DEFAULT_TOKEN_REFRESH_MARGIN),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER),
            http_client,
        };

        config.validate()?;

        Ok(config)
    }
}
