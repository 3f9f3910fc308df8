//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, local blob
//! handles, clock) into the asset core and exposes [`AssetService`] to the
//! presentation layer. Desktop hosts typically enable the `desktop-shims`
//! feature (which depends on `bridge-desktop`) to get default bridges.
//!
//! ```ignore
//! let config = AssetSyncConfig::from_env().build()?;
//! let deps = CoreDependencies::desktop(&config);
//! let service = connect_google_drive(&config, deps, session)?;
//!
//! let page = service.fetch_page().await?;
//! service.resolve(&page.items).await;
//! ```

pub mod error;
pub mod listing;
pub mod service;

pub use error::{CoreError, Result};
pub use listing::PageRequest;
pub use service::AssetService;

use std::sync::Arc;

use bridge_traits::{blob::BlobStore, http::HttpClient, time::Clock, time::SystemClock};
use core_auth::{AuthenticatedExecutor, Credential, TokenGuard, TokenRefresher};
use core_runtime::config::AssetSyncConfig;
use core_runtime::events::EventBus;
use provider_google_drive::GoogleDriveConnector;
use tracing::info;

/// Aggregated handle to all bridge dependencies the core requires.
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub blob_store: Arc<dyn BlobStore>,
    pub clock: Arc<dyn Clock>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(http_client: Arc<dyn HttpClient>, blob_store: Arc<dyn BlobStore>) -> Self {
        Self {
            http_client,
            blob_store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Desktop bundle: the configured HTTP client and in-memory blob handles
    #[cfg(feature = "desktop-shims")]
    pub fn desktop(config: &AssetSyncConfig) -> Self {
        Self::new(
            config.http_client.clone(),
            Arc::new(bridge_desktop::MemoryBlobStore::new()),
        )
    }
}

/// Credential material handed over by the host's sign-in flow
pub struct DriveSession {
    pub credential: Credential,
    pub refresher: Option<Arc<dyn TokenRefresher>>,
}

impl DriveSession {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            refresher: None,
        }
    }

    pub fn with_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }
}

/// Build an [`AssetService`] backed by Google Drive.
///
/// Validates `config`, then wires guard, executor, connector and resolver
/// onto one event bus.
pub fn connect_google_drive(
    config: &AssetSyncConfig,
    deps: CoreDependencies,
    session: DriveSession,
) -> Result<AssetService> {
    config.validate()?;

    let event_bus = EventBus::new(config.event_buffer_size);

    let mut guard = TokenGuard::new(deps.clock)
        .with_credential(session.credential)
        .with_margin(config.token_refresh_margin)
        .with_event_bus(event_bus.clone());
    if let Some(refresher) = session.refresher {
        guard = guard.with_refresher(refresher);
    }
    let guard = Arc::new(guard);

    let executor = Arc::new(AuthenticatedExecutor::new(
        deps.http_client,
        Arc::clone(&guard),
    ));
    let connector = Arc::new(GoogleDriveConnector::new(executor));

    info!(cloud_name = %config.cloud_name, "Asset service connected to Google Drive");

    Ok(
        AssetService::new(config, connector, deps.blob_store, event_bus)
            .with_guard(guard),
    )
}
