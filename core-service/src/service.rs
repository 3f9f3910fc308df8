//! # Asset Service
//!
//! Presentation-facing façade over listing, resolution, caching and URL
//! encoding. One instance per signed-in session.
//!
//! Listing calls are serialized; reads of listed items and cached handles
//! never wait on the network. A failed page keeps everything listed so far
//! and can be reissued with [`AssetService::retry`]. Writes are followed by
//! a destructive refresh: the cache is cleared and the listing restarts
//! from the first page.

use crate::error::{CoreError, Result};
use crate::listing::{ListingState, PageRequest};
use bridge_traits::blob::BlobStore;
use bridge_traits::storage::{DriveItem, ListPage, ListQuery, StorageProvider, UploadRequest};
use bytes::Bytes;
use core_assets::{AssetStore, BatchResolver, ResolveSummary, ResolvedHandle};
use core_auth::TokenGuard;
use core_runtime::config::AssetSyncConfig;
use core_runtime::events::{AssetEvent, CoreEvent, EventBus, EventStream};
use core_transform::{TransformEncoder, TransformationOptions};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub struct AssetService {
    provider: Arc<dyn StorageProvider>,
    store: Arc<AssetStore>,
    resolver: BatchResolver,
    encoder: TransformEncoder,
    guard: Option<Arc<TokenGuard>>,
    event_bus: EventBus,
    page_size: u32,
    listing: RwLock<ListingState>,
    listing_lock: Mutex<()>,
}

impl AssetService {
    /// Build a service listing `provider` with the tuning from `config`.
    ///
    /// `event_bus` should be the bus the session's [`TokenGuard`] reports to,
    /// so subscribers see auth and asset events on one stream.
    pub fn new(
        config: &AssetSyncConfig,
        provider: Arc<dyn StorageProvider>,
        blobs: Arc<dyn BlobStore>,
        event_bus: EventBus,
    ) -> Self {
        let store = Arc::new(AssetStore::new(blobs.clone()));
        let resolver = BatchResolver::new(provider.clone(), blobs, store.clone())
            .with_width(config.batch_width)
            .with_pause(config.batch_pause)
            .with_event_bus(event_bus.clone());

        Self {
            provider,
            store,
            resolver,
            encoder: TransformEncoder::new(config.cloud_name.clone()),
            guard: None,
            event_bus,
            page_size: config.page_size,
            listing: RwLock::new(ListingState::new(ListQuery::images())),
            listing_lock: Mutex::new(()),
        }
    }

    /// Guard invalidated on [`disconnect`](Self::disconnect)
    pub fn with_guard(mut self, guard: Arc<TokenGuard>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_query(mut self, query: ListQuery) -> Self {
        self.listing = RwLock::new(ListingState::new(query));
        self
    }

    // ------------------------------------------------------------------
    // Listing
    // ------------------------------------------------------------------

    /// Load the first page of the current query, replacing the listing.
    #[instrument(skip(self))]
    pub async fn fetch_page(&self) -> Result<ListPage> {
        let _serial = self.listing_lock.lock().await;
        self.list_locked(PageRequest::First).await
    }

    /// Load the page after the last one listed.
    ///
    /// Returns `Ok(None)` once the provider reported no further page. Loads
    /// the first page if nothing was listed yet.
    #[instrument(skip(self))]
    pub async fn load_more(&self) -> Result<Option<ListPage>> {
        let _serial = self.listing_lock.lock().await;
        let request = self.listing.read().await.next_request();
        match request {
            Some(request) => self.list_locked(request).await.map(Some),
            None => {
                debug!("Listing exhausted");
                Ok(None)
            }
        }
    }

    /// Reissue the last failed page request, if any
    #[instrument(skip(self))]
    pub async fn retry(&self) -> Result<Option<ListPage>> {
        let _serial = self.listing_lock.lock().await;
        let failed = self.listing.write().await.failed.take();
        match failed {
            Some(request) => self.list_locked(request).await.map(Some),
            None => Ok(None),
        }
    }

    /// Switch to another folder (`None` for the whole drive).
    ///
    /// Clears the cache and loads the first page of the new scope.
    pub async fn change_folder(&self, parent_id: Option<String>) -> Result<ListPage> {
        let mut query = self.query().await;
        query.parent_id = parent_id;
        self.set_query(query).await
    }

    /// Replace the listing query, clear the cache and load the first page
    #[instrument(skip(self, query), fields(parent = ?query.parent_id))]
    pub async fn set_query(&self, query: ListQuery) -> Result<ListPage> {
        let _serial = self.listing_lock.lock().await;
        self.listing.write().await.reset(Some(query));
        self.clear();
        self.list_locked(PageRequest::First).await
    }

    async fn list_locked(&self, request: PageRequest) -> Result<ListPage> {
        let (query, generation) = {
            let state = self.listing.read().await;
            (state.query.clone(), state.generation)
        };

        let result = self
            .provider
            .list_page(&query, self.page_size, request.cursor())
            .await;

        let mut state = self.listing.write().await;
        let current = state.generation == generation;

        match result {
            Ok(page) => {
                if !current {
                    debug!("Dropping page for a superseded listing");
                    return Ok(page);
                }
                let added = state.apply(&request, &page);
                drop(state);

                info!(
                    items = page.items.len(),
                    added = added.len(),
                    has_more = page.has_more,
                    "Listing page loaded"
                );
                self.emit(AssetEvent::PageLoaded {
                    item_count: page.items.len(),
                    appended: request.is_continuation(),
                    has_more: page.has_more,
                });
                Ok(page)
            }
            Err(e) => {
                let error = CoreError::listing(e);
                if current {
                    state.failed = Some(request);
                }
                drop(state);

                warn!(error = %error, "Listing page failed");
                self.emit(AssetEvent::PageFailed {
                    message: error.to_string(),
                    recoverable: !error.is_auth_expired(),
                });
                Err(error)
            }
        }
    }

    // ------------------------------------------------------------------
    // Resolution and cache reads
    // ------------------------------------------------------------------

    /// Resolve `items` into the shared cache. Never fails.
    pub async fn resolve(&self, items: &[DriveItem]) -> ResolveSummary {
        self.resolver.resolve(items).await
    }

    /// Resolve, stopping between groups once `cancel` fires
    pub async fn resolve_with_cancel(
        &self,
        items: &[DriveItem],
        cancel: &CancellationToken,
    ) -> ResolveSummary {
        self.resolver.resolve_with_cancel(items, cancel).await
    }

    /// Resolve everything listed so far
    pub async fn resolve_listed(&self) -> ResolveSummary {
        let items = self.items().await;
        self.resolver.resolve(&items).await
    }

    pub fn handle(&self, id: &str) -> Option<ResolvedHandle> {
        self.store.get(id)
    }

    pub fn has_handle(&self, id: &str) -> bool {
        self.store.has(id)
    }

    pub fn store(&self) -> &Arc<AssetStore> {
        &self.store
    }

    pub async fn items(&self) -> Vec<DriveItem> {
        self.listing.read().await.items.clone()
    }

    pub async fn has_more(&self) -> bool {
        self.listing.read().await.has_more()
    }

    pub async fn query(&self) -> ListQuery {
        self.listing.read().await.query.clone()
    }

    /// Whether a failed page is waiting for [`retry`](Self::retry)
    pub async fn has_failed_page(&self) -> bool {
        self.listing.read().await.failed.is_some()
    }

    /// Drop every cached handle and release local binaries
    pub fn clear(&self) -> usize {
        let revoked = self.store.clear();
        self.emit(AssetEvent::CacheCleared { revoked });
        revoked
    }

    /// End the session: forget the credential, the listing and the cache.
    ///
    /// A page still in flight is discarded when it arrives.
    #[instrument(skip(self))]
    pub async fn disconnect(&self) {
        if let Some(guard) = &self.guard {
            guard.invalidate().await;
        }
        self.listing.write().await.reset(None);
        self.clear();
        info!("Disconnected");
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Upload a new file into the current folder
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn save_as_new(
        &self,
        name: &str,
        mime_type: &str,
        data: Bytes,
    ) -> Result<DriveItem> {
        let mut request = UploadRequest::create(name, mime_type, data);
        if let Some(parent_id) = self.query().await.parent_id {
            request = request.in_folder(parent_id);
        }

        let saved = self.provider.upload(request).await.map_err(CoreError::write)?;
        info!(item_id = %saved.id, "Saved new item");
        self.emit(AssetEvent::ItemSaved {
            item_id: saved.id.clone(),
            replaced: false,
        });

        self.refresh_after_write().await;
        Ok(saved)
    }

    /// Overwrite the content of an existing item
    #[instrument(skip(self, item, data), fields(item_id = %item.id, size = data.len()))]
    pub async fn replace(&self, item: &DriveItem, data: Bytes) -> Result<DriveItem> {
        let request = UploadRequest::create(item.name.clone(), item.mime_type.clone(), data)
            .replacing(item.id.clone());

        let saved = self.provider.upload(request).await.map_err(CoreError::write)?;
        info!("Replaced item content");
        self.emit(AssetEvent::ItemSaved {
            item_id: saved.id.clone(),
            replaced: true,
        });

        self.refresh_after_write().await;
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, item_id: &str) -> Result<()> {
        self.provider
            .delete(item_id)
            .await
            .map_err(CoreError::write)?;

        self.store.remove(&[item_id.to_string()]);
        info!("Deleted item");
        self.emit(AssetEvent::ItemDeleted {
            item_id: item_id.to_string(),
        });

        self.refresh_after_write().await;
        Ok(())
    }

    /// Clear and relist after a write. A failed relist is left for `retry`.
    async fn refresh_after_write(&self) {
        let _serial = self.listing_lock.lock().await;
        self.listing.write().await.reset(None);
        self.clear();
        if let Err(e) = self.list_locked(PageRequest::First).await {
            warn!(error = %e, "Relisting after write failed");
        }
    }

    // ------------------------------------------------------------------
    // Encoding and events
    // ------------------------------------------------------------------

    /// Delivery URL of `id` with `options` applied
    pub fn encode(&self, id: &str, options: &TransformationOptions) -> String {
        self.encoder.encode(id, options)
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    fn emit(&self, event: AssetEvent) {
        let _ = self.event_bus.emit(CoreEvent::Assets(event));
    }
}

impl std::fmt::Debug for AssetService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetService")
            .field("encoder", &self.encoder)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}
