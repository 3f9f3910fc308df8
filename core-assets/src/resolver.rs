//! # Concurrent Batch Resolver
//!
//! Turns listed items into displayable handles. Items are claimed in the
//! store first, then fetched in fixed-width groups: every fetch in a group
//! runs concurrently, the whole group is awaited, and a short pause follows
//! before the next group starts. This keeps the number of simultaneous
//! requests against the provider bounded.
//!
//! Each item degrades independently:
//!
//! 1. full binary (`StorageProvider::download`)
//! 2. preview binary (`StorageProvider::fetch_preview`)
//! 3. the preview URL itself
//! 4. [`Placeholder::FetchError`]
//!
//! Non-image items map to [`Placeholder::NoPreview`] without any request.
//! Resolution never fails as a whole.

use crate::handle::{Placeholder, ResolvedHandle};
use crate::store::AssetStore;
use bridge_traits::blob::{BlobStore, BlobUrl};
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::storage::{BinaryPayload, DriveItem, StorageProvider};
use core_runtime::events::{AssetEvent, CoreEvent, EventBus};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_BATCH_WIDTH: usize = 3;
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_millis(200);

/// Outcome counts of one resolution pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    /// Items handed in
    pub requested: usize,
    /// Items already cached, in progress elsewhere, or repeated in the input
    pub skipped: usize,
    pub local: usize,
    pub remote: usize,
    pub placeholders: usize,
    /// Claimed items released unresolved after cancellation
    pub cancelled: usize,
}

impl ResolveSummary {
    fn record(&mut self, handle: &ResolvedHandle) {
        match handle {
            ResolvedHandle::Local(_) => self.local += 1,
            ResolvedHandle::Remote(_) => self.remote += 1,
            ResolvedHandle::Placeholder(_) => self.placeholders += 1,
        }
    }

    pub fn resolved(&self) -> usize {
        self.local + self.remote + self.placeholders
    }
}

pub struct BatchResolver {
    provider: Arc<dyn StorageProvider>,
    blobs: Arc<dyn BlobStore>,
    store: Arc<AssetStore>,
    width: usize,
    pause: Duration,
    event_bus: Option<EventBus>,
}

impl BatchResolver {
    pub fn new(
        provider: Arc<dyn StorageProvider>,
        blobs: Arc<dyn BlobStore>,
        store: Arc<AssetStore>,
    ) -> Self {
        Self {
            provider,
            blobs,
            store,
            width: DEFAULT_BATCH_WIDTH,
            pause: DEFAULT_BATCH_PAUSE,
            event_bus: None,
        }
    }

    /// Number of concurrent fetches per group (minimum 1)
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.max(1);
        self
    }

    /// Pause between groups
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn store(&self) -> &Arc<AssetStore> {
        &self.store
    }

    /// Resolve every item not yet cached or in progress.
    ///
    /// Runs to completion even if the caller no longer needs the results;
    /// they still land in the shared store. Dropping the future instead
    /// releases every item it had not finished, uncached.
    pub async fn resolve(&self, items: &[DriveItem]) -> ResolveSummary {
        self.run(items, None).await
    }

    /// Like [`resolve`](Self::resolve), but stops before the next group once
    /// `cancel` fires. Items not yet started are released uncached.
    pub async fn resolve_with_cancel(
        &self,
        items: &[DriveItem],
        cancel: &CancellationToken,
    ) -> ResolveSummary {
        self.run(items, Some(cancel)).await
    }

    #[instrument(skip(self, items, cancel), fields(requested = items.len()))]
    async fn run(&self, items: &[DriveItem], cancel: Option<&CancellationToken>) -> ResolveSummary {
        let mut summary = ResolveSummary {
            requested: items.len(),
            ..ResolveSummary::default()
        };

        // Released on drop, so an abandoned future leaves nothing pending
        let mut claim = self
            .store
            .claim(items.iter().map(|item| item.id.as_str()));
        summary.skipped = items.len() - claim.len();

        if claim.is_empty() {
            debug!("Nothing to resolve");
            return summary;
        }

        let by_id: HashMap<&str, &DriveItem> =
            items.iter().map(|item| (item.id.as_str(), item)).collect();
        let work: Vec<&DriveItem> = claim
            .ids()
            .iter()
            .filter_map(|id| by_id.get(id.as_str()).copied())
            .collect();

        for (index, group) in work.chunks(self.width).enumerate() {
            if index > 0 && !self.pause_between_groups(cancel).await {
                let remaining: Vec<String> = work[index * self.width..]
                    .iter()
                    .map(|item| item.id.clone())
                    .collect();
                summary.cancelled = remaining.len();
                claim.release(&remaining);
                info!(released = remaining.len(), "Resolution cancelled");
                break;
            }

            let handles = join_all(group.iter().map(|item| self.resolve_item(item))).await;

            let entries: HashMap<String, ResolvedHandle> = group
                .iter()
                .zip(handles)
                .map(|(item, handle)| {
                    summary.record(&handle);
                    (item.id.clone(), handle)
                })
                .collect();

            claim.complete(entries);
        }

        info!(
            local = summary.local,
            remote = summary.remote,
            placeholders = summary.placeholders,
            skipped = summary.skipped,
            "Batch resolution finished"
        );

        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Assets(AssetEvent::BatchResolved {
                requested: summary.requested,
                local: summary.local,
                remote: summary.remote,
                placeholders: summary.placeholders,
            }));
        }

        summary
    }

    /// Sleep between groups; false if cancelled before or during the pause
    async fn pause_between_groups(&self, cancel: Option<&CancellationToken>) -> bool {
        match cancel {
            None => {
                tokio::time::sleep(self.pause).await;
                true
            }
            Some(token) => {
                if token.is_cancelled() {
                    return false;
                }
                tokio::select! {
                    _ = token.cancelled() => false,
                    _ = tokio::time::sleep(self.pause) => true,
                }
            }
        }
    }

    async fn resolve_item(&self, item: &DriveItem) -> ResolvedHandle {
        if !item.is_previewable() {
            return ResolvedHandle::Placeholder(Placeholder::NoPreview);
        }

        match self.fetch_local(item, self.provider.download(&item.id).await) {
            Ok(url) => return ResolvedHandle::Local(url),
            Err(e) => warn!(item_id = %item.id, error = %e, "Primary fetch failed"),
        }

        let Some(preview_url) = item.preview_url.as_deref() else {
            return ResolvedHandle::Placeholder(Placeholder::FetchError);
        };

        match self.fetch_local(item, self.provider.fetch_preview(preview_url).await) {
            Ok(url) => ResolvedHandle::Local(url),
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "Preview fetch failed, using remote URL");
                ResolvedHandle::Remote(preview_url.to_string())
            }
        }
    }

    /// Register a fetched payload; empty bodies count as failures
    fn fetch_local(&self, item: &DriveItem, fetched: Result<BinaryPayload>) -> Result<BlobUrl> {
        let payload = fetched?;
        if payload.data.is_empty() {
            return Err(BridgeError::OperationFailed("Empty response body".to_string()));
        }
        let mime_type = payload
            .content_type
            .as_deref()
            .unwrap_or(item.mime_type.as_str());
        self.blobs.create(payload.data, mime_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_desktop::MemoryBlobStore;
    use bridge_traits::storage::{ListPage, ListQuery, PageCursor, UploadRequest};
    use bytes::Bytes;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Provider whose behaviour is keyed on item id / preview URL.
    #[derive(Default)]
    struct FakeProvider {
        failing_downloads: HashSet<String>,
        failing_previews: HashSet<String>,
        download_calls: Mutex<HashMap<String, usize>>,
        preview_calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        delay: Duration,
        cancel_on_download: Option<CancellationToken>,
    }

    impl FakeProvider {
        fn downloads_of(&self, id: &str) -> usize {
            self.download_calls
                .lock()
                .unwrap()
                .get(id)
                .copied()
                .unwrap_or(0)
        }

        fn total_downloads(&self) -> usize {
            self.download_calls.lock().unwrap().values().sum()
        }
    }

    #[async_trait]
    impl StorageProvider for FakeProvider {
        async fn list_page(
            &self,
            _query: &ListQuery,
            _page_size: u32,
            _cursor: Option<PageCursor>,
        ) -> Result<ListPage> {
            Err(BridgeError::NotAvailable("listing".to_string()))
        }

        async fn download(&self, item_id: &str) -> Result<BinaryPayload> {
            *self
                .download_calls
                .lock()
                .unwrap()
                .entry(item_id.to_string())
                .or_default() += 1;

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(token) = &self.cancel_on_download {
                token.cancel();
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing_downloads.contains(item_id) {
                return Err(BridgeError::Status {
                    status: 500,
                    message: "backend error".to_string(),
                });
            }
            Ok(BinaryPayload {
                data: Bytes::from(format!("full:{}", item_id)),
                content_type: Some("image/png".to_string()),
            })
        }

        async fn fetch_preview(&self, preview_url: &str) -> Result<BinaryPayload> {
            self.preview_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_previews.contains(preview_url) {
                return Err(BridgeError::OperationFailed("thumbnail expired".to_string()));
            }
            Ok(BinaryPayload {
                data: Bytes::from(format!("thumb:{}", preview_url)),
                content_type: None,
            })
        }

        async fn upload(&self, _request: UploadRequest) -> Result<DriveItem> {
            Err(BridgeError::NotAvailable("upload".to_string()))
        }

        async fn delete(&self, _item_id: &str) -> Result<()> {
            Err(BridgeError::NotAvailable("delete".to_string()))
        }
    }

    fn image(id: &str, preview: Option<&str>) -> DriveItem {
        DriveItem {
            id: id.to_string(),
            name: format!("{}.png", id),
            mime_type: "image/png".to_string(),
            size_bytes: Some(10),
            preview_url: preview.map(str::to_string),
            modified_at: None,
            parent_ids: vec![],
        }
    }

    fn images(count: usize) -> Vec<DriveItem> {
        (0..count).map(|i| image(&format!("img-{}", i), None)).collect()
    }

    fn resolver(provider: Arc<FakeProvider>) -> (BatchResolver, Arc<MemoryBlobStore>) {
        let blobs = Arc::new(MemoryBlobStore::new());
        let store = Arc::new(AssetStore::new(blobs.clone()));
        let resolver = BatchResolver::new(provider, blobs.clone(), store).with_pause(Duration::ZERO);
        (resolver, blobs)
    }

    #[tokio::test]
    async fn test_each_item_degrades_independently() {
        let provider = Arc::new(FakeProvider {
            failing_downloads: ["b", "c", "d"].iter().map(|s| s.to_string()).collect(),
            failing_previews: ["https://thumb/d"].iter().map(|s| s.to_string()).collect(),
            ..FakeProvider::default()
        });
        let (resolver, blobs) = resolver(provider.clone());

        let mut document = image("e", Some("https://thumb/e"));
        document.mime_type = "application/pdf".to_string();

        let items = vec![
            image("a", None),
            image("b", None),
            image("c", Some("https://thumb/c")),
            image("d", Some("https://thumb/d")),
            document,
        ];

        let summary = resolver.resolve(&items).await;
        let store = resolver.store();

        let a = store.get("a").unwrap();
        assert!(a.is_local());
        assert_eq!(
            blobs.get(a.local_url().unwrap()),
            Some(Bytes::from_static(b"full:a"))
        );

        assert_eq!(
            store.get("b"),
            Some(ResolvedHandle::Placeholder(Placeholder::FetchError))
        );

        let c = store.get("c").unwrap();
        assert_eq!(
            blobs.get(c.local_url().unwrap()),
            Some(Bytes::from_static(b"thumb:https://thumb/c"))
        );

        assert_eq!(
            store.get("d"),
            Some(ResolvedHandle::Remote("https://thumb/d".to_string()))
        );
        assert_eq!(
            store.get("e"),
            Some(ResolvedHandle::Placeholder(Placeholder::NoPreview))
        );

        assert_eq!(provider.downloads_of("e"), 0);
        assert_eq!(provider.preview_calls.load(Ordering::SeqCst), 2);
        assert_eq!(summary.local, 2);
        assert_eq!(summary.remote, 1);
        assert_eq!(summary.placeholders, 2);
        assert_eq!(summary.resolved(), 5);
    }

    #[tokio::test]
    async fn test_cached_items_are_not_refetched() {
        let provider = Arc::new(FakeProvider::default());
        let (resolver, _blobs) = resolver(provider.clone());
        let items = images(4);

        let first = resolver.resolve(&items).await;
        let handle = resolver.store().get("img-0");
        let second = resolver.resolve(&items).await;

        assert_eq!(first.resolved(), 4);
        assert_eq!(second.skipped, 4);
        assert_eq!(second.resolved(), 0);
        assert_eq!(provider.total_downloads(), 4);
        assert_eq!(resolver.store().get("img-0"), handle);
    }

    #[tokio::test]
    async fn test_duplicate_ids_in_input_fetch_once() {
        let provider = Arc::new(FakeProvider::default());
        let (resolver, _blobs) = resolver(provider.clone());
        let items = vec![image("a", None), image("a", None), image("b", None)];

        let summary = resolver.resolve(&items).await;

        assert_eq!(summary.skipped, 1);
        assert_eq!(provider.downloads_of("a"), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_resolutions_fetch_each_id_once() {
        let provider = Arc::new(FakeProvider {
            delay: Duration::from_millis(20),
            ..FakeProvider::default()
        });
        let (resolver, _blobs) = resolver(provider.clone());
        let resolver = Arc::new(resolver);

        let all = images(9);
        let first_half = all[..6].to_vec();
        let second_half = all[3..].to_vec();

        let r1 = {
            let resolver = Arc::clone(&resolver);
            tokio::spawn(async move { resolver.resolve(&first_half).await })
        };
        let r2 = {
            let resolver = Arc::clone(&resolver);
            tokio::spawn(async move { resolver.resolve(&second_half).await })
        };
        let (s1, s2) = (r1.await.unwrap(), r2.await.unwrap());

        for item in &all {
            assert_eq!(provider.downloads_of(&item.id), 1, "{}", item.id);
            assert!(resolver.store().has(&item.id));
        }
        assert_eq!(s1.resolved() + s2.resolved(), 9);
        assert_eq!(resolver.store().len(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_groups_are_bounded_and_paused() {
        let provider = Arc::new(FakeProvider {
            delay: Duration::from_millis(10),
            ..FakeProvider::default()
        });
        let blobs = Arc::new(MemoryBlobStore::new());
        let store = Arc::new(AssetStore::new(blobs.clone()));
        let resolver = BatchResolver::new(provider.clone(), blobs, store);

        let started = Instant::now();
        let summary = resolver.resolve(&images(7)).await;
        let elapsed = started.elapsed();

        assert_eq!(summary.local, 7);
        assert_eq!(provider.max_in_flight.load(Ordering::SeqCst), 3);
        // Three groups of 10ms each plus two 200ms pauses
        assert!(elapsed >= Duration::from_millis(430), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(500), "{:?}", elapsed);
    }

    #[tokio::test]
    async fn test_cancel_releases_unstarted_items() {
        let token = CancellationToken::new();
        let provider = Arc::new(FakeProvider {
            cancel_on_download: Some(token.clone()),
            ..FakeProvider::default()
        });
        let (resolver, _blobs) = resolver(provider.clone());
        let resolver = resolver.with_width(2);
        let items = images(5);

        let summary = resolver.resolve_with_cancel(&items, &token).await;

        assert_eq!(summary.resolved(), 2);
        assert_eq!(summary.cancelled, 3);
        assert_eq!(provider.total_downloads(), 2);
        for item in &items[2..] {
            assert!(!resolver.store().is_pending(&item.id));
            assert!(!resolver.store().has(&item.id));
        }

        // Released items can be resolved later
        let retry = resolver.resolve(&items).await;
        assert_eq!(retry.resolved(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_resolution_releases_claimed_items() {
        let provider = Arc::new(FakeProvider {
            delay: Duration::from_millis(200),
            ..FakeProvider::default()
        });
        let (resolver, blobs) = resolver(provider.clone());
        let items = images(2);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), resolver.resolve(&items)).await;
        assert!(abandoned.is_err());

        for item in &items {
            assert!(!resolver.store().is_pending(&item.id), "{}", item.id);
            assert!(!resolver.store().has(&item.id));
        }
        assert_eq!(blobs.live_count(), 0);

        let again = resolver.resolve(&items).await;
        assert_eq!(again.skipped, 0);
        assert_eq!(again.local, 2);
        assert_eq!(provider.total_downloads(), 4);
    }

    #[tokio::test]
    async fn test_empty_payload_falls_back() {
        struct EmptyProvider;

        #[async_trait]
        impl StorageProvider for EmptyProvider {
            async fn list_page(
                &self,
                _query: &ListQuery,
                _page_size: u32,
                _cursor: Option<PageCursor>,
            ) -> Result<ListPage> {
                Ok(ListPage::new(vec![], None))
            }

            async fn download(&self, _item_id: &str) -> Result<BinaryPayload> {
                Ok(BinaryPayload {
                    data: Bytes::new(),
                    content_type: None,
                })
            }

            async fn fetch_preview(&self, _preview_url: &str) -> Result<BinaryPayload> {
                Ok(BinaryPayload {
                    data: Bytes::new(),
                    content_type: None,
                })
            }

            async fn upload(&self, _request: UploadRequest) -> Result<DriveItem> {
                Err(BridgeError::NotAvailable("upload".to_string()))
            }

            async fn delete(&self, _item_id: &str) -> Result<()> {
                Ok(())
            }
        }

        let blobs = Arc::new(MemoryBlobStore::new());
        let store = Arc::new(AssetStore::new(blobs.clone()));
        let resolver = BatchResolver::new(Arc::new(EmptyProvider), blobs.clone(), store);

        resolver
            .resolve(&[image("a", Some("https://thumb/a")), image("b", None)])
            .await;

        assert_eq!(
            resolver.store().get("a"),
            Some(ResolvedHandle::Remote("https://thumb/a".to_string()))
        );
        assert_eq!(
            resolver.store().get("b"),
            Some(ResolvedHandle::Placeholder(Placeholder::FetchError))
        );
        assert_eq!(blobs.live_count(), 0);
    }

    #[tokio::test]
    async fn test_emits_batch_resolved() {
        let provider = Arc::new(FakeProvider::default());
        let bus = EventBus::new(8);
        let mut events = bus.subscribe();
        let (resolver, _blobs) = resolver(provider);
        let resolver = resolver.with_event_bus(bus);

        resolver.resolve(&images(2)).await;

        assert_eq!(
            events.try_recv().unwrap(),
            CoreEvent::Assets(AssetEvent::BatchResolved {
                requested: 2,
                local: 2,
                remote: 0,
                placeholders: 0,
            })
        );
    }
}
