//! End-to-end wiring: guard, executor, Drive connector, resolver and cache
//! over a mocked HTTP bridge.

use async_trait::async_trait;
use bridge_desktop::MemoryBlobStore;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, AUTHORIZATION_HEADER};
use bridge_traits::time::ManualClock;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use core_auth::{Credential, RefreshedToken, TokenRefresher};
use core_runtime::config::AssetSyncConfig;
use core_runtime::events::{AuthEvent, CoreEvent};
use core_service::{connect_google_drive, CoreDependencies, CoreError, DriveSession};
use mockall::mock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

mock! {
    HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
    }
}

#[derive(Default)]
struct CountingRefresher {
    calls: AtomicUsize,
}

#[async_trait]
impl TokenRefresher for CountingRefresher {
    async fn refresh(&self) -> core_auth::Result<RefreshedToken> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RefreshedToken::new("renewed", 3600))
    }
}

fn response(status: u16, body: &'static [u8]) -> HttpResponse {
    HttpResponse {
        status,
        headers: HashMap::new(),
        body: Bytes::from_static(body),
    }
}

const FILES_PAGE: &[u8] = br#"{
    "files": [
        {"id": "img-1", "name": "one.png", "mimeType": "image/png", "size": "3"},
        {"id": "img-2", "name": "two.png", "mimeType": "image/png",
         "thumbnailLink": "https://lh3.googleusercontent.com/thumb-2"},
        {"id": "doc-1", "name": "notes.pdf", "mimeType": "application/pdf"}
    ]
}"#;

fn start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn config(http: Arc<dyn HttpClient>) -> AssetSyncConfig {
    AssetSyncConfig::builder()
        .drive_client_id("client-id.apps.googleusercontent.com")
        .cloud_name("demo")
        .batch_pause(Duration::ZERO)
        .http_client(http)
        .build()
        .unwrap()
}

fn bearer(request: &HttpRequest) -> String {
    request
        .headers
        .get(AUTHORIZATION_HEADER)
        .cloned()
        .unwrap_or_default()
}

#[tokio::test]
async fn test_expiring_session_lists_and_resolves() {
    let mut mock_http = MockHttpClient::new();
    mock_http.expect_execute().returning(|request| {
        assert_eq!(bearer(&request), "Bearer renewed");
        if request.url.contains("alt=media") && request.url.contains("img-1") {
            Ok(response(200, b"png"))
        } else if request.url.contains("alt=media") {
            Ok(response(500, b"backend error"))
        } else if request.url.contains("thumb-2") {
            Ok(response(200, b"thumb"))
        } else {
            Ok(response(200, FILES_PAGE))
        }
    });

    let http: Arc<dyn HttpClient> = Arc::new(mock_http);
    let config = config(http.clone());
    let refresher = Arc::new(CountingRefresher::default());

    // Expires in two minutes, inside the five minute margin
    let session = DriveSession::new(Credential::from_expires_in("stale", 120, start()))
        .with_refresher(refresher.clone());
    let deps = CoreDependencies::new(http, Arc::new(MemoryBlobStore::new()))
        .with_clock(Arc::new(ManualClock::new(start())));

    let service = connect_google_drive(&config, deps, session).unwrap();
    let mut events = service.subscribe();

    let page = service.fetch_page().await.unwrap();
    assert_eq!(page.items.len(), 3);
    assert!(!page.has_more);
    assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);

    let summary = service.resolve(&page.items).await;
    assert_eq!(summary.local, 2);
    assert_eq!(summary.placeholders, 1);

    assert!(service.handle("img-1").unwrap().is_local());
    assert!(service.handle("img-2").unwrap().is_local());
    assert!(service.handle("doc-1").unwrap().is_placeholder());

    let mut refreshed = false;
    while let Some(Ok(event)) = events.try_recv() {
        if matches!(event, CoreEvent::Auth(AuthEvent::TokenRefreshed { .. })) {
            refreshed = true;
        }
    }
    assert!(refreshed);
}

#[tokio::test]
async fn test_rejected_session_surfaces_auth_expired() {
    let mut mock_http = MockHttpClient::new();
    mock_http
        .expect_execute()
        .times(2)
        .returning(|_| Ok(response(401, b"{}")));

    let http: Arc<dyn HttpClient> = Arc::new(mock_http);
    let config = config(http.clone());
    let refresher = Arc::new(CountingRefresher::default());

    let session = DriveSession::new(Credential::from_expires_in("valid", 3600, start()))
        .with_refresher(refresher.clone());
    let deps = CoreDependencies::new(http, Arc::new(MemoryBlobStore::new()))
        .with_clock(Arc::new(ManualClock::new(start())));

    let service = connect_google_drive(&config, deps, session).unwrap();

    let err = service.fetch_page().await.unwrap_err();

    assert!(matches!(err, CoreError::AuthExpired(_)));
    assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    assert!(service.has_failed_page().await);
}

#[test]
fn test_placeholder_configuration_is_rejected() {
    let http: Arc<dyn HttpClient> = Arc::new(MockHttpClient::new());
    let mut config = config(http.clone());
    config.cloud_name = "your_cloud_name".to_string();

    let result = connect_google_drive(
        &config,
        CoreDependencies::new(http, Arc::new(MemoryBlobStore::new())),
        DriveSession::new(Credential::from_expires_in("t", 3600, start())),
    );

    assert!(matches!(result, Err(CoreError::Config(_))));
}
