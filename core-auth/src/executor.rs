//! Authenticated Request Executor
//!
//! Attaches the guard's bearer token to outgoing requests. A `401` triggers
//! exactly one refresh and exactly one reissue of the same request; a second
//! `401` ends the session. Every other status is handed back untouched.

use crate::error::{AuthError, Result};
use crate::guard::TokenGuard;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub struct AuthenticatedExecutor {
    http_client: Arc<dyn HttpClient>,
    guard: Arc<TokenGuard>,
}

impl AuthenticatedExecutor {
    pub fn new(http_client: Arc<dyn HttpClient>, guard: Arc<TokenGuard>) -> Self {
        Self { http_client, guard }
    }

    pub fn guard(&self) -> &Arc<TokenGuard> {
        &self.guard
    }

    /// Issue `request` with a valid bearer token.
    ///
    /// # Errors
    ///
    /// - `AuthError::AuthExpired` if no token can be obtained, or the request
    ///   is rejected again after the refresh
    /// - `AuthError::Transport` if the HTTP client fails
    #[instrument(skip(self, request), fields(method = ?request.method, url = %request.url))]
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let token = self.guard.ensure_valid().await?;
        let response = self.send(request.clone(), &token).await?;

        if !response.is_unauthorized() {
            return Ok(response);
        }

        warn!("Request rejected with 401, refreshing credential");
        let renewed = self.guard.refresh_after_rejection(&token).await?;
        let retried = self.send(request, &renewed).await?;

        if retried.is_unauthorized() {
            let reason = "Request rejected again after credential refresh";
            self.guard.expire(reason).await;
            return Err(AuthError::AuthExpired(reason.to_string()));
        }

        debug!(status = retried.status, "Reissued request completed");
        Ok(retried)
    }

    async fn send(&self, request: HttpRequest, token: &str) -> Result<HttpResponse> {
        self.http_client
            .execute(request.bearer_token(token))
            .await
            .map_err(AuthError::Transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::TokenRefresher;
    use crate::types::{Credential, RefreshedToken};
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::{HttpMethod, AUTHORIZATION_HEADER};
    use bridge_traits::time::ManualClock;
    use bytes::Bytes;
    use chrono::{DateTime, Utc};
    use mockall::{mock, Sequence};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

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
        async fn refresh(&self) -> Result<RefreshedToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(RefreshedToken::new(format!("fresh-{}", n), 3600))
        }
    }

    fn response(status: u16) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from_static(b"{}"),
        }
    }

    fn bearer_is(request: &HttpRequest, token: &str) -> bool {
        request.headers.get(AUTHORIZATION_HEADER).map(String::as_str)
            == Some(format!("Bearer {}", token).as_str())
    }

    fn executor(mock_http: MockHttpClient, refresher: Arc<CountingRefresher>) -> AuthenticatedExecutor {
        let start = DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let guard = TokenGuard::new(Arc::new(ManualClock::new(start)))
            .with_refresher(refresher)
            .with_credential(Credential::from_expires_in("stale", 3600, start));
        AuthenticatedExecutor::new(Arc::new(mock_http), Arc::new(guard))
    }

    fn request() -> HttpRequest {
        HttpRequest::new(HttpMethod::Get, "https://www.googleapis.com/drive/v3/files")
    }

    #[tokio::test]
    async fn test_success_passes_through() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .withf(|request| bearer_is(request, "stale"))
            .returning(|_| Ok(response(200)));

        let refresher = Arc::new(CountingRefresher::default());
        let executor = executor(mock_http, refresher.clone());

        let result = executor.execute(request()).await.unwrap();
        assert_eq!(result.status, 200);
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_single_401_refreshes_and_retries_once() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = Sequence::new();
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|request| bearer_is(request, "stale"))
            .returning(|_| Ok(response(401)));
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|request| bearer_is(request, "fresh-1"))
            .returning(|_| Ok(response(200)));

        let refresher = Arc::new(CountingRefresher::default());
        let executor = executor(mock_http, refresher.clone());

        let result = executor.execute(request()).await.unwrap();
        assert_eq!(result.status, 200);
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_double_401_is_auth_expired_after_one_refresh() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(2)
            .returning(|_| Ok(response(401)));

        let refresher = Arc::new(CountingRefresher::default());
        let executor = executor(mock_http, refresher.clone());

        let err = executor.execute(request()).await.unwrap_err();
        assert!(matches!(err, AuthError::AuthExpired(_)));
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
        assert!(executor.guard().credential().await.is_none());
    }

    #[tokio::test]
    async fn test_401_without_refresher_is_not_reissued() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .withf(|request| bearer_is(request, "stale"))
            .returning(|_| Ok(response(401)));

        let start = DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let guard = TokenGuard::new(Arc::new(ManualClock::new(start)))
            .with_credential(Credential::from_expires_in("stale", 3600, start));
        let executor = AuthenticatedExecutor::new(Arc::new(mock_http), Arc::new(guard));

        let err = executor.execute(request()).await.unwrap_err();
        assert!(matches!(err, AuthError::AuthExpired(_)));
        assert!(executor.guard().credential().await.is_none());
    }

    #[tokio::test]
    async fn test_other_statuses_are_not_retried() {
        for status in [403u16, 404, 429, 500, 503] {
            let mut mock_http = MockHttpClient::new();
            mock_http
                .expect_execute()
                .times(1)
                .returning(move |_| Ok(response(status)));

            let refresher = Arc::new(CountingRefresher::default());
            let executor = executor(mock_http, refresher.clone());

            let result = executor.execute(request()).await.unwrap();
            assert_eq!(result.status, status);
            assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_transport_error_is_wrapped() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Err(BridgeError::OperationFailed("connection reset".to_string())));

        let executor = executor(mock_http, Arc::new(CountingRefresher::default()));

        let err = executor.execute(request()).await.unwrap_err();
        assert!(matches!(err, AuthError::Transport(_)));
    }
}
