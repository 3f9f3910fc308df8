//! OAuth 2.0 token renewal
//!
//! The guard never talks to an identity provider directly; it asks a
//! [`TokenRefresher`] for a new token. [`OAuthRefresher`] implements the
//! `refresh_token` grant (RFC 6749 section 6) against a token endpoint.
//!
//! # Security
//!
//! Token values and refresh tokens are never logged.
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::{OAuthClientConfig, OAuthRefresher, TokenRefresher};
//! use std::sync::Arc;
//!
//! # async fn example() -> core_auth::Result<()> {
//! # use bridge_traits::http::HttpClient;
//! # let http_client: Arc<dyn HttpClient> = todo!();
//! let config = OAuthClientConfig::google("1234.apps.googleusercontent.com");
//! let refresher = OAuthRefresher::new(config, "1//refresh-token", http_client);
//! let refreshed = refresher.refresh().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::RefreshedToken;
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

/// Google's OAuth token endpoint
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

const MAX_REFRESH_ATTEMPTS: u32 = 3;

/// Source of fresh access tokens.
///
/// Implementations perform one renewal per call. The guard serializes calls,
/// so an implementation never sees two concurrent refreshes.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self) -> Result<RefreshedToken>;
}

/// OAuth client registration used for the refresh grant.
#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    /// Confidential clients only
    pub client_secret: Option<String>,
    pub token_url: String,
}

impl OAuthClientConfig {
    /// Public Google client
    pub fn google(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            token_url: GOOGLE_TOKEN_URL.to_string(),
        }
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }
}

/// Renews access tokens with a long-lived refresh token.
///
/// A rotated refresh token returned by the provider replaces the stored one.
pub struct OAuthRefresher {
    config: OAuthClientConfig,
    refresh_token: RwLock<String>,
    http_client: Arc<dyn HttpClient>,
}

impl OAuthRefresher {
    pub fn new(
        config: OAuthClientConfig,
        refresh_token: impl Into<String>,
        http_client: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            config,
            refresh_token: RwLock::new(refresh_token.into()),
            http_client,
        }
    }

    fn encode_body(&self, refresh_token: &str) -> Result<Bytes> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];

        if let Some(ref client_secret) = self.config.client_secret {
            params.push(("client_secret", client_secret.as_str()));
        }

        serde_urlencoded::to_string(&params)
            .map(Bytes::from)
            .map_err(|e| AuthError::Other(format!("Failed to encode token request: {}", e)))
    }
}

#[async_trait]
impl TokenRefresher for OAuthRefresher {
    #[instrument(skip(self), fields(token_url = %self.config.token_url))]
    async fn refresh(&self) -> Result<RefreshedToken> {
        let current = self.refresh_token.read().await.clone();
        let body = self.encode_body(&current)?;

        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, "Requesting token refresh");

            let request = HttpRequest::new(HttpMethod::Post, self.config.token_url.clone())
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(body.clone());

            let response = self
                .http_client
                .execute(request)
                .await
                .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))?;

            if response.is_success() {
                let token_response: TokenResponse = response.json().map_err(|e| {
                    AuthError::TokenRefreshFailed(format!("Malformed token response: {}", e))
                })?;

                info!(
                    expires_in = token_response.expires_in,
                    "Token refreshed"
                );

                let mut refreshed =
                    RefreshedToken::new(token_response.access_token, token_response.expires_in);

                if let Some(rotated) = token_response.refresh_token {
                    *self.refresh_token.write().await = rotated.clone();
                    refreshed = refreshed.with_refresh_token(rotated);
                }

                return Ok(refreshed);
            }

            let status = response.status;

            // 4xx means the grant itself was refused
            if response.is_client_error() {
                let error_body = response
                    .text()
                    .unwrap_or_else(|_| "Unable to read error response".to_string());

                warn!(status, "Token refresh refused");

                return Err(AuthError::TokenRefreshFailed(format!(
                    "Token endpoint returned {}: {}",
                    status, error_body
                )));
            }

            if attempts >= MAX_REFRESH_ATTEMPTS {
                return Err(AuthError::TokenRefreshFailed(format!(
                    "Token refresh failed after {} attempts, last status {}",
                    attempts, status
                )));
            }

            let delay = Duration::from_millis(100 * 2u64.pow(attempts - 1));
            warn!(
                status,
                attempts,
                delay_ms = delay.as_millis() as u64,
                "Token endpoint unavailable, retrying"
            );
            sleep(delay).await;
        }
    }
}

/// JSON body returned by the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::HttpResponse;
    use mockall::{mock, Sequence};
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[tokio::test]
    async fn test_refresh_posts_form_body() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .withf(|request| {
                let body = String::from_utf8_lossy(request.body.as_deref().unwrap_or_default());
                request.method == HttpMethod::Post
                    && request.url == GOOGLE_TOKEN_URL
                    && body.contains("grant_type=refresh_token")
                    && body.contains("client_id=client-1")
                    && !body.contains("client_secret")
            })
            .returning(|_| Ok(response(200, r#"{"access_token":"ya29.new","expires_in":1800}"#)));

        let refresher = OAuthRefresher::new(
            OAuthClientConfig::google("client-1"),
            "1//rt",
            Arc::new(mock_http),
        );

        let refreshed = refresher.refresh().await.unwrap();
        assert_eq!(refreshed.access_token, "ya29.new");
        assert_eq!(refreshed.expires_in, 1800);
        assert_eq!(refreshed.refresh_token, None);
    }

    #[tokio::test]
    async fn test_refresh_stores_rotated_refresh_token() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = Sequence::new();
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(response(
                    200,
                    r#"{"access_token":"a1","refresh_token":"rotated"}"#,
                ))
            });
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|request| {
                String::from_utf8_lossy(request.body.as_deref().unwrap_or_default())
                    .contains("refresh_token=rotated")
            })
            .returning(|_| Ok(response(200, r#"{"access_token":"a2"}"#)));

        let refresher = OAuthRefresher::new(
            OAuthClientConfig::google("client-1"),
            "original",
            Arc::new(mock_http),
        );

        let first = refresher.refresh().await.unwrap();
        assert_eq!(first.expires_in, 3600);
        assert_eq!(first.refresh_token.as_deref(), Some("rotated"));

        let second = refresher.refresh().await.unwrap();
        assert_eq!(second.access_token, "a2");
    }

    #[tokio::test]
    async fn test_refresh_rejected_grant_is_not_retried() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| Ok(response(400, r#"{"error":"invalid_grant"}"#)));

        let refresher = OAuthRefresher::new(
            OAuthClientConfig::google("client-1"),
            "revoked",
            Arc::new(mock_http),
        );

        let err = refresher.refresh().await.unwrap_err();
        assert!(matches!(err, AuthError::TokenRefreshFailed(msg) if msg.contains("invalid_grant")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_retries_server_errors() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(MAX_REFRESH_ATTEMPTS as usize)
            .returning(|_| Ok(response(503, "unavailable")));

        let refresher = OAuthRefresher::new(
            OAuthClientConfig::google("client-1"),
            "rt",
            Arc::new(mock_http),
        );

        assert!(refresher.refresh().await.is_err());
    }
}
