//! Token Guard
//!
//! Keeps the current bearer credential and guarantees callers a token that
//! will not expire within the configured margin. Renewals are serialized:
//! however many callers find the token stale at once, the refresher runs a
//! single time and everyone receives its result.
//!
//! ```no_run
//! use bridge_traits::time::SystemClock;
//! use core_auth::TokenGuard;
//! use std::sync::Arc;
//!
//! # async fn example(refresher: Arc<dyn core_auth::TokenRefresher>) -> core_auth::Result<()> {
//! let guard = TokenGuard::new(Arc::new(SystemClock)).with_refresher(refresher);
//! let token = guard.ensure_valid().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::oauth::TokenRefresher;
use crate::types::Credential;
use bridge_traits::time::Clock;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// Refresh credentials expiring within this window
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

/// Upper bound for a single renewal
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct TokenGuard {
    credential: RwLock<Option<Credential>>,
    refresh_lock: Mutex<()>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    clock: Arc<dyn Clock>,
    margin: chrono::Duration,
    refresh_timeout: Duration,
    event_bus: Option<EventBus>,
}

impl TokenGuard {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            credential: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            refresher: None,
            clock,
            margin: to_chrono(TOKEN_REFRESH_MARGIN),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            event_bus: None,
        }
    }

    pub fn with_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Seed the guard with an already obtained credential
    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = RwLock::new(Some(credential));
        self
    }

    pub fn with_margin(mut self, margin: Duration) -> Self {
        self.margin = to_chrono(margin);
        self
    }

    pub fn with_refresh_timeout(mut self, refresh_timeout: Duration) -> Self {
        self.refresh_timeout = refresh_timeout;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Return a token valid for at least the margin, refreshing if needed.
    ///
    /// # Errors
    ///
    /// `AuthError::AuthExpired` when no usable credential exists and the
    /// refresh failed or no refresher is configured. The stale credential is
    /// discarded in that case; a later call attempts a renewal again.
    #[instrument(skip(self))]
    pub async fn ensure_valid(&self) -> Result<String> {
        if let Some(token) = self.fresh_token().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed while we waited
        if let Some(token) = self.fresh_token().await {
            debug!("Credential renewed by concurrent caller");
            return Ok(token);
        }

        info!("Credential missing or expiring soon, refreshing");
        self.refresh_locked().await
    }

    /// Renew after the server rejected `rejected_token`.
    ///
    /// If the stored credential already differs from the rejected one, a
    /// concurrent caller has renewed it and that token is returned without
    /// another refresh.
    #[instrument(skip(self, rejected_token))]
    pub async fn refresh_after_rejection(&self, rejected_token: &str) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(token) = self.fresh_token().await {
            if token != rejected_token {
                debug!("Rejected credential already replaced");
                return Ok(token);
            }
        }

        warn!("Credential rejected by server, refreshing");
        self.refresh_locked().await
    }

    /// Install a credential obtained out of band (e.g. interactive sign-in)
    pub async fn replace(&self, credential: Credential) {
        let expires_at = credential.expires_at.timestamp();
        *self.credential.write().await = Some(credential);
        self.emit(AuthEvent::TokenRefreshed { expires_at });
    }

    /// Drop the credential; the next call needs a refresh
    pub async fn invalidate(&self) {
        let had_credential = self.credential.write().await.take().is_some();
        if had_credential {
            info!("Credential discarded");
            self.emit(AuthEvent::SignedOut);
        }
    }

    /// Drop the credential after the server rejected a freshly renewed token
    pub async fn expire(&self, reason: &str) {
        self.credential.write().await.take();
        error!(reason, "Session expired");
        self.emit(AuthEvent::SessionExpired {
            message: reason.to_string(),
        });
    }

    /// Whether a credential outside the refresh margin is held
    pub async fn is_valid(&self) -> bool {
        self.fresh_token().await.is_some()
    }

    pub fn can_refresh(&self) -> bool {
        self.refresher.is_some()
    }

    /// Current credential regardless of expiry
    pub async fn credential(&self) -> Option<Credential> {
        self.credential.read().await.clone()
    }

    async fn fresh_token(&self) -> Option<String> {
        let now = self.clock.now();
        self.credential
            .read()
            .await
            .as_ref()
            .filter(|credential| !credential.expires_within(self.margin, now))
            .map(|credential| credential.access_token.clone())
    }

    /// Caller must hold `refresh_lock`.
    async fn refresh_locked(&self) -> Result<String> {
        let Some(refresher) = self.refresher.as_ref() else {
            self.expire("No credential and no way to refresh it").await;
            return Err(AuthError::AuthExpired(
                "No credential and no refresher configured".to_string(),
            ));
        };

        let outcome = match timeout(self.refresh_timeout, refresher.refresh()).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::OperationTimeout {
                operation: "token refresh".to_string(),
            }),
        };

        match outcome {
            Ok(refreshed) => {
                let credential = Credential::from_expires_in(
                    refreshed.access_token,
                    refreshed.expires_in,
                    self.clock.now(),
                );
                let token = credential.access_token.clone();
                let expires_at = credential.expires_at.timestamp();

                *self.credential.write().await = Some(credential);
                info!(expires_at, "Credential refreshed");
                self.emit(AuthEvent::TokenRefreshed { expires_at });

                Ok(token)
            }
            Err(e) => {
                let reason = format!("Token refresh failed: {}", e);
                self.expire(&reason).await;
                Err(AuthError::AuthExpired(reason))
            }
        }
    }

    fn emit(&self, event: AuthEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Auth(event));
        }
    }
}

impl std::fmt::Debug for TokenGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGuard")
            .field("can_refresh", &self.can_refresh())
            .field("margin_secs", &self.margin.num_seconds())
            .finish()
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::seconds(300))
}
