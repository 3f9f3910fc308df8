//! # Event Bus System
//!
//! Provides an event-driven architecture for the asset synchronization core
//! using `tokio::sync::broadcast`. Modules publish typed events; hosts and
//! other modules subscribe independently.
//!
//! ## Overview
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ Token Guard  ├──────────────>│           │
//! └──────────────┘               │ EventBus  │     subscribe    ┌────────────┐
//! ┌──────────────┐     emit      │ (broadcast├─────────────────>│ Subscriber │
//! │ Asset Layer  ├──────────────>│  channel) │                  └────────────┘
//! └──────────────┘               └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AssetEvent, CoreEvent, EventBus};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! let _ = event_bus.emit(CoreEvent::Assets(AssetEvent::CacheCleared { revoked: 4 }));
//! assert!(subscriber.try_recv().is_ok());
//! ```
//!
//! Emission is best-effort: `emit` fails only when nobody is listening,
//! and publishers ignore that case.
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//! - **`RecvError::Closed`**: All senders have been dropped.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast::{self, error::RecvError, error::SendError, Receiver};

/// Default buffer size for the event bus.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Credential lifecycle events
    Auth(AuthEvent),
    /// Listing, resolution and cache events
    Assets(AssetEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Assets(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::SessionExpired { .. }) => EventSeverity::Error,
            CoreEvent::Assets(AssetEvent::PageFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Auth(AuthEvent::SignedOut) => EventSeverity::Info,
            CoreEvent::Assets(AssetEvent::PageLoaded { .. }) => EventSeverity::Info,
            CoreEvent::Assets(AssetEvent::ItemSaved { .. })
            | CoreEvent::Assets(AssetEvent::ItemDeleted { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Events emitted by the token guard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// A fresh access token was obtained.
    TokenRefreshed {
        /// Expiry of the new token (Unix epoch seconds).
        expires_at: i64,
    },
    /// The credential could not be renewed; the host must re-authenticate.
    SessionExpired {
        message: String,
    },
    /// The credential was discarded on request.
    SignedOut,
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::TokenRefreshed { .. } => "Token refreshed successfully",
            AuthEvent::SessionExpired { .. } => "Session expired",
            AuthEvent::SignedOut => "Signed out",
        }
    }
}

// ============================================================================
// Asset Events
// ============================================================================

/// Events emitted while listing and resolving remote assets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AssetEvent {
    /// A listing page arrived.
    PageLoaded {
        /// Items in this page.
        item_count: usize,
        /// Whether the page was appended to an existing listing.
        appended: bool,
        /// Whether the provider reported a further page.
        has_more: bool,
    },
    /// A listing page request failed; previous results are kept.
    PageFailed {
        message: String,
        /// Whether a retry may succeed.
        recoverable: bool,
    },
    /// A batch resolution pass finished.
    BatchResolved {
        /// Items handed to the resolver.
        requested: usize,
        /// Items mapped to a local handle.
        local: usize,
        /// Items mapped to a remote fallback URL.
        remote: usize,
        /// Items mapped to a placeholder.
        placeholders: usize,
    },
    /// Every cached handle was dropped.
    CacheCleared {
        /// Local handles released.
        revoked: usize,
    },
    /// An item was created or replaced remotely.
    ItemSaved {
        item_id: String,
        replaced: bool,
    },
    /// An item was deleted remotely.
    ItemDeleted {
        item_id: String,
    },
}

impl AssetEvent {
    fn description(&self) -> &str {
        match self {
            AssetEvent::PageLoaded { .. } => "Listing page loaded",
            AssetEvent::PageFailed { .. } => "Listing page failed",
            AssetEvent::BatchResolved { .. } => "Batch resolved",
            AssetEvent::CacheCleared { .. } => "Asset cache cleared",
            AssetEvent::ItemSaved { .. } => "Item saved",
            AssetEvent::ItemDeleted { .. } => "Item deleted",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for core events.
///
/// Cloning an `EventBus` yields another handle to the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers falling behind by more than `capacity` events receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(16);
/// let assets_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Assets(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive a matching event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_loaded(item_count: usize) -> CoreEvent {
        CoreEvent::Assets(AssetEvent::PageLoaded {
            item_count,
            appended: false,
            has_more: true,
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let event_bus = EventBus::new(10);
        assert!(event_bus.emit(page_loaded(1)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let event_bus = EventBus::new(10);
        let mut first = event_bus.subscribe();
        let mut second = event_bus.subscribe();
        assert_eq!(event_bus.subscriber_count(), 2);

        assert_eq!(event_bus.emit(page_loaded(3)).unwrap(), 2);

        assert_eq!(first.recv().await.unwrap(), page_loaded(3));
        assert_eq!(second.recv().await.unwrap(), page_loaded(3));
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let event_bus = EventBus::new(10);
        let mut stream = EventStream::new(event_bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Auth(_)));

        event_bus.emit(page_loaded(2)).unwrap();
        event_bus
            .emit(CoreEvent::Auth(AuthEvent::TokenRefreshed { expires_at: 42 }))
            .unwrap();

        let event = stream.recv().await.unwrap();
        assert_eq!(
            event,
            CoreEvent::Auth(AuthEvent::TokenRefreshed { expires_at: 42 })
        );
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let event_bus = EventBus::new(2);
        let mut subscriber = event_bus.subscribe();

        for i in 0..5 {
            event_bus.emit(page_loaded(i)).unwrap();
        }

        assert!(matches!(
            subscriber.recv().await,
            Err(RecvError::Lagged(_))
        ));
    }

    #[test]
    fn test_event_severity() {
        let expired = CoreEvent::Auth(AuthEvent::SessionExpired {
            message: "refresh rejected".to_string(),
        });
        assert_eq!(expired.severity(), EventSeverity::Error);

        let failed = CoreEvent::Assets(AssetEvent::PageFailed {
            message: "503".to_string(),
            recoverable: true,
        });
        assert_eq!(failed.severity(), EventSeverity::Warning);

        let resolved = CoreEvent::Assets(AssetEvent::BatchResolved {
            requested: 3,
            local: 2,
            remote: 1,
            placeholders: 0,
        });
        assert_eq!(resolved.severity(), EventSeverity::Debug);
        assert_eq!(resolved.description(), "Batch resolved");
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Assets(AssetEvent::ItemDeleted {
            item_id: "file-1".to_string(),
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Assets\""));
        assert!(json.contains("\"event\":\"ItemDeleted\""));

        let parsed: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
