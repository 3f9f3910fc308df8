//! # Asset Resolution
//!
//! Turns listed remote items into displayable handles and keeps them cached
//! for the lifetime of a session.
//!
//! - [`AssetStore`]: shared id → [`ResolvedHandle`] map with in-progress tracking
//! - [`BatchResolver`]: bounded, grouped fetching with per-item fallback
//!
//! ```ignore
//! let store = Arc::new(AssetStore::new(blobs.clone()));
//! let resolver = BatchResolver::new(provider, blobs, store.clone())
//!     .with_event_bus(event_bus);
//!
//! resolver.resolve(&page.items).await;
//! let handle = store.get(&page.items[0].id);
//! ```

pub mod handle;
pub mod resolver;
pub mod store;

pub use handle::{Placeholder, ResolvedHandle};
pub use resolver::{BatchResolver, ResolveSummary, DEFAULT_BATCH_PAUSE, DEFAULT_BATCH_WIDTH};
pub use store::{AssetStore, Claim};
