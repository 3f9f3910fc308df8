//! # Asset Cache Store
//!
//! Shared map from item id to [`ResolvedHandle`], plus the set of ids whose
//! resolution is in progress. Both live under one lock so that the
//! check-and-mark performed by [`AssetStore::claim`] is atomic: two
//! overlapping resolutions never fetch the same id twice.
//!
//! A [`Claim`] owns its in-progress marks. Whatever it has not completed or
//! released when dropped is released then, so an abandoned resolution never
//! leaves ids stuck as pending.
//!
//! Local handles own a blob registration. The store revokes it whenever the
//! handle is replaced, removed or cleared.

use crate::handle::ResolvedHandle;
use bridge_traits::blob::BlobStore;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

#[derive(Default)]
struct StoreState {
    handles: HashMap<String, ResolvedHandle>,
    /// In-progress ids, keyed to the claim that owns them
    pending: HashMap<String, u64>,
    next_claim: u64,
}

pub struct AssetStore {
    state: Mutex<StoreState>,
    blobs: Arc<dyn BlobStore>,
}

impl AssetStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            blobs,
        }
    }

    pub fn get(&self, id: &str) -> Option<ResolvedHandle> {
        self.lock().handles.get(id).cloned()
    }

    pub fn has(&self, id: &str) -> bool {
        self.lock().handles.contains_key(id)
    }

    /// Merge `entries` into the store.
    ///
    /// Ids not mentioned keep their handles. A replaced local handle is
    /// revoked unless the new handle is the same URL.
    pub fn set(&self, entries: HashMap<String, ResolvedHandle>) {
        let mut state = self.lock();
        for (id, handle) in entries {
            self.merge_locked(&mut state, id, handle);
        }
    }

    /// Evict the given ids, returning how many handles were dropped.
    ///
    /// A resolution still running for an evicted id loses its mark, so its
    /// late result is discarded instead of cached.
    pub fn remove(&self, ids: &[String]) -> usize {
        let mut state = self.lock();
        let mut removed = 0;
        for id in ids {
            state.pending.remove(id);
            if let Some(handle) = state.handles.remove(id) {
                self.revoke(&handle);
                removed += 1;
            }
        }
        debug!(removed, "Evicted cached handles");
        removed
    }

    /// Drop every handle, returning how many local handles were revoked.
    ///
    /// In-progress marks survive: resolutions already running still own
    /// their ids and merge their results when they finish.
    pub fn clear(&self) -> usize {
        let mut state = self.lock();
        let revoked = state
            .handles
            .drain()
            .filter(|(_, handle)| self.revoke(handle))
            .count();
        info!(revoked, "Asset cache cleared");
        revoked
    }

    /// Claim every id that is neither cached nor in progress.
    ///
    /// The claim lists the ids in input order, each at most once.
    pub fn claim<'a, I>(&self, ids: I) -> Claim<'_>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut state = self.lock();
        state.next_claim += 1;
        let token = state.next_claim;

        let mut claimed = Vec::new();
        for id in ids {
            if state.handles.contains_key(id) || state.pending.contains_key(id) {
                continue;
            }
            state.pending.insert(id.to_string(), token);
            claimed.push(id.to_string());
        }

        Claim {
            store: self,
            token,
            outstanding: claimed.iter().cloned().collect(),
            ids: claimed,
        }
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.lock().pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().handles.is_empty()
    }

    /// Copy of every cached handle
    pub fn snapshot(&self) -> HashMap<String, ResolvedHandle> {
        self.lock().handles.clone()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn merge_locked(&self, state: &mut StoreState, id: String, handle: ResolvedHandle) {
        if let Some(previous) = state.handles.insert(id, handle.clone()) {
            if previous != handle {
                self.revoke(&previous);
            }
        }
    }

    /// Release the blob behind a local handle; true if one was released
    fn revoke(&self, handle: &ResolvedHandle) -> bool {
        match handle.local_url() {
            Some(url) => {
                self.blobs.revoke(url);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for AssetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetStore").finish_non_exhaustive()
    }
}

/// In-progress marks taken by one resolution.
///
/// Dropping the claim releases every id it has not completed or released.
pub struct Claim<'a> {
    store: &'a AssetStore,
    token: u64,
    ids: Vec<String>,
    outstanding: HashSet<String>,
}

impl Claim<'_> {
    /// Claimed ids in input order
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids neither completed nor released yet
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Cache results for claimed ids and release their marks.
    ///
    /// An id whose mark was dropped meanwhile (evicted by
    /// [`AssetStore::remove`]) is discarded and its local blob revoked.
    /// Returns how many handles were cached.
    pub fn complete(&mut self, entries: HashMap<String, ResolvedHandle>) -> usize {
        let store = self.store;
        let mut state = store.lock();
        let mut cached = 0;
        for (id, handle) in entries {
            let owned = self.outstanding.remove(&id) && state.pending.get(&id) == Some(&self.token);
            if owned {
                state.pending.remove(&id);
                store.merge_locked(&mut state, id, handle);
                cached += 1;
            } else {
                debug!(item_id = %id, "Discarding result for an evicted item");
                store.revoke(&handle);
            }
        }
        cached
    }

    /// Release marks without caching anything
    pub fn release(&mut self, ids: &[String]) {
        let store = self.store;
        let mut state = store.lock();
        for id in ids {
            if self.outstanding.remove(id) {
                Self::unmark(&mut state, id, self.token);
            }
        }
    }

    fn unmark(state: &mut StoreState, id: &str, token: u64) {
        if state.pending.get(id) == Some(&token) {
            state.pending.remove(id);
        }
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if self.outstanding.is_empty() {
            return;
        }
        let store = self.store;
        let token = self.token;
        let mut state = store.lock();
        for id in self.outstanding.drain() {
            Self::unmark(&mut state, &id, token);
        }
        debug!(token, "Released abandoned claim");
    }
}

impl std::fmt::Debug for Claim<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Claim")
            .field("ids", &self.ids)
            .field("outstanding", &self.outstanding.len())
            .finish()
    }
}
