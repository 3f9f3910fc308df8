//! Listing state kept by the façade between page calls.
//!
//! The provider call itself is stateless; this is where the items shown so
//! far, the continuation cursor and the last failed request live.

use bridge_traits::storage::{DriveItem, ListPage, ListQuery, PageCursor};
use std::collections::HashSet;

/// Which page a listing call asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    First,
    Next(PageCursor),
}

impl PageRequest {
    pub fn cursor(&self) -> Option<PageCursor> {
        match self {
            PageRequest::First => None,
            PageRequest::Next(cursor) => Some(cursor.clone()),
        }
    }

    pub fn is_continuation(&self) -> bool {
        matches!(self, PageRequest::Next(_))
    }
}

#[derive(Debug, Default)]
pub(crate) struct ListingState {
    pub query: ListQuery,
    pub items: Vec<DriveItem>,
    pub cursor: Option<PageCursor>,
    /// A first page has been loaded for the current query
    pub loaded: bool,
    /// Request to reissue on `retry`
    pub failed: Option<PageRequest>,
    /// Bumped whenever the listing is reset; late pages for an older
    /// generation are dropped
    pub generation: u64,
}

impl ListingState {
    pub fn new(query: ListQuery) -> Self {
        Self {
            query,
            ..Self::default()
        }
    }

    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }

    /// Request continuing the listing, `None` once exhausted
    pub fn next_request(&self) -> Option<PageRequest> {
        if !self.loaded {
            return Some(PageRequest::First);
        }
        self.cursor.clone().map(PageRequest::Next)
    }

    /// Fold a page into the listing and return the items it added.
    ///
    /// A first page replaces everything; a continuation appends items whose
    /// ids are not listed yet.
    pub fn apply(&mut self, request: &PageRequest, page: &ListPage) -> Vec<DriveItem> {
        if !request.is_continuation() {
            self.items.clear();
        }

        let mut seen: HashSet<String> = self.items.iter().map(|item| item.id.clone()).collect();
        let added: Vec<DriveItem> = page
            .items
            .iter()
            .filter(|item| seen.insert(item.id.clone()))
            .cloned()
            .collect();

        self.items.extend(added.iter().cloned());
        self.cursor = page.next_cursor.clone();
        self.loaded = true;
        self.failed = None;
        added
    }

    /// Drop every listed item, optionally switching the query
    pub fn reset(&mut self, query: Option<ListQuery>) {
        if let Some(query) = query {
            self.query = query;
        }
        self.items.clear();
        self.cursor = None;
        self.loaded = false;
        self.failed = None;
        self.generation += 1;
    }
}
