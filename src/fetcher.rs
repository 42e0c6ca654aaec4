//! Paginated list loading.
//!
//! Every list filter has its own cursor. Loads for one filter are serialized
//! and a request for a page that is already in flight is dropped, except for
//! `reload`, which queues behind it. Loads for different filters run
//! independently. A page is merged into the store only
//! after the whole response arrived, and the cursor moves only on success.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::gateway::{ArticleGateway, GatewayError};
use crate::lifecycle::LifecycleHandle;
use crate::store::{ArticleStore, ListFilter, MergeSummary};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Failed to load page {page} of {filter}: {source}")]
    RemoteFetchFailed {
        filter: ListFilter,
        page: u32,
        #[source]
        source: GatewayError,
    },
}

impl FetchError {
    pub fn gateway_error(&self) -> &GatewayError {
        match self {
            FetchError::RemoteFetchFailed { source, .. } => source,
        }
    }
}

/// What a load call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLoad {
    Loaded { page: u32, summary: MergeSummary },
    /// The same page of the same filter is already being loaded.
    AlreadyLoading,
    /// Everything the server reported has been loaded.
    NoMorePages,
    /// The session was torn down while the load was in flight.
    Discarded,
}

/// Cursor position of one filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    /// Last page merged; zero before the first load.
    pub page: u32,
    pub total_pages: u32,
    pub total_count: u64,
    /// Ids currently in the filter's window.
    pub loaded: usize,
}

impl Cursor {
    pub fn is_exhausted(&self) -> bool {
        self.page > 0 && (self.page >= self.total_pages || self.loaded as u64 >= self.total_count)
    }
}

#[derive(Default)]
struct FilterSlot {
    state: Mutex<SlotState>,
    serial: tokio::sync::Mutex<()>,
}

#[derive(Default)]
struct SlotState {
    cursor: Cursor,
    in_flight: HashSet<u32>,
}

pub struct PaginatedFetcher<G> {
    gateway: Arc<G>,
    store: ArticleStore,
    slots: Mutex<HashMap<ListFilter, Arc<FilterSlot>>>,
    lifecycle: LifecycleHandle,
}

impl<G: ArticleGateway> PaginatedFetcher<G> {
    pub fn new(gateway: Arc<G>, store: ArticleStore, lifecycle: LifecycleHandle) -> Self {
        Self {
            gateway,
            store,
            slots: Mutex::new(HashMap::new()),
            lifecycle,
        }
    }

    pub fn store(&self) -> &ArticleStore {
        &self.store
    }

    fn slot(&self, filter: ListFilter) -> Arc<FilterSlot> {
        self.slots.lock().entry(filter).or_default().clone()
    }

    /// Loads one page of `filter` and merges it into the store.
    pub async fn load_page(&self, filter: ListFilter, page: u32) -> Result<PageLoad, FetchError> {
        let slot = self.slot(filter);
        if !slot.state.lock().in_flight.insert(page) {
            tracing::debug!(filter = %filter, page, "Page already loading, request dropped");
            return Ok(PageLoad::AlreadyLoading);
        }
        let _in_flight = scopeguard::guard(Arc::clone(&slot), move |slot| {
            slot.state.lock().in_flight.remove(&page);
        });

        let _serial = slot.serial.lock().await;
        self.fetch_and_merge(&slot, filter, page).await
    }

    /// Reloads page 1 with a request issued after every load already queued
    /// for `filter` has finished. Never answers `AlreadyLoading`.
    pub async fn reload(&self, filter: ListFilter) -> Result<PageLoad, FetchError> {
        let slot = self.slot(filter);
        let marked = slot.state.lock().in_flight.insert(1);
        let _in_flight = scopeguard::guard(Arc::clone(&slot), move |slot| {
            if marked {
                slot.state.lock().in_flight.remove(&1);
            }
        });

        let _serial = slot.serial.lock().await;
        self.fetch_and_merge(&slot, filter, 1).await
    }

    async fn fetch_and_merge(
        &self,
        slot: &FilterSlot,
        filter: ListFilter,
        page: u32,
    ) -> Result<PageLoad, FetchError> {
        if self.lifecycle.is_closed() {
            return Ok(PageLoad::Discarded);
        }

        let response = tokio::select! {
            response = self.gateway.list(filter, page) => response,
            _ = self.lifecycle.closed() => {
                tracing::debug!(filter = %filter, page, "Session closed, load discarded");
                return Ok(PageLoad::Discarded);
            }
        };

        let fetched = response.map_err(|source| {
            tracing::warn!(filter = %filter, page, error = %source, "Page load failed");
            FetchError::RemoteFetchFailed {
                filter,
                page,
                source,
            }
        })?;

        if self.lifecycle.is_closed() {
            return Ok(PageLoad::Discarded);
        }

        let summary = self.store.merge(filter, &fetched.items, page);
        let cursor = {
            let mut state = slot.state.lock();
            state.cursor = Cursor {
                page,
                total_pages: fetched.total_pages,
                total_count: fetched.total_count,
                loaded: self.store.window_len(&filter),
            };
            state.cursor
        };

        tracing::info!(
            filter = %filter,
            page,
            loaded = cursor.loaded,
            total = cursor.total_count,
            "Page loaded"
        );
        Ok(PageLoad::Loaded { page, summary })
    }

    /// Loads the page after the cursor, or reports that none is left.
    pub async fn load_more(&self, filter: ListFilter) -> Result<PageLoad, FetchError> {
        let cursor = self.cursor(&filter).unwrap_or_default();
        if cursor.is_exhausted() {
            return Ok(PageLoad::NoMorePages);
        }
        self.load_page(filter, cursor.page + 1).await
    }

    /// Reloads page 1, replacing the filter's window. The cursor only moves
    /// back once the page arrived.
    pub async fn reset(&self, filter: ListFilter) -> Result<PageLoad, FetchError> {
        self.load_page(filter, 1).await
    }

    pub fn cursor(&self, filter: &ListFilter) -> Option<Cursor> {
        self.slots
            .lock()
            .get(filter)
            .map(|slot| slot.state.lock().cursor)
    }

    /// Server-reported size of the list, e.g. for pending-count badges.
    pub fn total_count(&self, filter: &ListFilter) -> Option<u64> {
        self.cursor(filter)
            .filter(|cursor| cursor.page > 0)
            .map(|cursor| cursor.total_count)
    }

    /// Filters that have loaded at least one page.
    pub fn tracked_filters(&self) -> Vec<ListFilter> {
        self.slots
            .lock()
            .iter()
            .filter(|(_, slot)| slot.state.lock().cursor.page > 0)
            .map(|(filter, _)| *filter)
            .collect()
    }
}
