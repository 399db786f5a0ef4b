//! Infinite Grid Fetcher
//!
//! Loads the active query's rows page by page (`offset = page * page_size`) in
//! the requested server-side sort. The [`FetchKey`] is the whole identity of the
//! result set: any change drops every loaded page and restarts from page 0.
//!
//! Each page load runs as its own task and carries the epoch it was started
//! under. A key change or an explicit abort bumps the epoch and aborts the task,
//! so a response for a superseded key is never applied.

use crate::domain::error::{AppError, Result};
use crate::domain::query::{Row, ROW_ID_FIELD};
use crate::domain::sort::SortSpec;
use crate::infrastructure::backend::{PageRequest, QueryBackend};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, warn};

/// Identity of a loaded result set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub query_id: String,
    pub sql: String,
    pub sort: Option<SortSpec>,
}

/// Viewport metrics reported by the grid view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPosition {
    pub scroll_top: f64,
    pub client_height: f64,
    pub scroll_height: f64,
}

impl ScrollPosition {
    pub fn near_bottom(&self, threshold: f64) -> bool {
        self.scroll_height - (self.scroll_top + self.client_height) <= threshold
    }
}

/// What happened to a page load once its task finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    Applied,
    /// The key changed (or the load was aborted) before the response arrived.
    Superseded,
}

/// A running page load. Dropping it does not cancel the fetch; call [`PageLoad::abort`].
pub struct PageLoad {
    pub page_index: usize,
    abort: AbortHandle,
    task: JoinHandle<Result<PageOutcome>>,
}

impl PageLoad {
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn abort(&self) {
        self.abort.abort();
    }

    pub async fn wait(self) -> Result<PageOutcome> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => Ok(PageOutcome::Superseded),
            Err(e) => Err(AppError::Internal(format!("Page load task failed: {}", e))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridSnapshot {
    pub key: Option<FetchKey>,
    pub rows: Vec<Row>,
    pub total_row_count: Option<u64>,
    /// Number of pages requested so far.
    pub size: usize,
    pub is_loading: bool,
    pub is_reaching_end: bool,
    pub is_empty: bool,
    pub error: Option<AppError>,
}

#[derive(Default)]
struct GridState {
    key: Option<FetchKey>,
    epoch: u64,
    pages: Vec<Vec<Row>>,
    size: usize,
    total_rows: Option<u64>,
    in_flight: Option<AbortHandle>,
    error: Option<AppError>,
}

impl GridState {
    fn loaded_rows(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }

    fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    fn is_empty(&self) -> bool {
        self.pages.first().map_or(false, Vec::is_empty)
    }

    fn is_reaching_end(&self, page_size: usize) -> bool {
        if self.is_empty() {
            return true;
        }
        let short_page = self.pages.last().map_or(false, |page| page.len() < page_size);
        let all_loaded = self
            .total_rows
            .map_or(false, |total| self.loaded_rows() as u64 >= total);
        short_page || all_loaded
    }

    fn cancel_in_flight(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        self.epoch += 1;
    }
}

pub struct InfiniteGridFetcher {
    backend: Arc<dyn QueryBackend>,
    page_size: usize,
    state: Arc<Mutex<GridState>>,
}

fn lock_state(state: &Mutex<GridState>) -> MutexGuard<'_, GridState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InfiniteGridFetcher {
    pub fn new(backend: Arc<dyn QueryBackend>, page_size: usize) -> Self {
        Self {
            backend,
            page_size: page_size.max(1),
            state: Arc::new(Mutex::new(GridState::default())),
        }
    }

    pub fn key(&self) -> Option<FetchKey> {
        lock_state(&self.state).key.clone()
    }

    /// Switches the grid to `key`. A different key cancels the in-flight load,
    /// drops every page and starts page 0. The same key is a no-op.
    pub fn set_key(&self, key: Option<FetchKey>) -> Option<PageLoad> {
        let mut state = lock_state(&self.state);
        if state.key == key {
            return None;
        }

        debug!(
            previous = ?state.key.as_ref().map(|k| &k.query_id),
            next = ?key.as_ref().map(|k| &k.query_id),
            "Grid key changed, resetting pages"
        );
        state.cancel_in_flight();
        state.key = key;
        state.pages.clear();
        state.size = 0;
        state.total_rows = None;
        state.error = None;

        if state.key.is_none() {
            return None;
        }
        Some(self.start_page(&mut state))
    }

    /// Requests the next page if the current key has more rows and nothing is in flight.
    pub fn load_next_page(&self) -> Option<PageLoad> {
        let mut state = lock_state(&self.state);
        if state.key.is_none()
            || state.is_loading()
            || state.pages.len() < state.size
            || (state.size > 0 && state.is_reaching_end(self.page_size))
        {
            return None;
        }
        Some(self.start_page(&mut state))
    }

    /// Re-requests the page that failed last, keeping everything loaded before it.
    pub fn retry(&self) -> Option<PageLoad> {
        let mut state = lock_state(&self.state);
        if state.key.is_none() || state.is_loading() || state.error.is_none() {
            return None;
        }
        state.error = None;
        state.size = state.pages.len();
        Some(self.start_page(&mut state))
    }

    /// Whether the view should ask for another page at this scroll position.
    pub fn should_load_more(&self, position: &ScrollPosition, threshold: f64) -> bool {
        let state = lock_state(&self.state);
        position.near_bottom(threshold)
            && state.key.is_some()
            && !state.is_loading()
            && state.error.is_none()
            && !(state.size > 0 && state.is_reaching_end(self.page_size))
    }

    pub fn on_scroll(&self, position: &ScrollPosition, threshold: f64) -> Option<PageLoad> {
        if !self.should_load_more(position, threshold) {
            return None;
        }
        self.load_next_page()
    }

    /// Cancels the in-flight load, e.g. when the view unmounts.
    pub fn abort(&self) {
        let mut state = lock_state(&self.state);
        if state.is_loading() {
            debug!("Aborting in-flight page load");
        }
        state.cancel_in_flight();
        // the aborted page was counted as requested
        state.size = state.pages.len();
    }

    pub fn rows(&self) -> Vec<Row> {
        lock_state(&self.state).pages.iter().flatten().cloned().collect()
    }

    pub fn loaded_row_count(&self) -> usize {
        lock_state(&self.state).loaded_rows()
    }

    pub fn snapshot(&self) -> GridSnapshot {
        let state = lock_state(&self.state);
        GridSnapshot {
            key: state.key.clone(),
            rows: state.pages.iter().flatten().cloned().collect(),
            total_row_count: state.total_rows,
            size: state.size,
            is_loading: state.is_loading(),
            is_reaching_end: state.size > 0
                && !state.is_loading()
                && state.pages.len() == state.size
                && state.is_reaching_end(self.page_size),
            is_empty: state.is_empty(),
            error: state.error.clone(),
        }
    }

    fn start_page(&self, state: &mut GridState) -> PageLoad {
        let page_index = state.pages.len();
        let epoch = state.epoch;
        state.size = page_index + 1;

        // start_page is only reached with a key set
        let key = state.key.clone().unwrap_or_else(|| FetchKey {
            query_id: String::new(),
            sql: String::new(),
            sort: None,
        });
        let request = PageRequest {
            limit: self.page_size,
            offset: page_index * self.page_size,
            sort: key.sort.clone(),
        };

        let backend = Arc::clone(&self.backend);
        let shared = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            debug!(query_id = %key.query_id, page = page_index, offset = request.offset, "Fetching page");
            let result = backend.fetch_rows(&key.query_id, &request).await;

            let mut state = lock_state(&shared);
            if state.epoch != epoch {
                debug!(query_id = %key.query_id, page = page_index, "Dropping response for superseded key");
                return Ok(PageOutcome::Superseded);
            }
            state.in_flight = None;

            match result {
                Ok(page) => {
                    let rows: Vec<Row> = page
                        .rows
                        .into_iter()
                        .enumerate()
                        .map(|(i, mut row)| {
                            row.insert(
                                ROW_ID_FIELD.to_string(),
                                Value::from((request.offset + i) as u64),
                            );
                            row
                        })
                        .collect();
                    if let Some(total) = page.total_rows {
                        state.total_rows = Some(total);
                    }
                    if page_index < state.pages.len() {
                        state.pages[page_index] = rows;
                    } else {
                        state.pages.push(rows);
                    }
                    Ok(PageOutcome::Applied)
                }
                Err(e) => {
                    warn!(error = %e, query_id = %key.query_id, page = page_index, "Page fetch failed");
                    state.error = Some(e.clone());
                    Err(e)
                }
            }
        });

        let abort = task.abort_handle();
        state.in_flight = Some(abort.clone());
        PageLoad {
            page_index,
            abort,
            task,
        }
    }
}
