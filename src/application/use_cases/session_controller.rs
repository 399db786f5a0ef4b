//! Session Controller
//!
//! Owns the interactive state of one chat session (selection, prompt, the
//! `pending` gate) and drives a submission end to end:
//! refs -> request -> pending section -> status polling -> finalize or navigate.
//! Every failure is converted into a terminal section here; nothing escapes as
//! an unhandled error.

use crate::application::use_cases::grid_fetcher::{
    FetchKey, InfiniteGridFetcher, PageLoad, ScrollPosition,
};
use crate::application::use_cases::request_protocol::RequestProtocolClient;
use crate::application::use_cases::section_model::{messages_from_requests, SectionModel};
use crate::application::use_cases::sort_deriver::{build_refs, derive_sort};
use crate::application::use_cases::status_poller::StatusPoller;
use crate::domain::config::EngineConfig;
use crate::domain::error::{AppError, Result};
use crate::domain::query::{Column, Query};
use crate::domain::request::{Request, RequestHandle, RequestMutation, RequestStatus};
use crate::domain::section::Section;
use crate::domain::selection::{Action, SelectionContext};
use crate::domain::session::Session;
use crate::domain::sort::SortSpec;
use crate::infrastructure::backend::QueryBackend;
use crate::interfaces::SessionNavigator;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// How a call to [`SessionController::submit_prompt`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// A request was already pending or the prompt was empty; nothing was sent.
    Skipped,
    Completed(Section),
    Cancelled(Section),
    /// The backend branched into a new session and navigation was triggered.
    Navigated { session_id: String },
    /// The trailing section now holds an error bubble.
    Failed {
        error: AppError,
        section: Option<Section>,
    },
}

struct SessionState {
    session: Session,
    selection: SelectionContext,
    prompt: String,
    pending: bool,
    active_request: Option<RequestHandle>,
    active_request_id: Option<String>,
    active_query: Option<Query>,
    /// User header-click sort. `None` means "derive from SQL".
    sort_override: Option<Option<SortSpec>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Clears `pending` however the submission ends.
struct PendingGuard {
    state: Arc<Mutex<SessionState>>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.pending = false;
        state.active_request = None;
        state.active_request_id = None;
    }
}

pub struct SessionController {
    config: EngineConfig,
    backend: Arc<dyn QueryBackend>,
    protocol: RequestProtocolClient,
    navigator: Arc<dyn SessionNavigator>,
    grid: Arc<InfiniteGridFetcher>,
    state: Arc<Mutex<SessionState>>,
    sections: Arc<Mutex<SectionModel>>,
}

impl SessionController {
    pub fn new(
        config: EngineConfig,
        backend: Arc<dyn QueryBackend>,
        navigator: Arc<dyn SessionNavigator>,
        session: Session,
    ) -> Self {
        let active_query = session.active_query();
        let sections = SectionModel::from_messages(
            &messages_from_requests(&session.requests),
            &session.metadata.columns,
            config.section_grouping,
        );
        let grid = Arc::new(InfiniteGridFetcher::new(
            Arc::clone(&backend),
            config.page_size,
        ));

        Self {
            protocol: RequestProtocolClient::new(Arc::clone(&backend), &config),
            config,
            backend,
            navigator,
            grid,
            state: Arc::new(Mutex::new(SessionState {
                session,
                selection: SelectionContext::Empty,
                prompt: String::new(),
                pending: false,
                active_request: None,
                active_request_id: None,
                active_query,
                sort_override: None,
            })),
            sections: Arc::new(Mutex::new(sections)),
        }
    }

    pub fn session_id(&self) -> String {
        lock(&self.state).session.id.clone()
    }

    pub fn session(&self) -> Session {
        lock(&self.state).session.clone()
    }

    pub fn grid(&self) -> &Arc<InfiniteGridFetcher> {
        &self.grid
    }

    pub fn sections(&self) -> Vec<Section> {
        lock(&self.sections).sections().to_vec()
    }

    pub fn active_query(&self) -> Option<Query> {
        lock(&self.state).active_query.clone()
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.state).pending
    }

    pub fn active_request_id(&self) -> Option<String> {
        lock(&self.state).active_request_id.clone()
    }

    // ---- selection ----

    pub fn selection(&self) -> SelectionContext {
        lock(&self.state).selection.clone()
    }

    /// Picking a column clears any row selection.
    pub fn select_column(&self, column_id: &str) {
        lock(&self.state).selection = SelectionContext::Column(column_id.to_string());
    }

    /// Selecting rows clears the active column. An empty set clears the selection.
    pub fn select_rows(&self, row_ids: BTreeSet<u64>) {
        lock(&self.state).selection = if row_ids.is_empty() {
            SelectionContext::Empty
        } else {
            SelectionContext::Rows(row_ids)
        };
    }

    pub fn toggle_row(&self, row_id: u64) {
        let mut state = lock(&self.state);
        let mut rows = state.selection.active_rows().cloned().unwrap_or_default();
        if !rows.remove(&row_id) {
            rows.insert(row_id);
        }
        state.selection = if rows.is_empty() {
            SelectionContext::Empty
        } else {
            SelectionContext::Rows(rows)
        };
    }

    pub fn clear_selection(&self) {
        lock(&self.state).selection = SelectionContext::Empty;
    }

    /// Re-derived from the current selection and loaded row count on every call.
    pub fn action(&self) -> Action {
        let selection = lock(&self.state).selection.clone();
        Action::classify(&selection, self.grid.loaded_row_count())
    }

    // ---- prompt ----

    pub fn set_prompt(&self, text: &str) {
        lock(&self.state).prompt = text.to_string();
    }

    pub fn prompt(&self) -> String {
        lock(&self.state).prompt.clone()
    }

    // ---- grid ----

    fn active_columns(&self) -> Vec<Column> {
        lock(&self.state)
            .active_query
            .as_ref()
            .map(|q| q.columns.clone())
            .unwrap_or_default()
    }

    /// Sort in effect: the user's header click if any, otherwise whatever the SQL orders by.
    pub fn effective_sort(&self) -> Option<SortSpec> {
        let state = lock(&self.state);
        match &state.sort_override {
            Some(explicit) => explicit.clone(),
            None => state
                .active_query
                .as_ref()
                .and_then(|q| derive_sort(&q.sql, &q.columns)),
        }
    }

    pub fn fetch_key(&self) -> Option<FetchKey> {
        let sort = self.effective_sort();
        let state = lock(&self.state);
        state.active_query.as_ref().map(|q| FetchKey {
            query_id: q.query_id.clone(),
            sql: q.sql.clone(),
            sort,
        })
    }

    /// Points the grid at the current fetch key. Returns the first page load when the key changed.
    /// Row ids are offsets into the old result set, so a key change drops any row selection.
    pub fn sync_grid(&self) -> Option<PageLoad> {
        let key = self.fetch_key();
        if self.grid.key() != key {
            let mut state = lock(&self.state);
            if state.selection.active_rows().is_some() {
                debug!("Grid key changed, clearing row selection");
                state.selection = SelectionContext::Empty;
            }
        }
        self.grid.set_key(key)
    }

    /// Viewport moved; loads the next page when within the configured threshold of the end.
    pub fn on_scroll(&self, position: &ScrollPosition) -> Option<PageLoad> {
        self.grid.on_scroll(position, self.config.scroll_threshold_px)
    }

    /// Header click on `column_id`: asc, desc, then back to unsorted.
    pub fn toggle_sort(&self, column_id: &str) -> Option<PageLoad> {
        let next = SortSpec::toggled(self.effective_sort().as_ref(), column_id);
        debug!(column_id = %column_id, sort = ?next, "Sort toggled");
        lock(&self.state).sort_override = Some(next);
        self.sync_grid()
    }

    // ---- submission ----

    pub async fn submit_prompt(&self) -> SubmitOutcome {
        let loaded_rows = self.grid.rows();
        let loaded_row_count = loaded_rows.len();
        let columns = self.active_columns();

        let (session_id, text, action, refs, column, query_id) = {
            let mut state = lock(&self.state);
            if state.pending {
                debug!(session_id = %state.session.id, "Submission ignored while a request is pending");
                return SubmitOutcome::Skipped;
            }
            let text = state.prompt.trim().to_string();
            if text.is_empty() {
                return SubmitOutcome::Skipped;
            }

            let action = Action::classify(&state.selection, loaded_row_count);
            let refs = build_refs(&state.selection, &columns, &loaded_rows);
            let column = state
                .selection
                .referenced_column()
                .and_then(|id| columns.iter().find(|c| c.id == id || c.matches_identifier(id)))
                .cloned();
            let query_id = state.active_query.as_ref().map(|q| q.query_id.clone());

            state.pending = true;
            state.prompt.clear();
            state.selection = SelectionContext::Empty;
            (state.session.id.clone(), text, action, refs, column, query_id)
        };
        let _pending = PendingGuard {
            state: Arc::clone(&self.state),
        };

        lock(&self.sections).begin_exchange(&text, column.as_ref());
        info!(session_id = %session_id, action = ?action, "Submitting prompt");

        let handle = match self
            .protocol
            .submit(
                &session_id,
                &text,
                action.request_type(),
                Some(refs),
                query_id.as_deref(),
            )
            .await
        {
            Ok(handle) => handle,
            Err(e) => return self.fail(e),
        };
        lock(&self.state).active_request = Some(handle.clone());

        let mut poller = StatusPoller::new(Arc::clone(&self.backend), self.config.poll_interval());
        let sections = Arc::clone(&self.sections);
        let state = Arc::clone(&self.state);
        let subscribed = poller.subscribe(move |request: &Request| {
            {
                let mut state = lock(&state);
                if !request.request_id.is_empty() {
                    state.active_request_id = Some(request.request_id.clone());
                }
                state.session.upsert_request(request.clone());
            }
            // Errors and linked-session hand-offs are finalized after polling resolves.
            let deferred = request.status == RequestStatus::Error
                || (request.status == RequestStatus::Done && request.linked_session_id.is_some());
            if !deferred && lock(&sections).apply_observation(request) {
                info!(request_id = %request.request_id, status = %request.status, "Section updated");
            }
        });
        if let Err(e) = subscribed {
            return self.fail(e);
        }

        match poller.poll(&handle).await {
            Ok(request) if request.status == RequestStatus::Done => {
                match request.linked_session_id.clone() {
                    Some(linked) => self.follow_linked_session(&request, linked).await,
                    None => self.complete(&request),
                }
            }
            Ok(request) => {
                info!(request = %handle, status = %request.status, "Request cancelled");
                match lock(&self.sections).last().cloned() {
                    Some(section) => SubmitOutcome::Cancelled(section),
                    None => SubmitOutcome::Skipped,
                }
            }
            Err(e) => self.fail(e),
        }
    }

    fn complete(&self, request: &Request) -> SubmitOutcome {
        if let Some(query) = &request.query {
            {
                let mut state = lock(&self.state);
                state
                    .session
                    .record_query(query, request.response_text.as_deref());
                state.active_query = Some(query.clone());
                state.sort_override = None;
            }
            // the first page load runs on its own; the grid tracks it
            let _ = self.sync_grid();
        }

        match lock(&self.sections).last().cloned() {
            Some(section) => SubmitOutcome::Completed(section),
            None => SubmitOutcome::Failed {
                error: AppError::Internal("No section to finalize".to_string()),
                section: None,
            },
        }
    }

    async fn follow_linked_session(&self, request: &Request, linked: String) -> SubmitOutcome {
        lock(&self.sections).mark_linked(request);
        info!(session_id = %linked, "Request created a linked session");

        if let Err(e) = self.navigator.refresh_sessions().await {
            warn!(error = %e, "Failed to refresh session list before navigating");
        }
        match self.navigator.navigate_to(&linked).await {
            Ok(()) => SubmitOutcome::Navigated { session_id: linked },
            Err(e) => {
                error!(error = %e, session_id = %linked, "Navigation to linked session failed");
                SubmitOutcome::Failed {
                    error: e,
                    section: lock(&self.sections).last().cloned(),
                }
            }
        }
    }

    fn fail(&self, error: AppError) -> SubmitOutcome {
        error!(error = %error, session_id = %self.session_id(), "Submission failed");
        let mut sections = lock(&self.sections);
        sections.fail_last(&error.user_message());
        SubmitOutcome::Failed {
            error,
            section: sections.last().cloned(),
        }
    }

    // ---- mutations ----

    /// Asks the backend to cancel the in-flight request. The poller observes the
    /// `Cancelled` status on its next tick. Returns false when nothing is cancellable yet.
    pub async fn cancel_active(&self) -> Result<bool> {
        let Some(request_id) = self.active_request_id() else {
            debug!("No active request to cancel");
            return Ok(false);
        };
        info!(request_id = %request_id, "Cancelling request");
        self.backend
            .update_request(&request_id, &RequestMutation::cancel())
            .await?;
        Ok(true)
    }

    pub async fn rate_request(
        &self,
        request_id: &str,
        rating: i32,
        review: Option<String>,
    ) -> Result<()> {
        if request_id.trim().is_empty() {
            return Err(AppError::ValidationError("Request id is required.".to_string()));
        }
        let mutation = RequestMutation {
            status: None,
            rating: Some(rating),
            review,
        };
        self.backend.update_request(request_id, &mutation).await?;

        let mut state = lock(&self.state);
        if let Some(stored) = state
            .session
            .requests
            .iter_mut()
            .find(|r| r.request_id == request_id)
        {
            stored.rating = mutation.rating;
            stored.review = mutation.review;
        }
        Ok(())
    }
}
