use crate::domain::error::{AppError, Result};
use crate::domain::query::{Column, DataPage, Query, Row};
use crate::domain::request::{NewRequest, Refs, Request, RequestHandle, RequestMutation, RequestStatus};
use crate::infrastructure::backend::{PageRequest, QueryBackend};
use crate::interfaces::SessionNavigator;
use actix_web::dev::ServerHandle;
use actix_web::http::StatusCode;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub(crate) fn request(seq: u64, status: RequestStatus) -> Request {
    Request {
        request_id: format!("req-{}", seq),
        sequence_number: seq,
        request_text: String::new(),
        status,
        sql: None,
        response_text: None,
        csv: None,
        chart_url: None,
        refs: Refs::default(),
        query: None,
        linked_session_id: None,
        error: None,
        rating: None,
        review: None,
    }
}

pub(crate) fn wallet_columns() -> Vec<Column> {
    vec![
        Column {
            id: "c_wallet".to_string(),
            column_name: "wallet".to_string(),
            column_type: Some("varchar".to_string()),
            column_alias: Some("Wallet".to_string()),
            column_description: None,
        },
        Column {
            id: "c_volume".to_string(),
            column_name: "volume".to_string(),
            column_type: Some("numeric".to_string()),
            column_alias: Some("Volume".to_string()),
            column_description: None,
        },
    ]
}

pub(crate) fn wallet_query(query_id: &str, sql: &str) -> Query {
    Query {
        query_id: query_id.to_string(),
        sql: sql.to_string(),
        columns: wallet_columns(),
        row_count: Some(10),
    }
}

/// Scripted in-memory backend. Status scripts are consumed one poll at a time;
/// the final entry repeats once the script runs out.
#[derive(Default)]
pub(crate) struct FakeBackend {
    statuses: Mutex<VecDeque<Result<Request>>>,
    submit_error: Mutex<Option<AppError>>,
    next_sequence: AtomicU64,
    total_rows: AtomicUsize,
    omit_total: AtomicBool,
    fetch_delay: Mutex<Option<Duration>>,
    pub submits: Mutex<Vec<(String, NewRequest)>>,
    pub polls: AtomicUsize,
    pub fetches: Mutex<Vec<(String, PageRequest)>>,
    pub updates: Mutex<Vec<(String, RequestMutation)>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_statuses(self, statuses: Vec<Result<Request>>) -> Self {
        *self.statuses.lock().unwrap() = statuses.into();
        self
    }

    pub fn with_rows(self, total: usize) -> Self {
        self.total_rows.store(total, Ordering::SeqCst);
        self
    }

    /// Pages come back without `total_rows`.
    pub fn without_total(self) -> Self {
        self.omit_total.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_fetch_delay(self, delay: Duration) -> Self {
        *self.fetch_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn fail_next_submit(&self, error: AppError) {
        *self.submit_error.lock().unwrap() = Some(error);
    }

    pub fn submit_count(&self) -> usize {
        self.submits.lock().unwrap().len()
    }
}

#[async_trait]
impl QueryBackend for FakeBackend {
    async fn submit_request(&self, session_id: &str, request: &NewRequest) -> Result<RequestHandle> {
        self.submits
            .lock()
            .unwrap()
            .push((session_id.to_string(), request.clone()));
        if let Some(error) = self.submit_error.lock().unwrap().take() {
            return Err(error);
        }
        Ok(RequestHandle {
            session_id: session_id.to_string(),
            sequence_number: self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1,
        })
    }

    async fn get_request(&self, _handle: &RequestHandle) -> Result<Request> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        if statuses.len() > 1 {
            return statuses
                .pop_front()
                .unwrap_or_else(|| Err(AppError::Internal("empty script".into())));
        }
        statuses
            .front()
            .cloned()
            .unwrap_or_else(|| Err(AppError::Internal("empty script".into())))
    }

    async fn fetch_rows(&self, query_id: &str, page: &PageRequest) -> Result<DataPage> {
        self.fetches
            .lock()
            .unwrap()
            .push((query_id.to_string(), page.clone()));
        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let total = self.total_rows.load(Ordering::SeqCst);
        let end = (page.offset + page.limit).min(total);
        let rows: Vec<Row> = (page.offset..end)
            .map(|n| {
                let value = json!({"query": query_id, "wallet": format!("w{}", n), "volume": n});
                match value {
                    serde_json::Value::Object(map) => map,
                    _ => Row::new(),
                }
            })
            .collect();
        Ok(DataPage {
            rows,
            total_rows: if self.omit_total.load(Ordering::SeqCst) {
                None
            } else {
                Some(total as u64)
            },
        })
    }

    async fn update_request(&self, request_id: &str, mutation: &RequestMutation) -> Result<()> {
        self.updates
            .lock()
            .unwrap()
            .push((request_id.to_string(), mutation.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingNavigator {
    pub events: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionNavigator for RecordingNavigator {
    async fn refresh_sessions(&self) -> Result<()> {
        self.events.lock().unwrap().push("refresh".to_string());
        Ok(())
    }

    async fn navigate_to(&self, session_id: &str) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("navigate:{}", session_id));
        Ok(())
    }
}

/// One call as the mock HTTP server received it.
#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub method: String,
    pub path: String,
    pub query: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RecordedCall {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

struct MockState {
    status: u16,
    body: String,
    calls: Mutex<Vec<RecordedCall>>,
}

/// Local actix-web server that answers every route with one canned response
/// and records what it was sent. Must be started inside an actix runtime.
pub(crate) struct MockHttpServer {
    pub base_url: String,
    state: Arc<MockState>,
    handle: ServerHandle,
}

impl MockHttpServer {
    pub fn start(status: u16, body: serde_json::Value) -> Self {
        let state = Arc::new(MockState {
            status,
            body: body.to_string(),
            calls: Mutex::new(Vec::new()),
        });
        let app_state = Arc::clone(&state);
        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(Arc::clone(&app_state)))
                .default_service(web::route().to(record_call))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        Self {
            base_url: format!("http://{}/", addr),
            state,
            handle,
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().unwrap().clone()
    }

    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}

async fn record_call(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<Arc<MockState>>,
) -> HttpResponse {
    let headers = req
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    state.calls.lock().unwrap().push(RecordedCall {
        method: req.method().to_string(),
        path: req.path().to_string(),
        query: req.query_string().to_string(),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    HttpResponse::build(StatusCode::from_u16(state.status).unwrap())
        .content_type("application/json")
        .body(state.body.clone())
}
