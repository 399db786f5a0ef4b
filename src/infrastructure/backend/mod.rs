pub mod http;

use crate::domain::error::Result;
use crate::domain::query::DataPage;
use crate::domain::request::{NewRequest, Request, RequestHandle, RequestMutation};
use crate::domain::sort::SortSpec;
use async_trait::async_trait;

pub use http::HttpQueryBackend;

/// Offset pagination parameters for `GET /data/{query_id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: usize,
    pub offset: usize,
    pub sort: Option<SortSpec>,
}

/// The remote AI/query backend, seen only through its request/poll/data contract.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn submit_request(&self, session_id: &str, request: &NewRequest) -> Result<RequestHandle>;
    async fn get_request(&self, handle: &RequestHandle) -> Result<Request>;
    async fn fetch_rows(&self, query_id: &str, page: &PageRequest) -> Result<DataPage>;
    async fn update_request(&self, request_id: &str, mutation: &RequestMutation) -> Result<()>;
}
