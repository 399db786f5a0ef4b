use super::{PageRequest, QueryBackend};
use crate::domain::config::EngineConfig;
use crate::domain::error::{AppError, Result};
use crate::domain::query::DataPage;
use crate::domain::request::{NewRequest, Request, RequestHandle, RequestMutation};
use crate::infrastructure::security::TokenProvider;
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

pub struct HttpQueryBackend {
    client: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn TokenProvider>,
}

impl fmt::Debug for HttpQueryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpQueryBackend")
            .field("base_url", &self.base_url.as_str())
            .field("tokens", &"<redacted>")
            .finish()
    }
}

impl HttpQueryBackend {
    pub fn new(config: &EngineConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let base_url = Url::parse(&config.api_base_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid api_base_url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::ConfigError(format!(
                "api_base_url cannot be used as a base: {}",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to initialize HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            tokens,
        })
    }

    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::ConfigError("api_base_url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url, body: Option<serde_json::Value>) -> Result<String> {
        let correlation_id = Uuid::new_v4().to_string();
        debug!(%method, url = %url, correlation_id = %correlation_id, "Calling query backend");

        let mut builder = self
            .client
            .request(method, url.clone())
            .header("X-Request-Id", &correlation_id);
        if let Some(token) = self.tokens.bearer_token().await? {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AppError::TransportError(format!("Request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::TransportError(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            warn!(status = %status, url = %url, correlation_id = %correlation_id, "Query backend returned an error status");
            return Err(map_status(status, &text));
        }
        Ok(text)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let text = self.send(method, url, body).await?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Maps a non-success HTTP status onto the error taxonomy.
pub(crate) fn map_status(status: StatusCode, body: &str) -> AppError {
    let detail = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body.trim())
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::AuthError(detail),
        StatusCode::PAYMENT_REQUIRED | StatusCode::TOO_MANY_REQUESTS => {
            AppError::QuotaExceeded(detail)
        }
        _ => AppError::TransportError(format!("API error ({})", detail)),
    }
}

#[async_trait]
impl QueryBackend for HttpQueryBackend {
    async fn submit_request(&self, session_id: &str, request: &NewRequest) -> Result<RequestHandle> {
        let url = match &request.query_id {
            Some(query_id) => self.endpoint(&["session", session_id, "query", query_id.as_str(), "request"])?,
            None => self.endpoint(&["session", session_id, "request"])?,
        };
        let body = serde_json::to_value(request)?;
        self.send_json(Method::POST, url, Some(body)).await
    }

    async fn get_request(&self, handle: &RequestHandle) -> Result<Request> {
        let sequence_number = handle.sequence_number.to_string();
        let url = self.endpoint(&["request", &handle.session_id, &sequence_number])?;
        self.send_json(Method::GET, url, None).await
    }

    async fn fetch_rows(&self, query_id: &str, page: &PageRequest) -> Result<DataPage> {
        let mut url = self.endpoint(&["data", query_id])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("limit", &page.limit.to_string())
                .append_pair("offset", &page.offset.to_string());
            if let Some(sort) = &page.sort {
                pairs
                    .append_pair("sort_by", &sort.field)
                    .append_pair("sort_order", sort.direction.as_str());
            }
        }
        self.send_json(Method::GET, url, None).await
    }

    async fn update_request(&self, request_id: &str, mutation: &RequestMutation) -> Result<()> {
        let url = self.endpoint(&["request", request_id])?;
        let body = serde_json::to_value(mutation)?;
        self.send(Method::PATCH, url, Some(body)).await.map(|_| ())
    }
}
