use crate::domain::config::EngineConfig;
use crate::domain::error::{AppError, Result};
use crate::domain::request::{ActionType, NewRequest, Refs, RequestHandle};
use crate::infrastructure::backend::QueryBackend;
use std::sync::Arc;
use tracing::{error, info};

/// Creates backend requests on a session, optionally scoped to a prior query.
pub struct RequestProtocolClient {
    backend: Arc<dyn QueryBackend>,
    model: String,
    flow: String,
    db: String,
}

impl RequestProtocolClient {
    pub fn new(backend: Arc<dyn QueryBackend>, config: &EngineConfig) -> Self {
        Self {
            backend,
            model: config.model.clone(),
            flow: config.flow.clone(),
            db: config.db.clone(),
        }
    }

    /// Returns the `(session, sequence number)` handle the poller keys on.
    /// Any error here means polling must not start.
    pub async fn submit(
        &self,
        session_id: &str,
        text: &str,
        action_type: ActionType,
        refs: Option<Refs>,
        query_id: Option<&str>,
    ) -> Result<RequestHandle> {
        if text.trim().is_empty() {
            return Err(AppError::ValidationError("Prompt is required.".to_string()));
        }
        if session_id.trim().is_empty() {
            return Err(AppError::ValidationError("Session id is required.".to_string()));
        }

        let request = NewRequest {
            request: text.trim().to_string(),
            request_type: action_type,
            refs: refs.unwrap_or_default(),
            model: self.model.clone(),
            flow: self.flow.clone(),
            db: self.db.clone(),
            query_id: query_id.map(str::to_string),
        };

        let handle = self
            .backend
            .submit_request(session_id, &request)
            .await
            .map_err(|e| {
                error!(error = %e, session_id = %session_id, "Failed to submit request");
                e
            })?;

        info!(
            session_id = %handle.session_id,
            sequence_number = handle.sequence_number,
            request_type = ?action_type,
            scoped_query = query_id.unwrap_or("-"),
            "Request submitted"
        );
        Ok(handle)
    }
}
