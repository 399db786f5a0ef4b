use crate::domain::query::{Column, Query};
use crate::domain::request::Request;
use serde::{Deserialize, Serialize};

/// Denormalized summary of the latest query a session produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub query_id: Option<String>,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub row_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub requests: Vec<Request>,
    #[serde(default)]
    pub metadata: SessionMetadata,
    /// Sessions are never deleted, only hidden.
    #[serde(default)]
    pub hidden: bool,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            requests: Vec::new(),
            metadata: SessionMetadata::default(),
            hidden: false,
        }
    }

    /// Rebuilds the active query from metadata, if the session has produced one.
    pub fn active_query(&self) -> Option<Query> {
        let query_id = self.metadata.query_id.clone()?;
        Some(Query {
            query_id,
            sql: self.metadata.sql.clone().unwrap_or_default(),
            columns: self.metadata.columns.clone(),
            row_count: self.metadata.row_count,
        })
    }

    pub fn record_query(&mut self, query: &Query, summary: Option<&str>) {
        self.metadata.query_id = Some(query.query_id.clone());
        self.metadata.sql = Some(query.sql.clone());
        self.metadata.columns = query.columns.clone();
        self.metadata.row_count = query.row_count;
        if let Some(summary) = summary {
            self.metadata.summary = Some(summary.to_string());
        }
    }

    /// Inserts or replaces a request by sequence number, keeping order.
    pub fn upsert_request(&mut self, request: Request) {
        match self
            .requests
            .binary_search_by_key(&request.sequence_number, |r| r.sequence_number)
        {
            Ok(index) => self.requests[index] = request,
            Err(index) => self.requests.insert(index, request),
        }
    }
}
