use crate::domain::query::Query;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifecycle of a backend request. Only ever moves forward; see [`RequestStatus::can_follow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    New,
    Intent,
    #[serde(rename = "SQL")]
    Sql,
    Retry,
    DataFetch,
    Finalizing,
    Done,
    Cancelled,
    Error,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestStatus::Done | RequestStatus::Cancelled | RequestStatus::Error
        )
    }

    // SQL and Retry share a rank so the backend may bounce between them.
    fn rank(self) -> u8 {
        match self {
            RequestStatus::New => 0,
            RequestStatus::Intent => 1,
            RequestStatus::Sql | RequestStatus::Retry => 2,
            RequestStatus::DataFetch => 3,
            RequestStatus::Finalizing => 4,
            RequestStatus::Done | RequestStatus::Cancelled | RequestStatus::Error => 5,
        }
    }

    /// Whether `self` is a legal observation after `previous`.
    /// Repeating an unchanged state is allowed; nothing follows a terminal state.
    pub fn can_follow(self, previous: RequestStatus) -> bool {
        if previous.is_terminal() {
            return false;
        }
        if matches!(self, RequestStatus::Error | RequestStatus::Cancelled) {
            return true;
        }
        self.rank() >= previous.rank()
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RequestStatus::New => "New",
            RequestStatus::Intent => "Intent",
            RequestStatus::Sql => "SQL",
            RequestStatus::Retry => "Retry",
            RequestStatus::DataFetch => "DataFetch",
            RequestStatus::Finalizing => "Finalizing",
            RequestStatus::Done => "Done",
            RequestStatus::Cancelled => "Cancelled",
            RequestStatus::Error => "Error",
        };
        f.write_str(label)
    }
}

/// `request_type` sent with a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    InteractiveQuery,
    LinkedSession,
    DataAnalysis,
}

/// Selection-derived context attached to a request.
/// `cols` and `rows` are never both populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Refs {
    /// `[canonical_column_id, ...loaded values of that column]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cols: Option<Vec<Value>>,
    /// `[header of column aliases, ...selected row values]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Vec<Value>>>,
}

impl Refs {
    pub fn is_empty(&self) -> bool {
        self.cols.as_ref().map_or(true, |c| c.is_empty())
            && self.rows.as_ref().map_or(true, |r| r.is_empty())
    }

    /// Column id an exchange targeted, read from `cols[0]`.
    pub fn primary_column_id(&self) -> Option<&str> {
        self.cols.as_ref()?.first()?.as_str()
    }
}

/// Opaque handle returned by a submission; keys every status poll.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestHandle {
    pub session_id: String,
    pub sequence_number: u64,
}

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.session_id, self.sequence_number)
    }
}

/// Body of `POST /session/{id}/request`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRequest {
    pub request: String,
    pub request_type: ActionType,
    pub refs: Refs,
    pub model: String,
    pub flow: String,
    pub db: String,
    #[serde(skip)]
    pub query_id: Option<String>,
}

/// A request row as seen by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub request_id: String,
    pub sequence_number: u64,
    #[serde(default)]
    pub request_text: String,
    pub status: RequestStatus,
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub response_text: Option<String>,
    #[serde(default)]
    pub csv: Option<String>,
    #[serde(default)]
    pub chart_url: Option<String>,
    #[serde(default)]
    pub refs: Refs,
    #[serde(default)]
    pub query: Option<Query>,
    #[serde(default)]
    pub linked_session_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub rating: Option<i32>,
    #[serde(default)]
    pub review: Option<String>,
}

impl Request {
    /// Server-supplied failure text, falling back to the response text.
    pub fn error_text(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.response_text.clone())
            .unwrap_or_else(|| "The request failed.".to_string())
    }
}

/// Body of `PATCH /request/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestMutation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RequestStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<String>,
}

impl RequestMutation {
    pub fn cancel() -> Self {
        Self {
            status: Some(RequestStatus::Cancelled),
            ..Self::default()
        }
    }
}
