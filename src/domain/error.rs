use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppError {
    /// Missing or expired credential. Surfaced as a login / guest prompt.
    AuthError(String),
    /// Guest trial limit reached. Surfaced as an access-request prompt.
    QuotaExceeded(String),
    /// Network failure (or non-success HTTP status) during submit, poll or fetch.
    TransportError(String),
    /// The backend reported `status = Error` for a request.
    ServerError(String),
    /// Sort/ref derivation found nothing resolvable.
    ParseAmbiguity(String),
    ValidationError(String),
    ConfigError(String),
    SecurityError(String),
    Internal(String),
}

impl AppError {
    pub fn is_login_required(&self) -> bool {
        matches!(self, AppError::AuthError(_))
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, AppError::QuotaExceeded(_))
    }

    /// The text shown in the error bubble that replaces a pending placeholder.
    pub fn user_message(&self) -> String {
        match self {
            AppError::AuthError(_) => "Please sign in to continue.".to_string(),
            AppError::QuotaExceeded(_) => {
                "You have reached the guest limit. Request access to keep going.".to_string()
            }
            AppError::ServerError(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::AuthError(msg) => write!(f, "Authentication error: {}", msg),
            AppError::QuotaExceeded(msg) => write!(f, "Quota exceeded: {}", msg),
            AppError::TransportError(msg) => write!(f, "Transport error: {}", msg),
            AppError::ServerError(msg) => write!(f, "Server error: {}", msg),
            AppError::ParseAmbiguity(msg) => write!(f, "Parse ambiguity: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Config error: {}", msg),
            AppError::SecurityError(msg) => write!(f, "Security error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::TransportError(format!("Invalid response body: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
