pub mod keyring;

use crate::domain::error::Result;
use async_trait::async_trait;

pub use self::keyring::KeyringTokenProvider;

/// Supplies the bearer token attached to backend calls.
/// Issuing tokens (login, guest tokens) happens elsewhere.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn bearer_token(&self) -> Result<Option<String>>;
}

/// A fixed token, or anonymous access when `None`.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn bearer_token(&self) -> Result<Option<String>> {
        Ok(self.token.clone())
    }
}
