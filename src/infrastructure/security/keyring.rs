use super::TokenProvider;
use crate::domain::error::{AppError, Result};
use async_trait::async_trait;
use keyring::Entry;

/// Reads the bearer token from the OS keyring.
/// A missing entry means the user has no credential yet.
pub struct KeyringTokenProvider {
    service: String,
    account: String,
}

impl KeyringTokenProvider {
    pub fn new(service: &str, account: &str) -> Self {
        Self {
            service: service.to_string(),
            account: account.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, &self.account)
            .map_err(|e| AppError::SecurityError(format!("Failed to create entry: {}", e)))
    }

}

#[async_trait]
impl TokenProvider for KeyringTokenProvider {
    async fn bearer_token(&self) -> Result<Option<String>> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Err(AppError::AuthError(format!(
                "No credential stored for {}",
                self.account
            ))),
            Err(e) => Err(AppError::SecurityError(format!("Failed to read token: {}", e))),
        }
    }
}
