use crate::domain::error::Result;
use async_trait::async_trait;

/// Page routing and the session list live outside the engine.
/// The controller calls out through this port when a linked session appears.
#[async_trait]
pub trait SessionNavigator: Send + Sync {
    /// Invalidate and reload the session list.
    async fn refresh_sessions(&self) -> Result<()>;

    async fn navigate_to(&self, session_id: &str) -> Result<()>;
}

/// Logs navigation requests. Used by the CLI, which has no session list to refresh.
#[derive(Debug, Default)]
pub struct LoggingNavigator;

#[async_trait]
impl SessionNavigator for LoggingNavigator {
    async fn refresh_sessions(&self) -> Result<()> {
        tracing::info!("Session list refresh requested");
        Ok(())
    }

    async fn navigate_to(&self, session_id: &str) -> Result<()> {
        tracing::info!(session_id = %session_id, "Navigate to linked session");
        Ok(())
    }
}
