use crate::domain::section::SectionGrouping;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Engine configuration, loaded by `infrastructure::config::ConfigService`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL of the query backend
    #[validate(url)]
    pub api_base_url: String,

    /// Passed through in every submission body
    pub model: String,
    pub flow: String,
    pub db: String,

    /// Status poll cadence in milliseconds
    #[validate(range(min = 10))]
    pub poll_interval_ms: u64,

    /// Rows per grid page
    #[validate(range(min = 1, max = 10000))]
    pub page_size: usize,

    pub section_grouping: SectionGrouping,

    /// Distance from the bottom of loaded content that triggers the next page
    pub scroll_threshold_px: f64,

    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000/".to_string(),
            model: "default".to_string(),
            flow: "default".to_string(),
            db: "default".to_string(),
            poll_interval_ms: 1000,
            page_size: 100,
            section_grouping: SectionGrouping::ByColumn,
            scroll_threshold_px: 200.0,
            user_agent: concat!("querychat/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
