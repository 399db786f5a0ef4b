use crate::domain::config::EngineConfig;
use crate::domain::error::{AppError, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use std::path::Path;
use tracing::debug;
use validator::Validate;

const ENV_PREFIX: &str = "QUERYCHAT_";

pub struct ConfigService;

impl ConfigService {
    /// Defaults, then the optional TOML file, then `QUERYCHAT_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<EngineConfig> {
        if let Ok(env_file) = dotenvy::dotenv() {
            debug!(path = %env_file.display(), "Loaded .env file");
        }

        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    pub fn from_toml_str(toml: &str) -> Result<EngineConfig> {
        Self::extract(
            Figment::from(Serialized::defaults(EngineConfig::default())).merge(Toml::string(toml)),
        )
    }

    fn extract(figment: Figment) -> Result<EngineConfig> {
        let config: EngineConfig = figment
            .extract()
            .map_err(|e| AppError::ConfigError(format!("Failed to read config: {}", e)))?;

        config
            .validate()
            .map_err(|e| AppError::ConfigError(format!("Invalid config: {}", e)))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::section::SectionGrouping;

    #[test]
    fn test_defaults_are_valid() {
        let config = ConfigService::from_toml_str("").unwrap();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.section_grouping, SectionGrouping::ByColumn);
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = ConfigService::from_toml_str(
            r#"
            api_base_url = "https://api.example.com/v1/"
            page_size = 250
            section_grouping = "per_exchange"
            "#,
        )
        .unwrap();
        assert_eq!(config.api_base_url, "https://api.example.com/v1/");
        assert_eq!(config.page_size, 250);
        assert_eq!(config.section_grouping, SectionGrouping::PerExchange);
        assert_eq!(config.model, "default");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = ConfigService::from_toml_str("page_size = 0").unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));

        let err = ConfigService::from_toml_str(r#"api_base_url = "not a url""#).unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }
}
