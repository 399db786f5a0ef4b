pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;

#[cfg(test)]
pub(crate) mod test_support;

use crate::application::{SessionController, SubmitOutcome};
use crate::domain::error::{AppError, Result};
use crate::domain::section::Section;
use crate::domain::session::Session;
use crate::infrastructure::backend::http::HttpQueryBackend;
use crate::infrastructure::config::ConfigService;
use crate::infrastructure::security::{KeyringTokenProvider, StaticTokenProvider, TokenProvider};
use crate::interfaces::LoggingNavigator;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const KEYRING_SERVICE: &str = "querychat";

/// Installs the fmt subscriber. `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// What the CLI prints once the submission settles.
#[derive(Debug, Serialize)]
struct CliReport {
    session_id: String,
    finished_at: String,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    section: Option<Section>,
    #[serde(skip_serializing_if = "Option::is_none")]
    linked_session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<AppError>,
}

impl CliReport {
    fn new(session_id: String, outcome: SubmitOutcome) -> Self {
        let mut report = Self {
            session_id,
            finished_at: chrono::Utc::now().to_rfc3339(),
            outcome: "skipped",
            section: None,
            linked_session_id: None,
            error: None,
        };
        match outcome {
            SubmitOutcome::Skipped => {}
            SubmitOutcome::Completed(section) => {
                report.outcome = "completed";
                report.section = Some(section);
            }
            SubmitOutcome::Cancelled(section) => {
                report.outcome = "cancelled";
                report.section = Some(section);
            }
            SubmitOutcome::Navigated { session_id } => {
                report.outcome = "navigated";
                report.linked_session_id = Some(session_id);
            }
            SubmitOutcome::Failed { error, section } => {
                report.outcome = "failed";
                report.section = section;
                report.error = Some(error);
            }
        }
        report
    }
}

/// Submit one prompt to a chat session and print the settled section as JSON
#[derive(Debug, Parser)]
#[command(name = "querychat")]
#[command(version)]
struct CliArgs {
    /// TOML config file, layered under `QUERYCHAT_*` environment variables
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Session to submit into
    session_id: String,

    /// Prompt text; remaining words are joined with spaces
    #[arg(required = true, num_args = 1..)]
    prompt: Vec<String>,
}

impl CliArgs {
    fn prompt_text(&self) -> String {
        self.prompt.join(" ")
    }
}

/// `QUERYCHAT_TOKEN` wins; `QUERYCHAT_KEYRING_ACCOUNT` reads the token from the OS keyring.
fn token_provider() -> Arc<dyn TokenProvider> {
    if let Ok(token) = std::env::var("QUERYCHAT_TOKEN") {
        return Arc::new(StaticTokenProvider::new(Some(token)));
    }
    match std::env::var("QUERYCHAT_KEYRING_ACCOUNT") {
        Ok(account) => Arc::new(KeyringTokenProvider::new(KEYRING_SERVICE, &account)),
        Err(_) => Arc::new(StaticTokenProvider::new(None)),
    }
}

async fn run_cli(args: CliArgs) -> Result<CliReport> {
    let config = ConfigService::load(args.config.as_deref())?;
    let backend = Arc::new(HttpQueryBackend::new(&config, token_provider())?);
    info!(
        session_id = %args.session_id,
        api_base_url = %config.api_base_url,
        "Submitting prompt from CLI"
    );

    let controller = SessionController::new(
        config,
        backend,
        Arc::new(LoggingNavigator),
        Session::new(args.session_id.clone()),
    );
    controller.set_prompt(&args.prompt_text());
    let outcome = controller.submit_prompt().await;
    Ok(CliReport::new(args.session_id, outcome))
}

pub fn run() {
    init_tracing();

    let args = CliArgs::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "Failed to start async runtime");
            std::process::exit(1);
        }
    };

    let report = match runtime.block_on(run_cli(args)) {
        Ok(report) => report,
        Err(err) => {
            error!(error = %err, "querychat failed");
            std::process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(err) => {
            error!(error = %err, "Failed to serialize result");
            std::process::exit(1);
        }
    }
    if report.error.is_some() {
        std::process::exit(1);
    }
}
