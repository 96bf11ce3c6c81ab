//! CLI command handlers. Each command is in its own file for clarity.

mod add;
mod config;
mod delete;
mod force_start;
mod pause;
mod resume;
mod run;
mod status;

pub use add::run_add;
pub use config::run_config;
pub use delete::run_delete;
pub use force_start::run_force_start;
pub use pause::run_pause;
pub use resume::run_resume;
pub use run::run_daemon;
pub use status::run_status;

use anyhow::{Context, Result};
use qbwatch_core::config::WatchConfig;
use qbwatch_core::qbt::{QbtClient, SessionToken};
use qbwatch_core::session::SessionManager;
use std::time::Duration;

/// Establish an authenticated session for a one-shot command.
pub(crate) async fn connect(cfg: &WatchConfig) -> Result<(QbtClient, SessionToken)> {
    let client = QbtClient::new(&cfg.server.base_url)?;
    let mut session = SessionManager::new(
        client.clone(),
        cfg.server.clone(),
        cfg.login_retry_limit,
        Duration::from_secs(cfg.login_retry_base_secs),
    );
    let token = session
        .ensure_valid()
        .await
        .with_context(|| format!("could not log in to {}", cfg.server.base_url))?;
    Ok((client, token))
}
