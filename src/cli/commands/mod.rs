use anyhow::Context;
use serde_json::json;

use crate::app::{AppState, Backends};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::DatabaseManager;
use crate::services::account_service::Provisioned;

/// Operator commands need durable stores; in-memory ones would vanish on exit.
async fn connect_state() -> anyhow::Result<AppState> {
    let config = config().clone();
    if config.database.url.trim().is_empty() {
        anyhow::bail!("DATABASE_URL is required for operator commands");
    }
    let backends = Backends::connect(&config).await?;
    AppState::build(config, backends)
}

pub async fn migrate(output_format: OutputFormat) -> anyhow::Result<()> {
    let manager = DatabaseManager::connect(&config().database)
        .await
        .context("connecting to PostgreSQL")?;
    manager.migrate().await?;
    manager.close().await;
    output_success(&output_format, "Migrations applied", None)
}

pub async fn provision_admin(email: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let state = connect_state().await?;
    let outcome = state.accounts.provision_admin(email).await?;
    let message = match &outcome {
        Provisioned::Granted { user } => format!("{} is now an admin", user.email),
        Provisioned::Preapproved { email } => {
            format!("No account for {} yet; preapproved as admin", email)
        }
    };
    output_success(&output_format, &message, Some(serde_json::to_value(&outcome)?))
}

pub async fn sync_documents(dry_run: bool, output_format: OutputFormat) -> anyhow::Result<()> {
    let state = connect_state().await?;
    let report = state.documents.sync(dry_run).await?;

    let message = if dry_run {
        format!(
            "Checked {} records, {} stale (dry run)",
            report.checked,
            report.stale_keys.len()
        )
    } else {
        format!("Checked {} records, removed {}", report.checked, report.removed)
    };
    if matches!(output_format, OutputFormat::Text) {
        for key in &report.stale_keys {
            println!("  stale: {}", key);
        }
    }
    output_success(&output_format, &message, Some(serde_json::to_value(&report)?))
}

pub async fn purge_preapprovals(output_format: OutputFormat) -> anyhow::Result<()> {
    let state = connect_state().await?;
    let removed = state.preapprovals.purge_expired().await?;
    output_success(
        &output_format,
        &format!("Purged {} expired preapprovals", removed),
        Some(json!({ "removed": removed })),
    )
}
