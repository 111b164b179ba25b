// Operator CLI (`koop`). Maintenance tasks that run against the configured
// backends directly, without going through HTTP.

pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "koop")]
#[command(about = "Koop CLI - Operator commands for the legal back office API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply pending database migrations")]
    Migrate,

    #[command(about = "Grant admin to an account, or preapprove the email as admin")]
    ProvisionAdmin {
        #[arg(help = "Email of the account to elevate")]
        email: String,
    },

    #[command(about = "Drop document records whose stored object no longer exists")]
    SyncDocuments {
        #[arg(long, help = "Report stale records without deleting them")]
        dry_run: bool,
    },

    #[command(about = "Delete expired preapprovals")]
    PurgePreapprovals,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => commands::migrate(output_format).await,
        Commands::ProvisionAdmin { email } => commands::provision_admin(&email, output_format).await,
        Commands::SyncDocuments { dry_run } => commands::sync_documents(dry_run, output_format).await,
        Commands::PurgePreapprovals => commands::purge_preapprovals(output_format).await,
    }
}
