//! Tally CLI - Expense tracker with recurring transactions
//!
//! Usage:
//!   tally init                          Initialize database
//!   tally add --owner me --title Rent   Record a transaction
//!   tally sweep                         Advance due recurring transactions
//!   tally analytics --owner me          Show spending analytics
//!   tally serve --port 3000             Start web server

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tally_core::SystemClock;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config_path = cli.config.as_deref();
    tracing::debug!("Using database {}", cli.db.display());

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Serve {
            port,
            host,
            no_auth,
        } => commands::cmd_serve(&cli.db, config_path, &host, port, no_auth).await,
        Commands::Sweep { today } => {
            let db = commands::open_db(&cli.db)?;
            let today = today.as_deref().map(commands::parse_date).transpose()?;
            commands::cmd_sweep(&db, today).map(|_| ())
        }
        Commands::Analytics { owner, json } => {
            let db = commands::open_db(&cli.db)?;
            let config = commands::load_config(config_path)?;
            commands::cmd_analytics(&db, SystemClock, config.analytics.palette, &owner, json)
                .map(|_| ())
        }
        Commands::Add {
            owner,
            title,
            amount,
            kind,
            category,
            date,
            recurrence,
            description,
        } => {
            let db = commands::open_db(&cli.db)?;
            let input = commands::build_input(
                title,
                amount,
                &kind,
                category,
                date.as_deref(),
                &recurrence,
                description,
            )?;
            commands::cmd_add(&db, SystemClock, &owner, input).map(|_| ())
        }
        Commands::List { owner } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_list(&db, &owner)
        }
        Commands::Delete { owner, id } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_delete(&db, &owner, id)
        }
    }
}
