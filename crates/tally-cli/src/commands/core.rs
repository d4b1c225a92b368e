//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_config` - Resolve the service configuration
//! - `parse_date` - Parse `YYYY-MM-DD` arguments
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tally_core::{db::Database, TallyConfig};

/// Open (and migrate) the database
pub fn open_db(db_path: &Path) -> Result<Database> {
    Database::new(&db_path.to_string_lossy()).context("Failed to open database")
}

/// Load configuration from `--config`, the data dir override, or built-in defaults
pub fn load_config(config_path: Option<&Path>) -> Result<TallyConfig> {
    match config_path {
        Some(path) => tracing::debug!("Loading config from {}", path.display()),
        None => tracing::debug!("Loading default config"),
    }
    TallyConfig::load(config_path).context("Failed to load configuration")
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}' (use YYYY-MM-DD)", s))
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    let db = open_db(db_path)?;
    let count = db.count_transactions()?;
    println!("   {} transaction(s) stored", count);

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Record a transaction: tally add --owner you@example.com --title Rent --amount 1200 --recurrence monthly");
    println!("  2. Start web API: tally serve");

    Ok(())
}
