//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Tally - Track expenses, income and recurring bills
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Self-hosted expense tracker with recurring transactions", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "tally.db", global = true)]
    pub db: PathBuf,

    /// Config file (defaults to the data dir override, then built-in defaults)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server and the daily recurrence scheduler
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (local development only)
        #[arg(long)]
        no_auth: bool,
    },

    /// Run one recurrence sweep now
    Sweep {
        /// Treat this date as today (YYYY-MM-DD)
        #[arg(long)]
        today: Option<String>,
    },

    /// Show spending analytics for a user
    Analytics {
        /// Owner identity (e.g. the user's email)
        #[arg(long)]
        owner: String,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record a transaction
    Add {
        /// Owner identity
        #[arg(long)]
        owner: String,

        /// Short title
        #[arg(long)]
        title: String,

        /// Amount (non-negative)
        #[arg(long, allow_negative_numbers = true)]
        amount: f64,

        /// Kind: expense or income
        #[arg(long, default_value = "expense")]
        kind: String,

        /// Category (defaults to "Other")
        #[arg(long)]
        category: Option<String>,

        /// Date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<String>,

        /// Recurrence: none, daily, weekly, monthly, yearly
        #[arg(long, default_value = "none")]
        recurrence: String,

        /// Free-text description
        #[arg(long)]
        description: Option<String>,
    },

    /// List a user's transactions, newest first
    List {
        /// Owner identity
        #[arg(long)]
        owner: String,
    },

    /// Delete a transaction
    Delete {
        /// Owner identity
        #[arg(long)]
        owner: String,

        /// Transaction ID
        #[arg(long)]
        id: i64,
    },
}
