//! Tally Core Library
//!
//! Shared functionality for the Tally expense tracker:
//! - Transaction models and validation
//! - Recurrence calculator and the sweep engine that advances recurring chains
//! - Spending analytics snapshots
//! - SQLite store with connection pooling and migrations
//! - Service configuration

pub mod analytics;
pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod recurrence;
pub mod store;

/// Test utilities including an in-memory store with failure injection
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use analytics::{summarize, AnalyticsAggregator, AnalyticsSnapshot, DEFAULT_PALETTE};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{AnalyticsConfig, RecurrenceConfig, TallyConfig};
pub use db::Database;
pub use engine::{RecurrenceEngine, SweepReport};
pub use error::{Error, Result};
pub use models::{
    NewTransaction, Recurrence, Transaction, TransactionInput, TransactionKind, TransactionUpdate,
};
pub use recurrence::{next_due, Schedule};
pub use store::{ChainAdvance, TransactionStore};
