//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, load_config, parse_date)
//! - `serve` - Web server command
//! - `sweep` - One-off recurrence sweep
//! - `analytics` - Spending analytics
//! - `transactions` - Transaction commands (add, list, delete)

pub mod analytics;
pub mod core;
pub mod serve;
pub mod sweep;
pub mod transactions;

// Re-export command functions for main.rs
pub use analytics::*;
pub use self::core::*;
pub use serve::*;
pub use sweep::*;
pub use transactions::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
