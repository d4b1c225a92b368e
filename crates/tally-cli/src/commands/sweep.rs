//! Recurrence sweep command

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tally_core::{db::Database, FixedClock, RecurrenceEngine, SweepReport, SystemClock};

/// Run one sweep, as of `today` when given
pub fn cmd_sweep(db: &Database, today: Option<NaiveDate>) -> Result<SweepReport> {
    let report = match today {
        Some(date) => RecurrenceEngine::new(db, FixedClock(date)).sweep(),
        None => RecurrenceEngine::new(db, SystemClock).sweep(),
    }
    .context("Recurrence sweep failed")?;

    if report.corrected > 0 {
        tracing::warn!(
            "{} transaction(s) had an unknown recurrence and were made one-off",
            report.corrected
        );
    }

    if report.is_noop() {
        println!("Nothing due.");
        return Ok(report);
    }

    println!();
    println!("🔁 Recurrence sweep");
    println!("   ─────────────────────────────────────────────────────────────");
    for link in &report.advanced {
        println!(
            "   #{} → #{} │ {} │ next due {}",
            link.retired_id,
            link.successor_id,
            link.occurred_at,
            link.next_due_at
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
    for failure in &report.failed {
        println!("   \x1b[31m#{} failed: {}\x1b[0m", failure.transaction_id, failure.error);
    }
    println!();
    println!(
        "   {} advanced, {} skipped, {} corrected, {} failed",
        report.advanced.len(),
        report.skipped,
        report.corrected,
        report.failed.len()
    );

    Ok(report)
}
