//! Recurrence engine
//!
//! A sweep finds every recurring transaction that has come due, creates the
//! next link of its chain dated at the due date, and retires the original.
//! Each due record is an independent unit of work: a failure is logged and
//! reported, the record stays due, and the next sweep retries it.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::models::{NewTransaction, Transaction};
use crate::store::{ChainAdvance, TransactionStore};

/// One successfully advanced chain link
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvancedLink {
    pub retired_id: i64,
    pub successor_id: i64,
    pub owner_id: String,
    /// The successor's occurrence date (the original's due date)
    pub occurred_at: NaiveDate,
    pub next_due_at: Option<NaiveDate>,
}

/// A due record that could not be advanced this sweep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepFailure {
    pub transaction_id: i64,
    pub error: String,
}

/// Summary of one sweep
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub today: Option<NaiveDate>,
    /// Number of records found due
    pub due: usize,
    pub advanced: Vec<AdvancedLink>,
    /// Records that were no longer due at write time
    pub skipped: usize,
    /// Records whose stored recurrence was unreadable, rewritten as one-off
    pub corrected: usize,
    pub failed: Vec<SweepFailure>,
}

impl SweepReport {
    pub fn is_noop(&self) -> bool {
        self.due == 0
    }
}

/// Runs recurrence sweeps against a store
pub struct RecurrenceEngine<S, C> {
    store: S,
    clock: C,
}

impl<S: TransactionStore, C: Clock> RecurrenceEngine<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    /// Run one sweep.
    ///
    /// Fails only when the due query fails; per-record failures are
    /// collected in [`SweepReport::failed`].
    pub fn sweep(&self) -> Result<SweepReport> {
        let today = self.clock.today();
        let due = self.store.find_due_recurring(today)?;

        let mut report = SweepReport {
            today: Some(today),
            due: due.len(),
            ..Default::default()
        };

        if due.is_empty() {
            debug!(%today, "No recurring transactions due");
            return Ok(report);
        }

        info!(%today, due = due.len(), "Running recurrence sweep");

        for tx in &due {
            // Selected as due but reads back one-off: the stored recurrence is
            // not a value we know, so persist the one-off reading
            if !tx.schedule.is_recurring() {
                match self.store.save(&tx.retired(), tx.schedule) {
                    Ok(_) => {
                        warn!(id = tx.id, "Unknown stored recurrence, corrected to one-off");
                        report.corrected += 1;
                    }
                    Err(e) => {
                        warn!(id = tx.id, error = %e, "Failed to correct stored recurrence");
                        report.failed.push(SweepFailure {
                            transaction_id: tx.id,
                            error: e.to_string(),
                        });
                    }
                }
                continue;
            }

            match self.advance(tx) {
                Ok(ChainAdvance::Advanced { successor, retired }) => {
                    debug!(
                        retired = retired.id,
                        successor = successor.id,
                        occurred_at = %successor.occurred_at,
                        "Advanced recurring transaction"
                    );
                    report.advanced.push(AdvancedLink {
                        retired_id: retired.id,
                        successor_id: successor.id,
                        owner_id: successor.owner_id.clone(),
                        occurred_at: successor.occurred_at,
                        next_due_at: successor.schedule.next_due_at(),
                    });
                }
                Ok(ChainAdvance::AlreadyAdvanced) => {
                    debug!(id = tx.id, "Recurring transaction no longer due, skipping");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(
                        id = tx.id,
                        owner = %tx.owner_id,
                        error = %e,
                        "Failed to advance recurring transaction, will retry next sweep"
                    );
                    report.failed.push(SweepFailure {
                        transaction_id: tx.id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            advanced = report.advanced.len(),
            skipped = report.skipped,
            corrected = report.corrected,
            failed = report.failed.len(),
            "Recurrence sweep complete"
        );

        Ok(report)
    }

    fn advance(&self, tx: &Transaction) -> Result<ChainAdvance> {
        let successor = NewTransaction::successor_of(tx).ok_or_else(|| {
            Error::InvalidData(format!("transaction {} is not recurring", tx.id))
        })?;
        self.store.advance_chain(tx, &successor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::models::{Recurrence, TransactionInput, TransactionKind};
    use crate::test_utils::MemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seed(store: &MemoryStore, title: &str, occurred: NaiveDate, recurrence: Recurrence) -> Transaction {
        let new = TransactionInput {
            title: title.to_string(),
            description: None,
            amount: 10.0,
            kind: TransactionKind::Expense,
            category: Some("Bills".to_string()),
            occurred_at: Some(occurred),
            recurrence,
        }
        .into_new(occurred)
        .unwrap();
        store.create("owner", &new).unwrap()
    }

    #[test]
    fn test_sweep_with_nothing_due_is_noop() {
        let store = MemoryStore::new();
        seed(&store, "Later", date(2024, 5, 1), Recurrence::Monthly);
        seed(&store, "Once", date(2024, 4, 1), Recurrence::None);

        let engine = RecurrenceEngine::new(&store, FixedClock(date(2024, 5, 15)));
        let report = engine.sweep().unwrap();
        assert!(report.is_noop());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_failure_is_isolated_and_retried() {
        let store = MemoryStore::new();
        let first = seed(&store, "Rent", date(2024, 4, 1), Recurrence::Monthly);
        let second = seed(&store, "Phone", date(2024, 4, 2), Recurrence::Monthly);
        store.fail_writes_for(first.id);

        let engine = RecurrenceEngine::new(&store, FixedClock(date(2024, 5, 10)));
        let report = engine.sweep().unwrap();

        assert_eq!(report.due, 2);
        assert_eq!(report.advanced.len(), 1);
        assert_eq!(report.advanced[0].retired_id, second.id);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].transaction_id, first.id);

        // Failed record is still due; the next sweep picks it up
        let still_due = store.get(first.id).unwrap();
        assert!(still_due.is_due(date(2024, 5, 10)));

        store.clear_failures();
        let retry = engine.sweep().unwrap();
        assert_eq!(retry.due, 1);
        assert_eq!(retry.advanced.len(), 1);
        assert_eq!(retry.advanced[0].retired_id, first.id);
        assert!(retry.failed.is_empty());
    }

    #[test]
    fn test_query_failure_fails_the_sweep() {
        let store = MemoryStore::new();
        seed(&store, "Rent", date(2024, 4, 1), Recurrence::Monthly);
        store.fail_queries(true);

        let engine = RecurrenceEngine::new(&store, FixedClock(date(2024, 5, 10)));
        assert!(engine.sweep().is_err());
    }

    #[test]
    fn test_repeated_sweeps_build_one_chain() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        seed(&store, "Rent", date(2024, 1, 31), Recurrence::Monthly);

        let engine = RecurrenceEngine::new(&store, FixedClock(date(2024, 4, 30)));
        for _ in 0..3 {
            assert_eq!(engine.sweep().unwrap().advanced.len(), 1);
        }
        assert!(engine.sweep().unwrap().is_noop());

        let all = store.all();
        let dates: Vec<NaiveDate> = all.iter().map(|t| t.occurred_at).collect();
        assert_eq!(
            dates,
            vec![date(2024, 1, 31), date(2024, 2, 29), date(2024, 3, 29), date(2024, 4, 29)]
        );
        assert_eq!(all.iter().filter(|t| t.schedule.is_recurring()).count(), 1);
        assert!(all.iter().all(|t| t.title == "Rent" && t.category == "Bills"));
    }

    #[test]
    fn test_stale_save_after_advance_conflicts() {
        let store = MemoryStore::new();
        let rent = seed(&store, "Rent", date(2024, 4, 1), Recurrence::Monthly);
        RecurrenceEngine::new(&store, FixedClock(date(2024, 5, 1)))
            .sweep()
            .unwrap();

        let mut edited = rent.clone();
        edited.amount = 99.0;
        assert!(matches!(
            store.save(&edited, rent.schedule),
            Err(Error::Conflict(_))
        ));
        assert!(!store.get(rent.id).unwrap().schedule.is_recurring());
        assert!(store.find_due_recurring(date(2024, 5, 1)).unwrap().is_empty());
    }

    #[test]
    fn test_retire_failure_leaves_duplicate_due_state() {
        // Non-atomic store: successor written, retire fails. The original is
        // still due and the next sweep writes a second successor.
        let store = MemoryStore::new();
        let rent = seed(&store, "Rent", date(2024, 4, 1), Recurrence::Monthly);
        store.fail_saves_for(rent.id);

        let engine = RecurrenceEngine::new(&store, FixedClock(date(2024, 5, 10)));
        let report = engine.sweep().unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(store.len(), 2);
        assert!(store.get(rent.id).unwrap().is_due(date(2024, 5, 10)));

        store.clear_failures();
        engine.sweep().unwrap();
        assert_eq!(store.len(), 3);
        assert!(!store.get(rent.id).unwrap().schedule.is_recurring());
    }
}
