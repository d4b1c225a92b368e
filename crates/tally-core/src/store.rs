//! Transaction store contract used by the recurrence engine and the
//! analytics aggregator.
//!
//! [`crate::db::Database`] is the SQLite implementation.

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{NewTransaction, Transaction};
use crate::recurrence::Schedule;

/// Outcome of advancing one link of a recurrence chain
#[derive(Debug, Clone, PartialEq)]
pub enum ChainAdvance {
    /// Successor created and original retired
    Advanced {
        successor: Transaction,
        retired: Transaction,
    },
    /// The original was no longer due when the write happened
    /// (edited or advanced since it was read); nothing was written
    AlreadyAdvanced,
}

pub trait TransactionStore {
    /// Recurring transactions whose due date is on or before `today`,
    /// oldest due date first
    fn find_due_recurring(&self, today: NaiveDate) -> Result<Vec<Transaction>>;

    /// Insert a new transaction for `owner_id`
    fn create(&self, owner_id: &str, tx: &NewTransaction) -> Result<Transaction>;

    /// Persist every mutable field of an existing transaction, provided its
    /// stored schedule still equals `expected`; otherwise fail with
    /// [`crate::Error::Conflict`] and write nothing
    fn save(&self, tx: &Transaction, expected: Schedule) -> Result<Transaction>;

    /// All transactions belonging to `owner_id`
    fn find_all_by_owner(&self, owner_id: &str) -> Result<Vec<Transaction>>;

    /// Create `successor` and retire `original` as one unit of work.
    ///
    /// The default runs `create` then `save`. A failure between the two
    /// leaves `original` due, so the next sweep creates a second successor.
    /// Stores that support transactions should override this.
    fn advance_chain(
        &self,
        original: &Transaction,
        successor: &NewTransaction,
    ) -> Result<ChainAdvance> {
        create_then_retire(self, original, successor)
    }
}

/// Non-atomic chain advance: create the successor, then retire the original
pub fn create_then_retire<S: TransactionStore + ?Sized>(
    store: &S,
    original: &Transaction,
    successor: &NewTransaction,
) -> Result<ChainAdvance> {
    let successor = store.create(&original.owner_id, successor)?;
    let retired = store.save(&original.retired(), original.schedule)?;
    Ok(ChainAdvance::Advanced { successor, retired })
}

impl<S: TransactionStore + ?Sized> TransactionStore for &S {
    fn find_due_recurring(&self, today: NaiveDate) -> Result<Vec<Transaction>> {
        (**self).find_due_recurring(today)
    }

    fn create(&self, owner_id: &str, tx: &NewTransaction) -> Result<Transaction> {
        (**self).create(owner_id, tx)
    }

    fn save(&self, tx: &Transaction, expected: Schedule) -> Result<Transaction> {
        (**self).save(tx, expected)
    }

    fn find_all_by_owner(&self, owner_id: &str) -> Result<Vec<Transaction>> {
        (**self).find_all_by_owner(owner_id)
    }

    fn advance_chain(
        &self,
        original: &Transaction,
        successor: &NewTransaction,
    ) -> Result<ChainAdvance> {
        (**self).advance_chain(original, successor)
    }
}
