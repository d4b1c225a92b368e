//! Test utilities: an in-memory [`TransactionStore`] with failure injection
//!
//! Used to exercise the recurrence engine's per-record error isolation and
//! the non-atomic default chain advance without a database.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{NaiveDate, Utc};

use crate::error::{Error, Result};
use crate::models::{NewTransaction, Transaction};
use crate::recurrence::Schedule;
use crate::store::{create_then_retire, ChainAdvance, TransactionStore};

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<Transaction>>,
    /// Originals whose chain advance fails before anything is written
    failing_writes: Mutex<HashSet<i64>>,
    /// Originals whose retire (`save`) fails after the successor is written
    failing_saves: Mutex<HashSet<i64>>,
    failing_queries: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: i64) -> Option<Transaction> {
        self.rows.lock().unwrap().iter().find(|t| t.id == id).cloned()
    }

    pub fn all(&self) -> Vec<Transaction> {
        self.rows.lock().unwrap().clone()
    }

    pub fn fail_writes_for(&self, id: i64) {
        self.failing_writes.lock().unwrap().insert(id);
    }

    pub fn fail_saves_for(&self, id: i64) {
        self.failing_saves.lock().unwrap().insert(id);
    }

    pub fn fail_queries(&self, fail: bool) {
        self.failing_queries.store(fail, Ordering::SeqCst);
    }

    pub fn clear_failures(&self) {
        self.failing_writes.lock().unwrap().clear();
        self.failing_saves.lock().unwrap().clear();
        self.failing_queries.store(false, Ordering::SeqCst);
    }

    fn check_queries(&self) -> Result<()> {
        if self.failing_queries.load(Ordering::SeqCst) {
            return Err(Error::InvalidData("injected query failure".to_string()));
        }
        Ok(())
    }
}

impl TransactionStore for MemoryStore {
    fn find_due_recurring(&self, today: NaiveDate) -> Result<Vec<Transaction>> {
        self.check_queries()?;
        let mut due: Vec<Transaction> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.is_due(today))
            .cloned()
            .collect();
        due.sort_by_key(|t| (t.schedule.next_due_at(), t.id));
        Ok(due)
    }

    fn create(&self, owner_id: &str, tx: &NewTransaction) -> Result<Transaction> {
        tx.validate()?;
        let mut rows = self.rows.lock().unwrap();
        let id = rows.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        let now = Utc::now();
        let created = Transaction {
            id,
            owner_id: owner_id.to_string(),
            title: tx.title.clone(),
            description: tx.description.clone(),
            amount: tx.amount,
            kind: tx.kind,
            category: tx.category.clone(),
            occurred_at: tx.occurred_at,
            schedule: tx.schedule,
            created_at: now,
            updated_at: now,
        };
        rows.push(created.clone());
        Ok(created)
    }

    fn save(&self, tx: &Transaction, expected: Schedule) -> Result<Transaction> {
        if self.failing_saves.lock().unwrap().contains(&tx.id) {
            return Err(Error::InvalidData(format!(
                "injected save failure for {}",
                tx.id
            )));
        }
        let mut rows = self.rows.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|t| t.id == tx.id)
            .ok_or_else(|| Error::NotFound(format!("transaction {}", tx.id)))?;
        if row.schedule != expected {
            return Err(Error::Conflict(format!(
                "transaction {} was changed since it was read",
                tx.id
            )));
        }
        *row = Transaction {
            owner_id: row.owner_id.clone(),
            updated_at: Utc::now(),
            ..tx.clone()
        };
        Ok(row.clone())
    }

    fn find_all_by_owner(&self, owner_id: &str) -> Result<Vec<Transaction>> {
        self.check_queries()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect())
    }

    fn advance_chain(
        &self,
        original: &Transaction,
        successor: &NewTransaction,
    ) -> Result<ChainAdvance> {
        if self.failing_writes.lock().unwrap().contains(&original.id) {
            return Err(Error::InvalidData(format!(
                "injected write failure for {}",
                original.id
            )));
        }
        create_then_retire(self, original, successor)
    }
}
