//! Transaction operations

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use super::{parse_date, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{NewTransaction, Recurrence, Transaction, TransactionKind, TransactionUpdate};
use crate::recurrence::Schedule;
use crate::store::{ChainAdvance, TransactionStore};

const TRANSACTION_COLUMNS: &str = "id, owner_id, title, description, amount, kind, category, \
     occurred_at, recurrence, next_due_at, created_at, updated_at";

impl Database {
    /// Insert a transaction for `owner_id`
    pub fn create_transaction(&self, owner_id: &str, tx: &NewTransaction) -> Result<Transaction> {
        tx.validate()?;
        let conn = self.conn()?;
        let id = insert_transaction(&conn, owner_id, tx)?;
        drop(conn);

        self.get_transaction(id)?
            .ok_or_else(|| Error::NotFound(format!("transaction {}", id)))
    }

    /// Get a single transaction by ID
    pub fn get_transaction(&self, id: i64) -> Result<Option<Transaction>> {
        let conn = self.conn()?;
        let tx = conn
            .query_row(
                &format!("SELECT {} FROM transactions WHERE id = ?", TRANSACTION_COLUMNS),
                params![id],
                Self::row_to_transaction,
            )
            .optional()?;
        Ok(tx)
    }

    /// List an owner's transactions, newest first
    pub fn list_transactions(&self, owner_id: &str) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transactions WHERE owner_id = ? ORDER BY occurred_at DESC, id DESC",
            TRANSACTION_COLUMNS
        ))?;

        let transactions = stmt
            .query_map(params![owner_id], Self::row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Count all stored transactions
    pub fn count_transactions(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Apply a partial edit on behalf of `owner_id`
    pub fn update_transaction(
        &self,
        owner_id: &str,
        id: i64,
        update: TransactionUpdate,
    ) -> Result<Transaction> {
        let mut tx = self.owned_transaction(owner_id, id)?;
        let read = tx.schedule;
        tx.apply(update)?;
        self.save_transaction(&tx, read)
    }

    /// Delete a transaction on behalf of `owner_id`
    pub fn delete_transaction(&self, owner_id: &str, id: i64) -> Result<()> {
        self.owned_transaction(owner_id, id)?;
        let conn = self.conn()?;
        conn.execute("DELETE FROM transactions WHERE id = ?", params![id])?;
        Ok(())
    }

    /// Persist the mutable fields of `tx`; `owner_id` is never rewritten.
    ///
    /// The write only happens while the stored schedule still equals
    /// `expected`, the schedule `tx` was read with. If the sweep advanced the
    /// chain (or another edit landed) in between, nothing is written and
    /// [`Error::Conflict`] is returned, so a stale copy can never bring a
    /// retired link back as due.
    pub fn save_transaction(&self, tx: &Transaction, expected: Schedule) -> Result<Transaction> {
        let mut conn = self.conn()?;
        let sql_tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let stored = sql_tx
            .query_row(
                &format!("SELECT {} FROM transactions WHERE id = ?", TRANSACTION_COLUMNS),
                params![tx.id],
                Self::row_to_transaction,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("transaction {}", tx.id)))?;

        if stored.schedule != expected {
            debug!(
                id = tx.id,
                stored = %stored.schedule.recurrence(),
                expected = %expected.recurrence(),
                "Schedule changed since read, refusing stale save"
            );
            return Err(Error::Conflict(format!(
                "transaction {} was changed since it was read",
                tx.id
            )));
        }

        sql_tx.execute(
            r#"
            UPDATE transactions
            SET title = ?, description = ?, amount = ?, kind = ?, category = ?,
                occurred_at = ?, recurrence = ?, next_due_at = ?, updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
            params![
                tx.title,
                tx.description,
                tx.amount,
                tx.kind.as_str(),
                tx.category,
                tx.occurred_at.to_string(),
                tx.schedule.recurrence().as_str(),
                tx.schedule.next_due_at().map(|d| d.to_string()),
                tx.id,
            ],
        )?;
        sql_tx.commit()?;
        drop(conn);

        self.get_transaction(tx.id)?
            .ok_or_else(|| Error::NotFound(format!("transaction {}", tx.id)))
    }

    /// Recurring transactions due on or before `today`.
    ///
    /// Rows whose stored recurrence is not a known value are included; they
    /// read back as one-off and the sweep writes the correction.
    pub fn find_due_recurring(&self, today: NaiveDate) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM transactions
            WHERE recurrence != 'none'
              AND next_due_at IS NOT NULL
              AND next_due_at <= ?
            ORDER BY next_due_at, id
            "#,
            TRANSACTION_COLUMNS
        ))?;

        let due = stmt
            .query_map(params![today.to_string()], Self::row_to_transaction)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(due)
    }

    /// Create the successor and retire the original in one SQL transaction.
    ///
    /// The retire is guarded on the original's due date, so a record that was
    /// edited or advanced after it was read is left untouched and no
    /// successor is written.
    pub fn advance_chain(
        &self,
        original: &Transaction,
        successor: &NewTransaction,
    ) -> Result<ChainAdvance> {
        successor.validate()?;
        let Some(due) = original.schedule.next_due_at() else {
            return Ok(ChainAdvance::AlreadyAdvanced);
        };

        let mut conn = self.conn()?;
        let sql_tx = conn.transaction()?;

        let retired = sql_tx.execute(
            r#"
            UPDATE transactions
            SET recurrence = 'none', next_due_at = NULL, updated_at = CURRENT_TIMESTAMP
            WHERE id = ? AND recurrence != 'none' AND next_due_at = ?
            "#,
            params![original.id, due.to_string()],
        )?;

        if retired == 0 {
            debug!(id = original.id, due = %due, "Chain already advanced, rolling back");
            return Ok(ChainAdvance::AlreadyAdvanced);
        }

        let successor_id = insert_transaction(&sql_tx, &original.owner_id, successor)?;
        sql_tx.commit()?;
        drop(conn);

        let successor = self
            .get_transaction(successor_id)?
            .ok_or_else(|| Error::NotFound(format!("transaction {}", successor_id)))?;
        let retired = self
            .get_transaction(original.id)?
            .ok_or_else(|| Error::NotFound(format!("transaction {}", original.id)))?;

        Ok(ChainAdvance::Advanced { successor, retired })
    }

    /// Load a transaction and check it belongs to `owner_id`
    fn owned_transaction(&self, owner_id: &str, id: i64) -> Result<Transaction> {
        let tx = self
            .get_transaction(id)?
            .ok_or_else(|| Error::NotFound(format!("transaction {}", id)))?;
        if tx.owner_id != owner_id {
            return Err(Error::Forbidden(format!(
                "transaction {} belongs to another user",
                id
            )));
        }
        Ok(tx)
    }

    /// Helper to convert a row (selected with `TRANSACTION_COLUMNS`) into a Transaction
    pub(crate) fn row_to_transaction(row: &rusqlite::Row) -> rusqlite::Result<Transaction> {
        let kind_str: String = row.get(5)?;
        let occurred_at_str: String = row.get(7)?;
        let recurrence_str: String = row.get(8)?;
        let next_due_str: Option<String> = row.get(9)?;
        let created_at_str: String = row.get(10)?;
        let updated_at_str: String = row.get(11)?;

        let kind: TransactionKind = kind_str.parse().map_err(|e: String| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, e.into())
        })?;
        // Unknown recurrence values are treated as one-off
        let recurrence: Recurrence = recurrence_str.parse().unwrap_or_default();
        let next_due_at = next_due_str.map(|s| parse_date(9, &s)).transpose()?;

        Ok(Transaction {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            amount: row.get(4)?,
            kind,
            category: row.get(6)?,
            occurred_at: parse_date(7, &occurred_at_str)?,
            schedule: Schedule::from_parts(recurrence, next_due_at),
            created_at: parse_datetime(&created_at_str),
            updated_at: parse_datetime(&updated_at_str),
        })
    }
}

/// Insert on any connection, including an open SQL transaction
fn insert_transaction(conn: &Connection, owner_id: &str, tx: &NewTransaction) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO transactions (owner_id, title, description, amount, kind, category, occurred_at, recurrence, next_due_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            owner_id,
            tx.title,
            tx.description,
            tx.amount,
            tx.kind.as_str(),
            tx.category,
            tx.occurred_at.to_string(),
            tx.schedule.recurrence().as_str(),
            tx.schedule.next_due_at().map(|d| d.to_string()),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

impl TransactionStore for Database {
    fn find_due_recurring(&self, today: NaiveDate) -> Result<Vec<Transaction>> {
        Database::find_due_recurring(self, today)
    }

    fn create(&self, owner_id: &str, tx: &NewTransaction) -> Result<Transaction> {
        self.create_transaction(owner_id, tx)
    }

    fn save(&self, tx: &Transaction, expected: Schedule) -> Result<Transaction> {
        self.save_transaction(tx, expected)
    }

    fn find_all_by_owner(&self, owner_id: &str) -> Result<Vec<Transaction>> {
        self.list_transactions(owner_id)
    }

    fn advance_chain(
        &self,
        original: &Transaction,
        successor: &NewTransaction,
    ) -> Result<ChainAdvance> {
        Database::advance_chain(self, original, successor)
    }
}
