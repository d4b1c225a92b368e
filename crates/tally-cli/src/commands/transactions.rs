//! Transaction command implementations

use anyhow::{anyhow, Result};
use tally_core::db::Database;
use tally_core::models::{Recurrence, Transaction, TransactionInput, TransactionKind};
use tally_core::Clock;

use super::{parse_date, truncate};

/// Build an input from CLI arguments
pub fn build_input(
    title: String,
    amount: f64,
    kind: &str,
    category: Option<String>,
    date: Option<&str>,
    recurrence: &str,
    description: Option<String>,
) -> Result<TransactionInput> {
    let kind: TransactionKind = kind.parse().map_err(|e: String| anyhow!(e))?;
    let recurrence: Recurrence = recurrence.parse().map_err(|e: String| anyhow!(e))?;
    let occurred_at = date.map(parse_date).transpose()?;

    Ok(TransactionInput {
        title,
        description,
        amount,
        kind,
        category,
        occurred_at,
        recurrence,
    })
}

pub fn cmd_add<C: Clock>(
    db: &Database,
    clock: C,
    owner: &str,
    input: TransactionInput,
) -> Result<Transaction> {
    let new = input.into_new(clock.today())?;
    let tx = db.create_transaction(owner, &new)?;

    println!("✅ Recorded #{} {} ({} ${:.2})", tx.id, tx.title, tx.kind, tx.amount);
    if let Some(due) = tx.schedule.next_due_at() {
        println!("   Repeats {}; next on {}", tx.schedule.recurrence(), due);
    }

    Ok(tx)
}

pub fn cmd_list(db: &Database, owner: &str) -> Result<()> {
    let transactions = db.list_transactions(owner)?;

    if transactions.is_empty() {
        println!("No transactions found. Record one with:");
        println!("  tally add --owner {} --title Coffee --amount 4.50", owner);
        return Ok(());
    }

    println!();
    println!("📝 Transactions for {}", owner);
    println!("   ─────────────────────────────────────────────────────────────");

    for tx in transactions {
        let amount_str = match tx.kind {
            TransactionKind::Expense => format!("\x1b[31m-${:.2}\x1b[0m", tx.amount),
            TransactionKind::Income => format!("\x1b[32m+${:.2}\x1b[0m", tx.amount),
        };
        let repeats = match tx.schedule.next_due_at() {
            Some(due) => format!(" ({} → {})", tx.schedule.recurrence(), due),
            None => String::new(),
        };

        println!(
            "   #{:<5} {} │ {:>10} │ {:<12} │ {}{}",
            tx.id,
            tx.occurred_at,
            amount_str,
            truncate(&tx.category, 12),
            truncate(&tx.title, 30),
            repeats
        );
    }

    Ok(())
}

pub fn cmd_delete(db: &Database, owner: &str, id: i64) -> Result<()> {
    db.delete_transaction(owner, id)?;
    println!("🗑️  Deleted transaction #{}", id);
    Ok(())
}
