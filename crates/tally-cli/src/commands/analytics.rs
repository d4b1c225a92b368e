//! Analytics command

use anyhow::Result;
use tally_core::{db::Database, AnalyticsAggregator, AnalyticsSnapshot, Clock};

pub fn cmd_analytics<C: Clock>(
    db: &Database,
    clock: C,
    palette: Vec<String>,
    owner: &str,
    json: bool,
) -> Result<AnalyticsSnapshot> {
    let snapshot = AnalyticsAggregator::new(db, clock)
        .with_palette(palette)
        .snapshot(owner)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(snapshot);
    }

    println!();
    println!("📊 Analytics for {}", owner);
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Income:   \x1b[32m${:.2}\x1b[0m", snapshot.total_income);
    println!("   Expenses: \x1b[31m${:.2}\x1b[0m", snapshot.total_expense);

    if !snapshot.category_data.is_empty() {
        println!();
        println!("   By category");
        for slice in &snapshot.category_data {
            println!("     {:<20} ${:>10.2}", slice.name, slice.value);
        }
    }

    if !snapshot.monthly_data.is_empty() {
        println!();
        println!("   By month           income     expenses");
        for month in &snapshot.monthly_data {
            println!(
                "     {:<10} ${:>10.2}  ${:>10.2}",
                month.month, month.income, month.expenses
            );
        }
    }

    if !snapshot.weekly_expenses.is_empty() {
        println!();
        println!("   Last 7 days");
        for day in &snapshot.weekly_expenses {
            println!("     {:<10} ${:>10.2}", day.day, day.amount);
        }
    }

    Ok(snapshot)
}
