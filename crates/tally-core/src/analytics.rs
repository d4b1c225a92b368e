//! Spending analytics
//!
//! Reduces an owner's full transaction history into a read-only snapshot:
//! totals by kind, expense breakdown by category, a month-of-year series and
//! a trailing seven-day expense series by weekday.

use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::clock::Clock;
use crate::error::Result;
use crate::models::{Transaction, TransactionKind};
use crate::store::TransactionStore;

/// Colors assigned round-robin to expense categories
pub const DEFAULT_PALETTE: [&str; 6] = [
    "#0088FE", "#00C49F", "#FFBB28", "#FF8042", "#8884D8", "#82CA9D",
];

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const DAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Days before today still inside the weekly window; with today that makes
/// seven days, one per weekday label
const WEEKLY_WINDOW_DAYS: u64 = 6;

/// Expense total for one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySlice {
    pub name: String,
    pub value: f64,
    pub color: String,
}

/// Income and expense totals for one month-of-year, summed across years
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTotals {
    pub month: String,
    pub income: f64,
    pub expenses: f64,
}

/// Expense total for one weekday of the trailing window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyExpense {
    pub day: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub total_income: f64,
    pub total_expense: f64,
    pub category_data: Vec<CategorySlice>,
    pub monthly_data: Vec<MonthlyTotals>,
    pub weekly_expenses: Vec<DailyExpense>,
}

/// Reduce `transactions` into a snapshot as seen on `today`.
///
/// Categories are ordered by name before colors are assigned, so the same
/// data always gets the same colors. An empty palette falls back to
/// [`DEFAULT_PALETTE`].
pub fn summarize(transactions: &[Transaction], today: NaiveDate, palette: &[String]) -> AnalyticsSnapshot {
    let mut total_income = 0.0;
    let mut total_expense = 0.0;
    let mut by_category: BTreeMap<&str, f64> = BTreeMap::new();
    let mut by_month: [Option<(f64, f64)>; 12] = [None; 12];
    let mut by_weekday: [Option<f64>; 7] = [None; 7];

    let window_start = today
        .checked_sub_days(Days::new(WEEKLY_WINDOW_DAYS))
        .unwrap_or(NaiveDate::MIN);

    for tx in transactions {
        let month = by_month[tx.occurred_at.month0() as usize].get_or_insert((0.0, 0.0));
        match tx.kind {
            TransactionKind::Income => {
                total_income += tx.amount;
                month.0 += tx.amount;
            }
            TransactionKind::Expense => {
                total_expense += tx.amount;
                month.1 += tx.amount;
                *by_category.entry(tx.category.as_str()).or_insert(0.0) += tx.amount;

                if tx.occurred_at >= window_start && tx.occurred_at <= today {
                    let day = tx.occurred_at.weekday().num_days_from_sunday() as usize;
                    *by_weekday[day].get_or_insert(0.0) += tx.amount;
                }
            }
        }
    }

    let fallback: Vec<String>;
    let palette: &[String] = if palette.is_empty() {
        fallback = DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect();
        &fallback
    } else {
        palette
    };

    let category_data = by_category
        .into_iter()
        .enumerate()
        .map(|(i, (name, value))| CategorySlice {
            name: name.to_string(),
            value,
            color: palette[i % palette.len()].clone(),
        })
        .collect();

    let monthly_data = by_month
        .iter()
        .zip(MONTH_LABELS)
        .filter_map(|(totals, label)| {
            totals.map(|(income, expenses)| MonthlyTotals {
                month: label.to_string(),
                income,
                expenses,
            })
        })
        .collect();

    let weekly_expenses = by_weekday
        .iter()
        .zip(DAY_LABELS)
        .filter_map(|(amount, label)| {
            amount.map(|amount| DailyExpense {
                day: label.to_string(),
                amount,
            })
        })
        .collect();

    AnalyticsSnapshot {
        total_income,
        total_expense,
        category_data,
        monthly_data,
        weekly_expenses,
    }
}

/// Computes snapshots from a store
pub struct AnalyticsAggregator<S, C> {
    store: S,
    clock: C,
    palette: Vec<String>,
}

impl<S: TransactionStore, C: Clock> AnalyticsAggregator<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn with_palette(mut self, palette: Vec<String>) -> Self {
        self.palette = palette;
        self
    }

    /// Snapshot of everything `owner_id` has recorded.
    ///
    /// A store error fails the whole snapshot.
    pub fn snapshot(&self, owner_id: &str) -> Result<AnalyticsSnapshot> {
        let transactions = self.store.find_all_by_owner(owner_id)?;
        debug!(owner = %owner_id, transactions = transactions.len(), "Computing analytics");
        Ok(summarize(&transactions, self.clock.today(), &self.palette))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::clock::FixedClock;
    use crate::recurrence::Schedule;
    use crate::test_utils::MemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(kind: TransactionKind, amount: f64, category: &str, occurred_at: NaiveDate) -> Transaction {
        Transaction {
            id: 0,
            owner_id: "owner".to_string(),
            title: "t".to_string(),
            description: None,
            amount,
            kind,
            category: category.to_string(),
            occurred_at,
            schedule: Schedule::one_off(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn palette() -> Vec<String> {
        DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect()
    }

    // 2024-06-15 is a Saturday
    const TODAY: (i32, u32, u32) = (2024, 6, 15);

    fn today() -> NaiveDate {
        date(TODAY.0, TODAY.1, TODAY.2)
    }

    #[test]
    fn test_zero_state() {
        let snapshot = summarize(&[], today(), &palette());
        assert_eq!(snapshot, AnalyticsSnapshot::default());

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["totalIncome"], 0.0);
        assert_eq!(json["totalExpense"], 0.0);
        assert_eq!(json["categoryData"], serde_json::json!([]));
        assert_eq!(json["monthlyData"], serde_json::json!([]));
        assert_eq!(json["weeklyExpenses"], serde_json::json!([]));
    }

    #[test]
    fn test_totals_and_categories() {
        let d = date(2024, 3, 1);
        let data = vec![
            tx(TransactionKind::Expense, 50.0, "Other", d),
            tx(TransactionKind::Income, 200.0, "Salary", d),
            tx(TransactionKind::Expense, 30.0, "Food", d),
        ];
        let snapshot = summarize(&data, today(), &palette());

        assert_eq!(snapshot.total_expense, 80.0);
        assert_eq!(snapshot.total_income, 200.0);
        assert_eq!(
            snapshot.category_data,
            vec![
                CategorySlice {
                    name: "Food".to_string(),
                    value: 30.0,
                    color: "#0088FE".to_string(),
                },
                CategorySlice {
                    name: "Other".to_string(),
                    value: 50.0,
                    color: "#00C49F".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_income_categories_are_not_in_breakdown() {
        let data = vec![tx(TransactionKind::Income, 10.0, "Salary", today())];
        assert!(summarize(&data, today(), &palette()).category_data.is_empty());
    }

    #[test]
    fn test_colors_wrap_round_robin() {
        let names = ["a", "b", "c", "d", "e", "f", "g", "h"];
        let data: Vec<_> = names
            .iter()
            .map(|n| tx(TransactionKind::Expense, 1.0, n, today()))
            .collect();
        let snapshot = summarize(&data, today(), &palette());
        assert_eq!(snapshot.category_data.len(), 8);
        assert_eq!(snapshot.category_data[6].name, "g");
        assert_eq!(snapshot.category_data[6].color, DEFAULT_PALETTE[0]);
        assert_eq!(snapshot.category_data[7].color, DEFAULT_PALETTE[1]);
    }

    #[test]
    fn test_empty_palette_uses_default() {
        let data = vec![tx(TransactionKind::Expense, 1.0, "Food", today())];
        let snapshot = summarize(&data, today(), &[]);
        assert_eq!(snapshot.category_data[0].color, DEFAULT_PALETTE[0]);
    }

    #[test]
    fn test_monthly_collapses_years_and_orders_jan_to_dec() {
        let data = vec![
            tx(TransactionKind::Expense, 5.0, "Food", date(2024, 11, 3)),
            tx(TransactionKind::Expense, 10.0, "Food", date(2023, 1, 10)),
            tx(TransactionKind::Income, 100.0, "Salary", date(2024, 1, 25)),
            tx(TransactionKind::Expense, 7.0, "Food", date(2022, 1, 1)),
        ];
        let snapshot = summarize(&data, today(), &palette());
        assert_eq!(
            snapshot.monthly_data,
            vec![
                MonthlyTotals {
                    month: "Jan".to_string(),
                    income: 100.0,
                    expenses: 17.0,
                },
                MonthlyTotals {
                    month: "Nov".to_string(),
                    income: 0.0,
                    expenses: 5.0,
                },
            ]
        );
    }

    #[test]
    fn test_weekly_window_boundaries() {
        let data = vec![
            // Exactly 8 days ago: excluded
            tx(TransactionKind::Expense, 1.0, "Food", date(2024, 6, 7)),
            // Exactly 7 days ago, last Saturday: excluded
            tx(TransactionKind::Expense, 2.0, "Food", date(2024, 6, 8)),
            // Six days ago (Sunday): included
            tx(TransactionKind::Expense, 64.0, "Food", date(2024, 6, 9)),
            // Today (Saturday): included
            tx(TransactionKind::Expense, 4.0, "Food", today()),
            // Monday
            tx(TransactionKind::Expense, 8.0, "Food", date(2024, 6, 10)),
            // Income never counts toward weekly expenses
            tx(TransactionKind::Income, 16.0, "Salary", date(2024, 6, 11)),
            // Future-dated: excluded
            tx(TransactionKind::Expense, 32.0, "Food", date(2024, 6, 16)),
        ];
        let snapshot = summarize(&data, today(), &palette());
        assert_eq!(
            snapshot.weekly_expenses,
            vec![
                DailyExpense {
                    day: "Sun".to_string(),
                    amount: 64.0,
                },
                DailyExpense {
                    day: "Mon".to_string(),
                    amount: 8.0,
                },
                DailyExpense {
                    day: "Sat".to_string(),
                    amount: 4.0,
                },
            ]
        );
    }

    #[test]
    fn test_aggregator_reads_only_owner_rows() {
        let store = MemoryStore::new();
        let mut mine = tx(TransactionKind::Expense, 12.0, "Food", today());
        mine.owner_id = "alice".to_string();
        let mut theirs = tx(TransactionKind::Expense, 99.0, "Food", today());
        theirs.owner_id = "bob".to_string();
        for t in [mine, theirs] {
            let new = crate::models::NewTransaction {
                title: t.title,
                description: None,
                amount: t.amount,
                kind: t.kind,
                category: t.category,
                occurred_at: t.occurred_at,
                schedule: t.schedule,
            };
            store.create(&t.owner_id, &new).unwrap();
        }

        let aggregator = AnalyticsAggregator::new(&store, FixedClock(today()));
        let snapshot = aggregator.snapshot("alice").unwrap();
        assert_eq!(snapshot.total_expense, 12.0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_aggregator_store_error_is_not_partial() {
        let store = MemoryStore::new();
        store.fail_queries(true);
        let aggregator = AnalyticsAggregator::new(&store, FixedClock(today()));
        assert!(aggregator.snapshot("alice").is_err());
    }
}
