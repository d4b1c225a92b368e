//! Domain models for Tally

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::recurrence::Schedule;

/// Category stored when a transaction is entered without one
pub const DEFAULT_CATEGORY: &str = "Other";

/// Direction of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Expense,
    Income,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            _ => Err(format!("Unknown transaction kind: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How often a transaction repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl std::str::FromStr for Recurrence {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" | "annual" => Ok(Self::Yearly),
            _ => Err(format!("Unknown recurrence: {}", s)),
        }
    }
}

impl std::fmt::Display for Recurrence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A stored transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: i64,
    /// Identity of the owning user, never reassigned
    pub owner_id: String,
    pub title: String,
    pub description: Option<String>,
    pub amount: f64,
    pub kind: TransactionKind,
    pub category: String,
    /// Date the transaction is effective
    pub occurred_at: NaiveDate,
    /// Serialized as flat `recurrence` / `next_due_at` fields
    #[serde(flatten)]
    pub schedule: Schedule,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.schedule.is_due(today)
    }

    /// Copy of this transaction with its recurrence ended
    pub fn retired(&self) -> Transaction {
        Transaction {
            schedule: Schedule::one_off(),
            ..self.clone()
        }
    }

    /// Apply a partial edit, keeping the schedule invariant.
    ///
    /// Changing the recurrence restarts the schedule from `occurred_at`;
    /// setting it to `none` clears the due date.
    pub fn apply(&mut self, update: TransactionUpdate) -> Result<()> {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = Some(description).filter(|d| !d.trim().is_empty());
        }
        if let Some(amount) = update.amount {
            self.amount = amount;
        }
        if let Some(kind) = update.kind {
            self.kind = kind;
        }
        if let Some(category) = update.category {
            self.category = normalize_category(Some(category));
        }
        if let Some(occurred_at) = update.occurred_at {
            self.occurred_at = occurred_at;
        }
        if let Some(recurrence) = update.recurrence {
            if recurrence != self.schedule.recurrence() {
                self.schedule = Schedule::starting(recurrence, self.occurred_at);
            }
        }

        validate_fields(&self.title, self.amount)
    }
}

/// A fully-specified transaction ready to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub title: String,
    pub description: Option<String>,
    pub amount: f64,
    pub kind: TransactionKind,
    pub category: String,
    pub occurred_at: NaiveDate,
    pub schedule: Schedule,
}

impl NewTransaction {
    pub fn validate(&self) -> Result<()> {
        validate_fields(&self.title, self.amount)?;
        if self.category.trim().is_empty() {
            return Err(Error::InvalidData("Category must not be empty".to_string()));
        }
        Ok(())
    }

    /// Next link of a recurrence chain.
    ///
    /// The successor copies the descriptive fields, is dated at the
    /// predecessor's due date, and carries the advanced schedule.
    /// Returns `None` when `tx` is not recurring.
    pub fn successor_of(tx: &Transaction) -> Option<NewTransaction> {
        let (occurred_at, schedule) = tx.schedule.advance()?;
        Some(NewTransaction {
            title: tx.title.clone(),
            description: tx.description.clone(),
            amount: tx.amount,
            kind: tx.kind,
            category: tx.category.clone(),
            occurred_at,
            schedule,
        })
    }
}

/// Transaction as entered by a user (API body or CLI arguments)
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub amount: f64,
    pub kind: TransactionKind,
    #[serde(default)]
    pub category: Option<String>,
    /// Defaults to today
    #[serde(default)]
    pub occurred_at: Option<NaiveDate>,
    #[serde(default)]
    pub recurrence: Recurrence,
}

impl TransactionInput {
    /// Resolve defaults and validate
    pub fn into_new(self, today: NaiveDate) -> Result<NewTransaction> {
        let occurred_at = self.occurred_at.unwrap_or(today);
        let new = NewTransaction {
            title: self.title.trim().to_string(),
            description: self.description.filter(|d| !d.trim().is_empty()),
            amount: self.amount,
            kind: self.kind,
            category: normalize_category(self.category),
            occurred_at,
            schedule: Schedule::starting(self.recurrence, occurred_at),
        };
        new.validate()?;
        Ok(new)
    }
}

/// Partial edit of a transaction; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub amount: Option<f64>,
    pub kind: Option<TransactionKind>,
    pub category: Option<String>,
    pub occurred_at: Option<NaiveDate>,
    pub recurrence: Option<Recurrence>,
}

fn normalize_category(category: Option<String>) -> String {
    category
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
}

fn validate_fields(title: &str, amount: f64) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::InvalidData("Title must not be empty".to_string()));
    }
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::InvalidData(format!(
            "Amount must be a non-negative number, got {}",
            amount
        )));
    }
    Ok(())
}
