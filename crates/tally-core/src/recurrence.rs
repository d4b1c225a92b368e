//! Recurrence calculator
//!
//! Pure date arithmetic for recurring transactions plus the [`Schedule`]
//! value that ties a [`Recurrence`] to its next due date.
//!
//! Calendar months and years clamp to the last day of the target month:
//! `2024-01-31 + 1 month = 2024-02-29` and `2024-02-29 + 1 year = 2025-02-28`.
//! Each link of a chain is computed from the previous due date, so a chain
//! that clamps once stays on the clamped day.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::Recurrence;

/// Compute the next due date for `recurrence` starting from `base`.
///
/// # Panics
///
/// Panics when `recurrence` is [`Recurrence::None`]. One-off transactions
/// have no due date; callers holding a [`Schedule`] never reach this case.
pub fn next_due(base: NaiveDate, recurrence: Recurrence) -> NaiveDate {
    let next = match recurrence {
        Recurrence::None => panic!("next_due called for a non-recurring transaction"),
        Recurrence::Daily => base.checked_add_days(Days::new(1)),
        Recurrence::Weekly => base.checked_add_days(Days::new(7)),
        Recurrence::Monthly => base.checked_add_months(Months::new(1)),
        Recurrence::Yearly => base.checked_add_months(Months::new(12)),
    };
    next.unwrap_or(NaiveDate::MAX)
}

/// Recurrence state of a transaction.
///
/// A schedule is either one-off (`recurrence = none`, no due date) or
/// recurring with a due date. The other two combinations cannot be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "ScheduleFields", into = "ScheduleFields")]
pub struct Schedule {
    recurrence: Recurrence,
    next_due_at: Option<NaiveDate>,
}

impl Schedule {
    /// A schedule that never recurs
    pub const fn one_off() -> Self {
        Self {
            recurrence: Recurrence::None,
            next_due_at: None,
        }
    }

    /// Schedule for a newly entered transaction dated `base`
    pub fn starting(recurrence: Recurrence, base: NaiveDate) -> Self {
        match recurrence {
            Recurrence::None => Self::one_off(),
            _ => Self {
                recurrence,
                next_due_at: Some(next_due(base, recurrence)),
            },
        }
    }

    /// Rebuild a schedule from stored columns, correcting invalid pairs.
    ///
    /// A recurrence without a due date and a due date without a recurrence
    /// both collapse to one-off.
    pub fn from_parts(recurrence: Recurrence, next_due_at: Option<NaiveDate>) -> Self {
        match (recurrence, next_due_at) {
            (Recurrence::None, _) | (_, None) => Self::one_off(),
            (recurrence, Some(due)) => Self {
                recurrence,
                next_due_at: Some(due),
            },
        }
    }

    pub fn recurrence(&self) -> Recurrence {
        self.recurrence
    }

    pub fn next_due_at(&self) -> Option<NaiveDate> {
        self.next_due_at
    }

    pub fn is_recurring(&self) -> bool {
        self.next_due_at.is_some()
    }

    /// Whether the schedule has come due on or before `today`
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.next_due_at.is_some_and(|due| due <= today)
    }

    /// Schedule of the successor created when this one comes due.
    ///
    /// Returns the successor's occurrence date (this schedule's due date)
    /// and its schedule, or `None` for a one-off.
    pub fn advance(&self) -> Option<(NaiveDate, Schedule)> {
        let due = self.next_due_at?;
        Some((
            due,
            Self {
                recurrence: self.recurrence,
                next_due_at: Some(next_due(due, self.recurrence)),
            },
        ))
    }
}

/// Flat wire shape: `{"recurrence": "monthly", "next_due_at": "2024-02-29"}`
#[derive(Serialize, Deserialize)]
struct ScheduleFields {
    #[serde(default)]
    recurrence: Recurrence,
    #[serde(default)]
    next_due_at: Option<NaiveDate>,
}

impl From<ScheduleFields> for Schedule {
    fn from(fields: ScheduleFields) -> Self {
        Self::from_parts(fields.recurrence, fields.next_due_at)
    }
}

impl From<Schedule> for ScheduleFields {
    fn from(schedule: Schedule) -> Self {
        Self {
            recurrence: schedule.recurrence,
            next_due_at: schedule.next_due_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_daily_and_weekly() {
        assert_eq!(next_due(date(2024, 2, 28), Recurrence::Daily), date(2024, 2, 29));
        assert_eq!(next_due(date(2024, 12, 31), Recurrence::Daily), date(2025, 1, 1));
        assert_eq!(next_due(date(2024, 12, 28), Recurrence::Weekly), date(2025, 1, 4));
    }

    #[test]
    fn test_monthly_clamps_to_end_of_month() {
        assert_eq!(next_due(date(2024, 1, 31), Recurrence::Monthly), date(2024, 2, 29));
        assert_eq!(next_due(date(2023, 1, 31), Recurrence::Monthly), date(2023, 2, 28));
        assert_eq!(next_due(date(2024, 3, 31), Recurrence::Monthly), date(2024, 4, 30));
        assert_eq!(next_due(date(2024, 12, 15), Recurrence::Monthly), date(2025, 1, 15));
    }

    #[test]
    fn test_yearly_clamps_leap_day() {
        assert_eq!(next_due(date(2024, 2, 29), Recurrence::Yearly), date(2025, 2, 28));
        assert_eq!(next_due(date(2023, 6, 1), Recurrence::Yearly), date(2024, 6, 1));
    }

    #[test]
    #[should_panic(expected = "non-recurring")]
    fn test_none_is_a_precondition_violation() {
        next_due(date(2024, 1, 1), Recurrence::None);
    }

    #[test]
    fn test_saturates_at_max_date() {
        assert_eq!(next_due(NaiveDate::MAX, Recurrence::Daily), NaiveDate::MAX);
    }

    #[test]
    fn test_schedule_starting() {
        let s = Schedule::starting(Recurrence::Monthly, date(2024, 1, 31));
        assert_eq!(s.recurrence(), Recurrence::Monthly);
        assert_eq!(s.next_due_at(), Some(date(2024, 2, 29)));

        let none = Schedule::starting(Recurrence::None, date(2024, 1, 31));
        assert_eq!(none, Schedule::one_off());
        assert!(!none.is_recurring());
    }

    #[test]
    fn test_from_parts_corrects_invalid_pairs() {
        assert_eq!(
            Schedule::from_parts(Recurrence::Weekly, None),
            Schedule::one_off()
        );
        assert_eq!(
            Schedule::from_parts(Recurrence::None, Some(date(2024, 1, 1))),
            Schedule::one_off()
        );
        let ok = Schedule::from_parts(Recurrence::Weekly, Some(date(2024, 1, 1)));
        assert!(ok.is_recurring());
    }

    #[test]
    fn test_advance_chains_from_previous_due_date() {
        let s = Schedule::from_parts(Recurrence::Monthly, Some(date(2024, 1, 31)));
        let (occurred, next) = s.advance().unwrap();
        assert_eq!(occurred, date(2024, 1, 31));
        assert_eq!(next.next_due_at(), Some(date(2024, 2, 29)));

        // Clamped day sticks for the rest of the chain
        let (_, after) = next.advance().unwrap();
        assert_eq!(after.next_due_at(), Some(date(2024, 3, 29)));

        assert!(Schedule::one_off().advance().is_none());
    }

    #[test]
    fn test_is_due() {
        let s = Schedule::from_parts(Recurrence::Daily, Some(date(2024, 5, 10)));
        assert!(s.is_due(date(2024, 5, 10)));
        assert!(s.is_due(date(2024, 5, 11)));
        assert!(!s.is_due(date(2024, 5, 9)));
        assert!(!Schedule::one_off().is_due(date(2024, 5, 9)));
    }

    #[test]
    fn test_serde_shape_and_correction() {
        let s = Schedule::from_parts(Recurrence::Yearly, Some(date(2025, 2, 28)));
        let json = serde_json::to_value(s).unwrap();
        assert_eq!(json["recurrence"], "yearly");
        assert_eq!(json["next_due_at"], "2025-02-28");

        let corrected: Schedule =
            serde_json::from_str(r#"{"recurrence":"none","next_due_at":"2024-01-01"}"#).unwrap();
        assert_eq!(corrected, Schedule::one_off());
    }
}
