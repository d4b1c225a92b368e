//! Background scheduler for the daily recurrence sweep
//!
//! The sweep time comes from `[recurrence]` in the config file and can be
//! overridden via environment variables:
//!
//! - `TALLY_RECURRENCE_AT`: Local wall-clock time, `HH:MM` (default "00:00")
//! - `TALLY_RECURRENCE_DISABLED`: Set to "1" or "true" to disable the scheduler
//!
//! One tokio task owns the schedule. It sleeps until the next run, runs the
//! sweep on the blocking pool and waits for it to finish before computing the
//! next run, so sweeps never overlap.

use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use tally_core::config::{parse_run_at, RecurrenceConfig};
use tally_core::{Clock, Database, RecurrenceEngine, SweepReport, SystemClock, TransactionStore};

/// Configuration for the scheduled sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrenceScheduleConfig {
    /// Local wall-clock time of the daily sweep
    pub run_at: NaiveTime,
    pub enabled: bool,
}

impl RecurrenceScheduleConfig {
    pub fn from_config(config: &RecurrenceConfig) -> anyhow::Result<Self> {
        Ok(Self {
            run_at: config.run_at_time()?,
            enabled: config.enabled,
        })
    }

    /// Apply `TALLY_RECURRENCE_AT` / `TALLY_RECURRENCE_DISABLED`
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var("TALLY_RECURRENCE_AT").ok().as_deref(),
            std::env::var("TALLY_RECURRENCE_DISABLED").ok().as_deref(),
        )
    }

    fn with_overrides(mut self, run_at: Option<&str>, disabled: Option<&str>) -> Self {
        if let Some(value) = run_at {
            match parse_run_at(value) {
                Ok(time) => self.run_at = time,
                Err(e) => warn!(value = %value, error = %e, "Ignoring TALLY_RECURRENCE_AT"),
            }
        }
        if let Some(value) = disabled {
            if matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes") {
                self.enabled = false;
            }
        }
        self
    }
}

/// Next occurrence of `run_at` strictly after `now`
pub fn next_run_after(now: NaiveDateTime, run_at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(run_at);
    if today > now {
        today
    } else {
        let tomorrow = now.date().succ_opt().unwrap_or(now.date());
        tomorrow.and_time(run_at)
    }
}

/// Time to sleep from `now` until the next run, measured in real time so a
/// DST change before the run does not move it
pub fn delay_until_next_run<Tz: TimeZone>(now: &DateTime<Tz>, run_at: NaiveTime) -> Duration {
    delay_until(now, next_run_after(now.naive_local(), run_at))
}

/// Real time from `now` until the local wall-clock time `next`
fn delay_until<Tz: TimeZone>(now: &DateTime<Tz>, next: NaiveDateTime) -> Duration {
    let target = resolve_local(&now.timezone(), next);
    (target.naive_utc() - now.naive_utc())
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Map a wall-clock time to an instant. A repeated time resolves to its first
/// occurrence; a skipped time resolves to the first valid time after it.
fn resolve_local<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> DateTime<Tz> {
    let mut candidate = local;
    for _ in 0..8 {
        if let Some(instant) = tz.from_local_datetime(&candidate).earliest() {
            return instant;
        }
        candidate += TimeDelta::minutes(15);
    }
    tz.from_utc_datetime(&local)
}

/// Handle to the running scheduler task
pub struct SchedulerHandle {
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the scheduler. A sweep already running on the blocking pool
    /// finishes its current record set.
    pub fn stop(self) {
        self.task.abort();
        info!("Recurrence scheduler stopped");
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Run one sweep on the blocking pool and log the outcome.
///
/// Returns `None` when the sweep could not run at all.
pub async fn run_scheduled_sweep<S, C>(store: S, clock: C) -> Option<SweepReport>
where
    S: TransactionStore + Send + 'static,
    C: Clock + Send + 'static,
{
    let result =
        tokio::task::spawn_blocking(move || RecurrenceEngine::new(store, clock).sweep()).await;

    match result {
        Ok(Ok(report)) => {
            info!(
                due = report.due,
                advanced = report.advanced.len(),
                corrected = report.corrected,
                failed = report.failed.len(),
                "Scheduled recurrence sweep completed"
            );
            Some(report)
        }
        Ok(Err(e)) => {
            error!(error = %e, "Scheduled recurrence sweep failed");
            None
        }
        Err(e) => {
            error!(error = %e, "Recurrence sweep task panicked");
            None
        }
    }
}

/// Start the recurrence scheduler as a background task
pub fn start_recurrence_scheduler(db: Database, config: RecurrenceScheduleConfig) -> SchedulerHandle {
    info!(
        "Starting recurrence scheduler: daily at {}",
        config.run_at.format("%H:%M")
    );

    let task = tokio::spawn(async move {
        let mut last_run: Option<NaiveDateTime> = None;

        loop {
            let now = Local::now();
            let mut next = next_run_after(now.naive_local(), config.run_at);
            // A wall-clock step backwards must not repeat today's run
            if last_run == Some(next) {
                next = next_run_after(next, config.run_at);
            }
            let delay = delay_until(&now, next);
            tracing::debug!(next = %next, delay_secs = delay.as_secs(), "Next recurrence sweep scheduled");

            tokio::time::sleep(delay).await;
            last_run = Some(next);

            run_scheduled_sweep(db.clone(), SystemClock).await;
        }
    });

    SchedulerHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, LocalResult, NaiveDate, Utc};
    use tally_core::models::{Recurrence, Transaction, TransactionInput, TransactionKind};
    use tally_core::test_utils::MemoryStore;
    use tally_core::FixedClock;

    fn seed(store: &MemoryStore, title: &str, occurred: NaiveDate) -> Transaction {
        let new = TransactionInput {
            title: title.to_string(),
            description: None,
            amount: 10.0,
            kind: TransactionKind::Expense,
            category: None,
            occurred_at: Some(occurred),
            recurrence: Recurrence::Monthly,
        }
        .into_new(occurred)
        .unwrap();
        store.create("owner", &new).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn base() -> RecurrenceScheduleConfig {
        RecurrenceScheduleConfig {
            run_at: time(0, 0),
            enabled: true,
        }
    }

    #[test]
    fn test_next_run_later_today() {
        assert_eq!(
            next_run_after(at(2024, 5, 1, 1, 0, 0), time(3, 30)),
            at(2024, 5, 1, 3, 30, 0)
        );
    }

    #[test]
    fn test_next_run_rolls_to_tomorrow() {
        assert_eq!(
            next_run_after(at(2024, 5, 1, 12, 0, 0), time(0, 0)),
            at(2024, 5, 2, 0, 0, 0)
        );
        // Exactly at the run time: the run just happened, next is tomorrow
        assert_eq!(
            next_run_after(at(2024, 5, 1, 0, 0, 0), time(0, 0)),
            at(2024, 5, 2, 0, 0, 0)
        );
        assert_eq!(
            next_run_after(at(2024, 12, 31, 23, 0, 0), time(0, 0)),
            at(2025, 1, 1, 0, 0, 0)
        );
    }

    #[test]
    fn test_delay_until_midnight() {
        let utc = |dt: NaiveDateTime| Utc.from_utc_datetime(&dt);
        assert_eq!(
            delay_until_next_run(&utc(at(2024, 5, 1, 23, 59, 0)), time(0, 0)),
            Duration::from_secs(60)
        );
        assert_eq!(
            delay_until_next_run(&utc(at(2024, 5, 1, 0, 0, 1)), time(0, 0)),
            Duration::from_secs(24 * 3600 - 1)
        );
    }

    /// UTC+1 until 2024-10-26 22:00 UTC, then UTC+0: local 23:00 on the 26th
    /// steps back to 22:00, so 22:00-23:00 happens twice.
    #[derive(Debug, Clone, Copy)]
    struct FallBackZone;

    impl FallBackZone {
        fn switch() -> NaiveDateTime {
            at(2024, 10, 26, 22, 0, 0)
        }

        fn offsets() -> [FixedOffset; 2] {
            [
                FixedOffset::east_opt(3600).unwrap(),
                FixedOffset::east_opt(0).unwrap(),
            ]
        }
    }

    impl TimeZone for FallBackZone {
        type Offset = FixedOffset;

        fn from_offset(_: &FixedOffset) -> Self {
            FallBackZone
        }

        fn offset_from_local_date(&self, _: &NaiveDate) -> LocalResult<FixedOffset> {
            LocalResult::Single(Self::offsets()[1])
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            let valid: Vec<FixedOffset> = Self::offsets()
                .into_iter()
                .filter(|offset| {
                    let utc = *local - TimeDelta::seconds(offset.local_minus_utc() as i64);
                    self.offset_from_utc_datetime(&utc) == *offset
                })
                .collect();
            match valid.as_slice() {
                [] => LocalResult::None,
                [one] => LocalResult::Single(*one),
                [first, second, ..] => LocalResult::Ambiguous(*first, *second),
            }
        }

        fn offset_from_utc_date(&self, _: &NaiveDate) -> FixedOffset {
            Self::offsets()[1]
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            if *utc < Self::switch() {
                Self::offsets()[0]
            } else {
                Self::offsets()[1]
            }
        }
    }

    #[test]
    fn test_delay_spans_fall_back() {
        // Noon local (11:00 UTC) to midnight local (00:00 UTC) is 13 real hours
        let now = FallBackZone.from_utc_datetime(&at(2024, 10, 26, 11, 0, 0));
        assert_eq!(now.naive_local(), at(2024, 10, 26, 12, 0, 0));
        assert_eq!(
            delay_until_next_run(&now, time(0, 0)),
            Duration::from_secs(13 * 3600)
        );
    }

    #[test]
    fn test_repeated_run_time_resolves_to_first_occurrence() {
        // 22:30 local happens at 21:30 UTC and again at 22:30 UTC
        let now = FallBackZone.from_utc_datetime(&at(2024, 10, 26, 20, 0, 0));
        assert_eq!(
            delay_until_next_run(&now, time(22, 30)),
            Duration::from_secs(90 * 60)
        );
    }

    #[test]
    fn test_from_config() {
        let config = RecurrenceConfig {
            enabled: false,
            run_at: "06:15".to_string(),
        };
        let schedule = RecurrenceScheduleConfig::from_config(&config).unwrap();
        assert_eq!(schedule.run_at, time(6, 15));
        assert!(!schedule.enabled);

        let bad = RecurrenceConfig {
            enabled: true,
            run_at: "6pm".to_string(),
        };
        assert!(RecurrenceScheduleConfig::from_config(&bad).is_err());
    }

    #[test]
    fn test_overrides() {
        let schedule = base().with_overrides(Some("04:45"), None);
        assert_eq!(schedule.run_at, time(4, 45));
        assert!(schedule.enabled);

        assert!(!base().with_overrides(None, Some("1")).enabled);
        assert!(!base().with_overrides(None, Some("true")).enabled);
        assert!(base().with_overrides(None, Some("0")).enabled);
    }

    #[test]
    fn test_invalid_override_is_ignored() {
        assert_eq!(base().with_overrides(Some("midnight"), None), base());
    }

    #[tokio::test]
    async fn test_scheduled_sweep_isolates_failures() {
        let store = MemoryStore::new();
        let rent = seed(&store, "Rent", NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
        let phone = seed(&store, "Phone", NaiveDate::from_ymd_opt(2024, 4, 2).unwrap());
        store.fail_writes_for(rent.id);

        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let report = run_scheduled_sweep(store, FixedClock(today)).await.unwrap();
        assert_eq!(report.due, 2);
        assert_eq!(report.advanced.len(), 1);
        assert_eq!(report.advanced[0].retired_id, phone.id);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].transaction_id, rent.id);
    }

    #[tokio::test]
    async fn test_scheduled_sweep_query_failure_is_logged() {
        let store = MemoryStore::new();
        store.fail_queries(true);
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        assert!(run_scheduled_sweep(store, FixedClock(today)).await.is_none());
    }

    #[tokio::test]
    async fn test_scheduler_starts_and_stops() {
        let db = Database::in_memory().unwrap();
        let handle = start_recurrence_scheduler(db, base());
        assert!(!handle.is_finished());
        handle.stop();
    }
}
