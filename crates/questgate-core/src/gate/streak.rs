//! Daily streak policy.
//!
//! A streak counts consecutive calendar days with at least one successful
//! gate. Days are always cut in one system-wide time zone; the stored
//! last-active date and "today" must come from the same zone or the
//! one-day comparisons drift.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// Zone used for day boundaries unless configuration says otherwise.
pub const DEFAULT_ZONE: Tz = chrono_tz::America::Sao_Paulo;

/// Calendar date of `instant` in `zone`.
pub fn today_in(zone: Tz, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&zone).date_naive()
}

/// How the last active day relates to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayGap {
    /// No previous activity recorded.
    First,
    SameDay,
    /// Last activity was yesterday.
    NextDay,
    /// Two or more days without activity.
    Missed(i64),
    /// Stored date is after today (clock skew or a zone change).
    Future(i64),
}

impl DayGap {
    pub fn between(last_active: Option<NaiveDate>, today: NaiveDate) -> Self {
        let Some(last) = last_active else {
            return DayGap::First;
        };
        match (today - last).num_days() {
            0 => DayGap::SameDay,
            1 => DayGap::NextDay,
            n if n > 1 => DayGap::Missed(n),
            n => DayGap::Future(-n),
        }
    }
}

/// Streak after a settlement.
///
/// A failed gate always resets to zero, even if a success was already
/// recorded earlier the same day. A success starts at 1, stays put on the
/// same day, extends by one on the next day and restarts at 1 otherwise.
/// A future last-active date is treated like a missed day.
pub fn next_streak(
    success: bool,
    last_active: Option<NaiveDate>,
    today: NaiveDate,
    current: u32,
) -> u32 {
    if !success {
        return 0;
    }
    match DayGap::between(last_active, today) {
        DayGap::First => 1,
        DayGap::SameDay => current,
        DayGap::NextDay => current.saturating_add(1),
        DayGap::Missed(_) | DayGap::Future(_) => 1,
    }
}
