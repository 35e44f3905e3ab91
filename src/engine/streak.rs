//! Consecutive-day streak computation.
//!
//! Everything here is pure: callers hand in the full activity history plus the
//! current calendar day and get back a fresh [`StreakState`].

use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};

use crate::error::ReadQuestError;
use crate::models::StreakState;

/// The time zone in which session timestamps are cut into calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBoundary {
    offset: FixedOffset,
}

impl DayBoundary {
    pub fn new(offset_minutes: i32) -> Result<Self, ReadQuestError> {
        let offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(ReadQuestError::InvalidTimezoneOffset(offset_minutes))?;
        Ok(Self { offset })
    }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn offset_minutes(&self) -> i32 {
        self.offset.local_minus_utc() / 60
    }

    /// Calendar day a timestamp falls on in this boundary's zone
    pub fn activity_date<Tz: TimeZone>(&self, ts: &DateTime<Tz>) -> NaiveDate {
        ts.with_timezone(&self.offset).date_naive()
    }

    /// Today's date according to the wall clock
    pub fn today(&self) -> NaiveDate {
        self.activity_date(&Utc::now())
    }
}

impl Default for DayBoundary {
    fn default() -> Self {
        Self::utc()
    }
}

/// Parse a session timestamp. Accepts RFC 3339, a naive `YYYY-MM-DD HH:MM:SS`
/// (read as UTC) and a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(s: &str) -> Result<DateTime<FixedOffset>, ReadQuestError> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN).and_utc().fixed_offset())
        .map_err(|_| ReadQuestError::InvalidTimestamp(s.to_string()))
}

/// Truncate timestamps to calendar days, deduplicated and sorted ascending.
pub fn collect_activity_dates<I, Tz>(timestamps: I, boundary: &DayBoundary) -> Vec<NaiveDate>
where
    I: IntoIterator<Item = DateTime<Tz>>,
    Tz: TimeZone,
{
    timestamps
        .into_iter()
        .map(|ts| boundary.activity_date(&ts))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn is_next_day(prev: NaiveDate, next: NaiveDate) -> bool {
    prev.succ_opt() == Some(next)
}

/// Compute current and longest streaks from a set of activity dates.
///
/// `dates` may be unsorted and contain duplicates. `previous_longest` is the
/// value already on record; the returned `longest_streak` never drops below it,
/// so a partial history cannot erase the historical best.
pub fn calculate_streak(
    dates: &[NaiveDate],
    today: NaiveDate,
    previous_longest: u32,
) -> StreakState {
    let sorted: Vec<NaiveDate> = dates
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let Some(&last) = sorted.last() else {
        return StreakState {
            current_streak: 0,
            longest_streak: previous_longest,
            last_activity_date: None,
        };
    };

    let current_streak = if last == today || Some(last) == today.pred_opt() {
        let mut run = 1u32;
        for pair in sorted.windows(2).rev() {
            if !is_next_day(pair[0], pair[1]) {
                break;
            }
            run += 1;
        }
        run
    } else {
        0
    };

    let mut max_run = 1u32;
    let mut temp = 1u32;
    for pair in sorted.windows(2) {
        if is_next_day(pair[0], pair[1]) {
            temp += 1;
        } else {
            temp = 1;
        }
        max_run = max_run.max(temp);
    }

    StreakState {
        current_streak,
        longest_streak: max_run.max(current_streak).max(previous_longest),
        last_activity_date: Some(last),
    }
}
