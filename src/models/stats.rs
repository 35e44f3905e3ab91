use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Derived streak fields, persisted on the profile row after every recomputation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: Option<NaiveDate>,
}

impl StreakState {
    /// Streak still alive: last activity was today or yesterday.
    pub fn is_active(&self, today: NaiveDate) -> bool {
        match self.last_activity_date {
            Some(last) => {
                let days_since = (today - last).num_days();
                (0..=1).contains(&days_since)
            }
            None => false,
        }
    }

    /// The streak survives today only if something gets logged before midnight.
    pub fn at_risk(&self, today: NaiveDate) -> bool {
        self.current_streak > 0 && self.last_activity_date == today.pred_opt()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub pages_read: u32,
    pub sessions: u32,
    pub frozen: bool,
}

impl DailyStats {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            pages_read: 0,
            sessions: 0,
            frozen: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.sessions > 0 || self.frozen
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyGrid {
    pub days: Vec<DailyStats>,
}

impl WeeklyGrid {
    pub fn new(days: Vec<DailyStats>) -> Self {
        Self { days }
    }

    pub fn total_pages(&self) -> u32 {
        self.days.iter().map(|d| d.pages_read).sum()
    }

    pub fn active_days(&self) -> u32 {
        self.days.iter().filter(|d| d.is_active()).count() as u32
    }
}
