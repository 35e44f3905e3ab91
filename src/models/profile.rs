use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::StreakState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub display_name: String,
    pub points: u32,
    pub books_completed: u32,
    pub total_pages_read: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: Option<NaiveDate>,
    /// Display cache only; always rewritten from the level engine
    pub level: String,
    pub freezes_used: u32,
}

impl Profile {
    pub fn streak(&self) -> StreakState {
        StreakState {
            current_streak: self.current_streak,
            longest_streak: self.longest_streak,
            last_activity_date: self.last_activity_date,
        }
    }

    pub fn progress(&self) -> UserProgress {
        UserProgress {
            points: self.points,
            books_completed: self.books_completed,
            longest_streak: self.longest_streak,
            total_pages_read: self.total_pages_read,
        }
    }
}

/// Snapshot of the cumulative counters the level engine ranks on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgress {
    pub points: u32,
    pub books_completed: u32,
    pub longest_streak: u32,
    pub total_pages_read: u32,
}
