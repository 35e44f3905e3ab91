pub mod level;
pub mod streak;

pub use level::{LevelInfo, LevelTier, Requirements, can_level_up, level_info};
pub use streak::{DayBoundary, calculate_streak, collect_activity_dates, parse_timestamp};
