pub mod book;
pub mod profile;
pub mod session;
pub mod stats;

pub use book::{Book, BookStatus};
pub use profile::{Profile, UserProgress};
pub use session::ReadingSession;
pub use stats::{DailyStats, StreakState, WeeklyGrid};
